//! Position-averaged holdings and their valuation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub quantity: i64,
    pub average_price: f64,
}

impl Holding {
    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.average_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.average_price) * self.quantity as f64
    }
}

/// Applies a signed fill to an optional existing holding.
///
/// Buys (`delta > 0`) move the average to the quantity-weighted mean. Sells
/// keep the average and reduce the quantity; the holding disappears once
/// nothing is left. Selling a symbol that is not held changes nothing.
pub fn apply_fill(existing: Option<&Holding>, symbol: &str, delta: i64, price: f64) -> Option<Holding> {
    match existing {
        Some(held) if delta > 0 => {
            let quantity = held.quantity + delta;
            let average_price = (held.cost_basis() + delta as f64 * price) / quantity as f64;
            Some(Holding {
                symbol: held.symbol.clone(),
                quantity,
                average_price,
            })
        }
        Some(held) => {
            let quantity = held.quantity + delta;
            (quantity > 0).then(|| Holding {
                symbol: held.symbol.clone(),
                quantity,
                average_price: held.average_price,
            })
        }
        None if delta > 0 => Some(Holding {
            symbol: symbol.to_string(),
            quantity: delta,
            average_price: price,
        }),
        None => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingValuation {
    pub symbol: String,
    pub quantity: i64,
    pub average_price: f64,
    pub current_price: Option<f64>,
    pub market_value: Option<f64>,
    pub unrealized_pnl: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    pub holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Portfolio { holdings }
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn cost_basis(&self) -> f64 {
        self.holdings.iter().map(Holding::cost_basis).sum()
    }

    /// Value of holdings that have a price in `price_map`.
    pub fn market_value(&self, price_map: &HashMap<String, f64>) -> f64 {
        self.holdings
            .iter()
            .filter_map(|h| price_map.get(&h.symbol).map(|&p| h.market_value(p)))
            .sum()
    }

    pub fn unrealized_pnl(&self, price_map: &HashMap<String, f64>) -> f64 {
        self.holdings
            .iter()
            .filter_map(|h| price_map.get(&h.symbol).map(|&p| h.unrealized_pnl(p)))
            .sum()
    }

    pub fn valuations(&self, price_map: &HashMap<String, f64>) -> Vec<HoldingValuation> {
        self.holdings
            .iter()
            .map(|h| {
                let current_price = price_map.get(&h.symbol).copied();
                HoldingValuation {
                    symbol: h.symbol.clone(),
                    quantity: h.quantity,
                    average_price: h.average_price,
                    current_price,
                    market_value: current_price.map(|p| h.market_value(p)),
                    unrealized_pnl: current_price.map(|p| h.unrealized_pnl(p)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(symbol: &str, quantity: i64, average_price: f64) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            quantity,
            average_price,
        }
    }

    #[test]
    fn first_buy_opens_holding() {
        let h = apply_fill(None, "TCS.BSE", 10, 3500.0).unwrap();
        assert_eq!(h.quantity, 10);
        assert!((h.average_price - 3500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn second_buy_weights_average() {
        let held = holding("TCS.BSE", 10, 100.0);
        let h = apply_fill(Some(&held), "TCS.BSE", 30, 200.0).unwrap();
        assert_eq!(h.quantity, 40);
        assert!((h.average_price - 175.0).abs() < 1e-9);
    }

    #[test]
    fn partial_sell_keeps_average() {
        let held = holding("ITC.BSE", 10, 420.0);
        let h = apply_fill(Some(&held), "ITC.BSE", -4, 500.0).unwrap();
        assert_eq!(h.quantity, 6);
        assert!((h.average_price - 420.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_or_over_sell_closes_holding() {
        let held = holding("ITC.BSE", 10, 420.0);
        assert!(apply_fill(Some(&held), "ITC.BSE", -10, 500.0).is_none());
        assert!(apply_fill(Some(&held), "ITC.BSE", -15, 500.0).is_none());
    }

    #[test]
    fn selling_unheld_symbol_is_noop() {
        assert!(apply_fill(None, "WIPRO.BSE", -5, 300.0).is_none());
    }

    #[test]
    fn valuation_skips_unpriced_holdings() {
        let portfolio = Portfolio::new(vec![
            holding("TCS.BSE", 10, 100.0),
            holding("INFY.BSE", 5, 200.0),
        ]);
        let mut prices = HashMap::new();
        prices.insert("TCS.BSE".to_string(), 110.0);

        assert!((portfolio.market_value(&prices) - 1100.0).abs() < 1e-9);
        assert!((portfolio.unrealized_pnl(&prices) - 100.0).abs() < 1e-9);
        assert!((portfolio.cost_basis() - 2000.0).abs() < 1e-9);

        let rows = portfolio.valuations(&prices);
        assert_eq!(rows[1].current_price, None);
        assert_eq!(rows[1].market_value, None);
        assert_eq!(portfolio.get("INFY.BSE").map(|h| h.quantity), Some(5));
    }
}
