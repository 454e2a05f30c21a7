//! Indian equity transaction taxes and profit projection.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StockcastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = StockcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(StockcastError::invalid_input(format!(
                "unknown transaction side '{}'",
                other
            ))),
        }
    }
}

/// Holding period of the shares being sold. Under a year is short term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldingTerm {
    #[default]
    ShortTerm,
    LongTerm,
}

/// Rates in percent, plus the long-term gains exemption in rupees.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxSchedule {
    pub stt_pct: f64,
    pub transaction_charges_pct: f64,
    pub gst_pct: f64,
    pub stamp_duty_pct: f64,
    pub short_term_gains_pct: f64,
    pub long_term_gains_pct: f64,
    pub long_term_exemption: f64,
    pub profit_tax_pct: f64,
}

impl Default for TaxSchedule {
    fn default() -> Self {
        TaxSchedule {
            stt_pct: 0.1,
            transaction_charges_pct: 0.01,
            gst_pct: 18.0,
            stamp_duty_pct: 0.015,
            short_term_gains_pct: 15.0,
            long_term_gains_pct: 10.0,
            long_term_exemption: 100_000.0,
            profit_tax_pct: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxBreakdown {
    pub side: Side,
    pub transaction_value: f64,
    pub stt: f64,
    pub transaction_charges: f64,
    pub gst: f64,
    /// Buy side only.
    pub stamp_duty: f64,
    /// Sell side only.
    pub income_tax: f64,
    pub total_tax: f64,
    /// Total cost for a buy, net proceeds for a sell.
    pub settlement: f64,
}

pub fn calculate_tax(
    side: Side,
    price: f64,
    quantity: i64,
    term: HoldingTerm,
    schedule: &TaxSchedule,
) -> TaxBreakdown {
    let value = price * quantity as f64;
    let stt = value * schedule.stt_pct / 100.0;
    let transaction_charges = value * schedule.transaction_charges_pct / 100.0;
    let gst = transaction_charges * schedule.gst_pct / 100.0;

    match side {
        Side::Buy => {
            let stamp_duty = value * schedule.stamp_duty_pct / 100.0;
            let total_tax = stt + transaction_charges + gst + stamp_duty;
            TaxBreakdown {
                side,
                transaction_value: value,
                stt,
                transaction_charges,
                gst,
                stamp_duty,
                income_tax: 0.0,
                total_tax,
                settlement: value + total_tax,
            }
        }
        Side::Sell => {
            let income_tax = match term {
                HoldingTerm::ShortTerm => value * schedule.short_term_gains_pct / 100.0,
                HoldingTerm::LongTerm if value > schedule.long_term_exemption => {
                    (value - schedule.long_term_exemption) * schedule.long_term_gains_pct / 100.0
                }
                HoldingTerm::LongTerm => 0.0,
            };
            let total_tax = stt + transaction_charges + gst + income_tax;
            TaxBreakdown {
                side,
                transaction_value: value,
                stt,
                transaction_charges,
                gst,
                stamp_duty: 0.0,
                income_tax,
                total_tax,
                settlement: value - total_tax,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitPotential {
    pub investment: f64,
    pub future_value: f64,
    pub gross_profit: f64,
    pub tax: f64,
    pub net_profit: f64,
    pub roi_pct: f64,
}

/// Projected after-tax profit of holding `quantity` shares from `current`
/// to `predicted`. Losses are not taxed.
pub fn profit_potential(current: f64, predicted: f64, quantity: i64, tax_pct: f64) -> ProfitPotential {
    let investment = current * quantity as f64;
    let future_value = predicted * quantity as f64;
    let gross_profit = future_value - investment;
    let tax = (gross_profit * tax_pct / 100.0).max(0.0);
    let net_profit = gross_profit - tax;
    let roi_pct = if investment > 0.0 {
        net_profit / investment * 100.0
    } else {
        0.0
    };
    ProfitPotential {
        investment,
        future_value,
        gross_profit,
        tax,
        net_profit,
        roi_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn buy_side_adds_stamp_duty() {
        let t = calculate_tax(Side::Buy, 1000.0, 10, HoldingTerm::ShortTerm, &TaxSchedule::default());
        assert_relative_eq!(t.transaction_value, 10_000.0, epsilon = 1e-9);
        assert_relative_eq!(t.stt, 10.0, epsilon = 1e-9);
        assert_relative_eq!(t.transaction_charges, 1.0, epsilon = 1e-9);
        assert_relative_eq!(t.gst, 0.18, epsilon = 1e-12);
        assert_relative_eq!(t.stamp_duty, 1.5, epsilon = 1e-12);
        assert_relative_eq!(t.total_tax, 12.68, epsilon = 1e-9);
        assert_relative_eq!(t.settlement, 10_012.68, epsilon = 1e-9);
        assert_eq!(t.income_tax, 0.0);
    }

    #[test]
    fn short_term_sell_taxes_full_value() {
        let t = calculate_tax(Side::Sell, 1000.0, 10, HoldingTerm::ShortTerm, &TaxSchedule::default());
        assert_relative_eq!(t.income_tax, 1500.0, epsilon = 1e-9);
        assert_relative_eq!(t.total_tax, 1511.18, epsilon = 1e-9);
        assert_relative_eq!(t.settlement, 10_000.0 - 1511.18, epsilon = 1e-9);
        assert_eq!(t.stamp_duty, 0.0);
    }

    #[test]
    fn long_term_sell_exempts_first_lakh() {
        let schedule = TaxSchedule::default();
        let under = calculate_tax(Side::Sell, 500.0, 100, HoldingTerm::LongTerm, &schedule);
        assert_eq!(under.income_tax, 0.0);

        let over = calculate_tax(Side::Sell, 1500.0, 100, HoldingTerm::LongTerm, &schedule);
        assert_relative_eq!(over.income_tax, 5_000.0, epsilon = 1e-9);
    }

    #[test]
    fn profit_is_taxed_only_when_positive() {
        let gain = profit_potential(100.0, 120.0, 10, 15.0);
        assert_relative_eq!(gain.gross_profit, 200.0, epsilon = 1e-9);
        assert_relative_eq!(gain.tax, 30.0, epsilon = 1e-9);
        assert_relative_eq!(gain.net_profit, 170.0, epsilon = 1e-9);
        assert_relative_eq!(gain.roi_pct, 17.0, epsilon = 1e-9);

        let loss = profit_potential(100.0, 90.0, 10, 15.0);
        assert_eq!(loss.tax, 0.0);
        assert_relative_eq!(loss.net_profit, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_investment_has_zero_roi() {
        assert_eq!(profit_potential(0.0, 50.0, 10, 15.0).roi_pct, 0.0);
    }

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert!("short".parse::<Side>().is_err());
    }
}
