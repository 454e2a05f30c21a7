//! Simulated trade execution.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::domain::error::StockcastError;
use crate::domain::portfolio::Holding;
use crate::domain::tax::{HoldingTerm, Side, TaxBreakdown, TaxSchedule, calculate_tax};
use crate::ports::history_port::HistoryPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub id: Option<i64>,
    pub user_id: i64,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub tax_amount: f64,
    /// Total cost for buys, net proceeds for sells.
    pub total_amount: f64,
    pub executed_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeOutcome {
    pub record: TradeRecord,
    pub tax: TaxBreakdown,
    pub holding: Option<Holding>,
}

pub struct TradeRequest<'a> {
    pub user_id: i64,
    pub symbol: &'a str,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub term: HoldingTerm,
}

/// Validates the order, computes its taxes, records it and updates holdings.
pub fn execute_trade(
    store: &dyn HistoryPort,
    request: &TradeRequest<'_>,
    schedule: &TaxSchedule,
) -> Result<TradeOutcome, StockcastError> {
    if request.quantity <= 0 {
        return Err(StockcastError::Trade {
            reason: format!("quantity must be positive, got {}", request.quantity),
        });
    }
    if !request.price.is_finite() || request.price <= 0.0 {
        return Err(StockcastError::Trade {
            reason: format!("price must be positive, got {}", request.price),
        });
    }
    if request.symbol.trim().is_empty() {
        return Err(StockcastError::Trade {
            reason: "symbol is empty".into(),
        });
    }

    let tax = calculate_tax(request.side, request.price, request.quantity, request.term, schedule);
    let mut record = TradeRecord {
        id: None,
        user_id: request.user_id,
        symbol: request.symbol.to_string(),
        side: request.side,
        quantity: request.quantity,
        price: request.price,
        tax_amount: tax.total_tax,
        total_amount: tax.settlement,
        executed_at: Utc::now().naive_utc(),
    };
    record.id = Some(store.save_trade(&record)?);

    let delta = match request.side {
        Side::Buy => request.quantity,
        Side::Sell => -request.quantity,
    };
    let holding = store.apply_to_portfolio(request.user_id, request.symbol, delta, request.price)?;

    tracing::info!(
        user = request.user_id,
        symbol = request.symbol,
        side = %request.side,
        quantity = request.quantity,
        total = record.total_amount,
        "trade recorded"
    );

    Ok(TradeOutcome {
        record,
        tax,
        holding,
    })
}
