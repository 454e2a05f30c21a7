//! Persistence port for analyses, trades, holdings and watchlists.
//!
//! Records are keyed by a plain user id; account management lives elsewhere.

use crate::domain::error::StockcastError;
use crate::domain::history::{AnalysisRecord, WatchlistEntry};
use crate::domain::portfolio::Holding;
use crate::domain::trade::TradeRecord;

pub trait HistoryPort {
    /// Returns the new record id.
    fn save_analysis(&self, record: &AnalysisRecord) -> Result<i64, StockcastError>;

    /// Newest first, at most `limit` rows.
    fn analysis_history(&self, user_id: i64, limit: usize) -> Result<Vec<AnalysisRecord>, StockcastError>;

    fn save_trade(&self, record: &TradeRecord) -> Result<i64, StockcastError>;

    /// Newest first, at most `limit` rows.
    fn trade_history(&self, user_id: i64, limit: usize) -> Result<Vec<TradeRecord>, StockcastError>;

    /// Applies a signed quantity change and returns the resulting holding,
    /// or `None` when the symbol is no longer (or never was) held.
    fn apply_to_portfolio(
        &self,
        user_id: i64,
        symbol: &str,
        quantity_delta: i64,
        price: f64,
    ) -> Result<Option<Holding>, StockcastError>;

    /// Ordered by symbol.
    fn portfolio(&self, user_id: i64) -> Result<Vec<Holding>, StockcastError>;

    /// `false` when the symbol was already watched.
    fn add_to_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError>;

    /// `false` when the symbol was not watched.
    fn remove_from_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError>;

    /// Newest first.
    fn watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, StockcastError>;
}
