//! Market data port trait.

use crate::domain::error::StockcastError;
use crate::domain::period::Period;
use crate::domain::series::PriceSeries;

/// Source of daily bars and quotes. `Ok(None)` means the symbol is unknown
/// to the source, which is not an error.
pub trait MarketDataPort {
    /// Bars dated on or after `period`'s start date, in any order.
    fn get_series(&self, symbol: &str, period: Period)
    -> Result<Option<PriceSeries>, StockcastError>;

    fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError>;
}

impl<T: MarketDataPort + ?Sized> MarketDataPort for Box<T> {
    fn get_series(&self, symbol: &str, period: Period) -> Result<Option<PriceSeries>, StockcastError> {
        (**self).get_series(symbol, period)
    }

    fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError> {
        (**self).get_current_price(symbol)
    }
}
