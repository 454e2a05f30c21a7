//! Price series and the preparation step every forecasting model runs on.
//!
//! Raw retrieval may deliver bars newest-first and may repeat a date; models
//! need strictly ascending, unique dates. [`prepare`] is the only way the
//! pipeline turns caller data into model input.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        PriceSeries {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Last bar in storage order. Only meaningful on a prepared series.
    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Keep only bars dated on or after `cutoff`.
    pub fn since(&self, cutoff: NaiveDate) -> PriceSeries {
        PriceSeries {
            symbol: self.symbol.clone(),
            bars: self
                .bars
                .iter()
                .filter(|b| b.date >= cutoff)
                .cloned()
                .collect(),
        }
    }
}

/// Sort ascending by date, collapse duplicate dates, validate closes.
///
/// When a date repeats, the bar appearing later in the input wins.
pub fn prepare(series: &PriceSeries) -> Result<PriceSeries, StockcastError> {
    if series.is_empty() {
        return Err(StockcastError::EmptySeries);
    }

    let mut by_date: BTreeMap<NaiveDate, PriceBar> = BTreeMap::new();
    for bar in &series.bars {
        if !bar.close.is_finite() || bar.close <= 0.0 {
            return Err(StockcastError::invalid_input(format!(
                "{} has non-positive close {} on {}",
                series.symbol, bar.close, bar.date
            )));
        }
        by_date.insert(bar.date, bar.clone());
    }

    let duplicates = series.len() - by_date.len();
    if duplicates > 0 {
        tracing::warn!(
            symbol = %series.symbol,
            duplicates,
            "collapsed duplicate dates in price series"
        );
    }

    Ok(PriceSeries {
        symbol: series.symbol.clone(),
        bars: by_date.into_values().collect(),
    })
}
