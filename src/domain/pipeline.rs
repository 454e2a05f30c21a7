//! Forecast-and-recommend pipeline.
//!
//! [`forecast_and_recommend`] is the pure entry point over an in-memory
//! series. [`Analyzer`] wires it to a [`MarketDataPort`] for lookups by
//! symbol and period.

use serde::Serialize;

use crate::domain::ensemble::{EnsembleCombiner, EnsembleForecast};
use crate::domain::error::StockcastError;
use crate::domain::forecast::ForecastSeries;
use crate::domain::period::Period;
use crate::domain::recommendation::{Recommendation, RecommendationPolicy, recommend};
use crate::domain::series::{PriceSeries, prepare};
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub combiner: EnsembleCombiner,
    pub policy: RecommendationPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub symbol: String,
    pub current_price: f64,
    pub ensemble: EnsembleForecast,
    pub recommendation: Recommendation,
}

impl Analysis {
    /// Per-model forecasts that survived combination.
    pub fn forecasts(&self) -> &[ForecastSeries] {
        &self.ensemble.columns
    }
}

/// Forecasts `forecast_days` ahead and derives a recommendation.
///
/// Fails only when the series is unusable or every model fails. A missing
/// `current_price` falls back to the last close.
pub fn forecast_and_recommend(
    series: &PriceSeries,
    forecast_days: usize,
    current_price: Option<f64>,
    options: &PipelineOptions,
) -> Result<Analysis, StockcastError> {
    if forecast_days == 0 {
        return Err(StockcastError::invalid_input("forecast horizon must be at least one day"));
    }
    let prepared = prepare(series)?;
    tracing::info!(
        symbol = %prepared.symbol,
        bars = prepared.len(),
        days = forecast_days,
        "forecasting"
    );

    let ensemble = options.combiner.forecast(&prepared, forecast_days)?;

    let current_price = match current_price {
        Some(price) => price,
        None => {
            let last = prepared.last_close().ok_or(StockcastError::EmptySeries)?;
            tracing::info!(symbol = %prepared.symbol, price = last, "no quote, using last close");
            last
        }
    };

    let recommendation = recommend(Some(&ensemble), Some(current_price), &options.policy);
    tracing::info!(
        symbol = %prepared.symbol,
        signal = %recommendation.signal,
        confidence = %recommendation.confidence,
        "recommendation ready"
    );

    Ok(Analysis {
        symbol: prepared.symbol.clone(),
        current_price,
        ensemble,
        recommendation,
    })
}

pub struct Analyzer<'a> {
    pub data: &'a dyn MarketDataPort,
    pub options: PipelineOptions,
}

impl<'a> Analyzer<'a> {
    pub fn new(data: &'a dyn MarketDataPort, options: PipelineOptions) -> Self {
        Analyzer { data, options }
    }

    pub fn analyze(&self, symbol: &str, period: Period, forecast_days: usize) -> Result<Analysis, StockcastError> {
        let series = self
            .data
            .get_series(symbol, period)?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StockcastError::NoData {
                symbol: symbol.to_string(),
            })?;
        let quote = self.data.get_current_price(symbol)?;
        forecast_and_recommend(&series, forecast_days, quote, &self.options)
    }
}
