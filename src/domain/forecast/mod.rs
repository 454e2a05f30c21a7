//! Forecasting models.
//!
//! The model set is closed: [`Forecaster`] has one variant per model and
//! every variant goes through the same [`Forecaster::fit_and_forecast`]
//! contract. A model either yields a complete [`ForecastSeries`] or a
//! [`ModelError`]; partial forecasts are never produced.

pub mod arima;
pub mod sequence;
pub mod seasonal;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::{ModelError, StockcastError};
use crate::domain::series::PriceSeries;

pub use arima::ArimaConfig;
pub use seasonal::SeasonalConfig;
pub use sequence::SequenceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ModelKind {
    Arima,
    Lstm,
    Seasonal,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::Arima, ModelKind::Lstm, ModelKind::Seasonal];

    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Arima => "ARIMA",
            ModelKind::Lstm => "LSTM",
            ModelKind::Seasonal => "Seasonal",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = StockcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "arima" => Ok(ModelKind::Arima),
            "lstm" | "sequence" => Ok(ModelKind::Lstm),
            "seasonal" | "prophet" => Ok(ModelKind::Seasonal),
            other => Err(StockcastError::invalid_input(format!(
                "unknown model '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
}

/// `forecast_days` consecutive calendar days starting the day after the last
/// historical date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    pub model: ModelKind,
    pub points: Vec<ForecastPoint>,
}

impl ForecastSeries {
    /// Checked constructor: dates are derived from `last_date`, so the run is
    /// contiguous by construction; values must all be finite.
    pub fn from_values(
        model: ModelKind,
        last_date: NaiveDate,
        values: Vec<f64>,
    ) -> Result<Self, ModelError> {
        if values.is_empty() {
            return Err(ModelError::fit("model produced no forecast values"));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::fit(format!(
                "non-finite forecast at step {}",
                pos + 1
            )));
        }

        let points = forecast_dates(last_date, values.len())
            .into_iter()
            .zip(values)
            .map(|(date, predicted_price)| ForecastPoint {
                date,
                predicted_price,
            })
            .collect();

        Ok(ForecastSeries { model, points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted_price).collect()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.predicted_price)
    }
}

/// Calendar days after `last_date`; weekends and holidays are not skipped.
pub fn forecast_dates(last_date: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (1..=days as i64)
        .map(|offset| last_date + Duration::days(offset))
        .collect()
}

/// One configured forecasting model.
#[derive(Debug, Clone, PartialEq)]
pub enum Forecaster {
    Arima(ArimaConfig),
    Sequence(SequenceConfig),
    Seasonal(SeasonalConfig),
}

impl Forecaster {
    pub fn kind(&self) -> ModelKind {
        match self {
            Forecaster::Arima(_) => ModelKind::Arima,
            Forecaster::Sequence(_) => ModelKind::Lstm,
            Forecaster::Seasonal(_) => ModelKind::Seasonal,
        }
    }

    /// Default configuration for `kind`.
    pub fn default_for(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Arima => Forecaster::Arima(ArimaConfig::default()),
            ModelKind::Lstm => Forecaster::Sequence(SequenceConfig::default()),
            ModelKind::Seasonal => Forecaster::Seasonal(SeasonalConfig::default()),
        }
    }

    /// Fit to a prepared (ascending, non-empty) series and project `days` ahead.
    pub fn fit_and_forecast(
        &self,
        series: &PriceSeries,
        days: usize,
    ) -> Result<ForecastSeries, ModelError> {
        if days == 0 {
            return Err(ModelError::fit("forecast horizon must be at least one day"));
        }
        let last_date = series
            .last_date()
            .ok_or(ModelError::InsufficientData { have: 0, need: 1 })?;

        let values = match self {
            Forecaster::Arima(config) => arima::forecast(&series.closes(), days, config)?,
            Forecaster::Sequence(config) => sequence::forecast(&series.closes(), days, config)?,
            Forecaster::Seasonal(config) => {
                seasonal::forecast(&series.dates(), &series.closes(), days, config)?
            }
        };

        if values.len() != days {
            return Err(ModelError::fit(format!(
                "expected {} forecast values, got {}",
                days,
                values.len()
            )));
        }

        ForecastSeries::from_values(self.kind(), last_date, values)
    }
}
