//! Domain error types.
//!
//! Two layers: [`ModelError`] is the soft, per-model failure that the
//! ensemble combiner absorbs; [`StockcastError`] is what escapes the library.

use std::time::Duration;

use crate::domain::forecast::ModelKind;

/// Failure of a single forecasting model. Never escapes the combiner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient data: have {have} points, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("model fit failed: {reason}")]
    Fit { reason: String },

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("model panicked during fit")]
    Panicked,

    #[error("forecast dates do not match the ensemble index")]
    Misaligned,
}

impl ModelError {
    pub fn fit(reason: impl Into<String>) -> Self {
        ModelError::Fit {
            reason: reason.into(),
        }
    }
}

/// A model that was excluded from the ensemble, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFailure {
    pub model: ModelKind,
    pub error: ModelError,
}

impl std::fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

fn join_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error type for stockcast.
#[derive(Debug, thiserror::Error)]
pub enum StockcastError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("unable to generate predictions: all models failed ({})", join_failures(.failures))]
    EnsembleExhausted { failures: Vec<ModelFailure> },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("symbol {symbol} is not in the configured universe")]
    UnknownSymbol { symbol: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("market data source error: {reason}")]
    DataSource { reason: String },

    #[error("trade rejected: {reason}")]
    Trade { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StockcastError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        StockcastError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        StockcastError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&StockcastError> for std::process::ExitCode {
    fn from(err: &StockcastError) -> Self {
        let code: u8 = match err {
            StockcastError::Io(_) | StockcastError::Json(_) => 1,
            StockcastError::ConfigParse { .. }
            | StockcastError::ConfigMissing { .. }
            | StockcastError::ConfigInvalid { .. } => 2,
            StockcastError::Database { .. } | StockcastError::DatabaseQuery { .. } => 3,
            StockcastError::DataSource { .. } => 4,
            StockcastError::EmptySeries
            | StockcastError::EnsembleExhausted { .. }
            | StockcastError::InvalidInput { .. }
            | StockcastError::NoData { .. }
            | StockcastError::UnknownSymbol { .. } => 5,
            StockcastError::Trade { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
