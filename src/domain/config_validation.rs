//! Configuration loading and validation.
//!
//! Every section is optional; absent keys take their defaults. A key that is
//! present but malformed or out of range is a `ConfigInvalid` error naming
//! the section and key, so nothing runs on a half-understood config.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::ensemble::{DEFAULT_MODEL_TIMEOUT, EnsembleCombiner, Execution};
use crate::domain::error::StockcastError;
use crate::domain::forecast::{ArimaConfig, Forecaster, ModelKind, SeasonalConfig, SequenceConfig};
use crate::domain::pipeline::PipelineOptions;
use crate::domain::recommendation::RecommendationPolicy;
use crate::domain::tax::TaxSchedule;
use crate::domain::universe::{Universe, parse_symbols};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_FORECAST_DAYS: usize = 30;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_ALPHAVANTAGE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Csv,
    AlphaVantage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub source: DataSourceKind,
    pub csv_dir: PathBuf,
    pub cache_ttl: Duration,
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqliteSettings {
    pub path: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub data: DataSettings,
    pub forecast_days: usize,
    pub pipeline: PipelineOptions,
    pub tax: TaxSchedule,
    pub sqlite: SqliteSettings,
    pub universe: Universe,
}

/// Reads and validates every section.
pub fn load_settings(config: &dyn ConfigPort) -> Result<Settings, StockcastError> {
    let policy = recommendation_policy(config)?;
    let forecast_days = forecast_days(config, &policy)?;
    let settings = Settings {
        data: data_settings(config)?,
        forecast_days,
        pipeline: PipelineOptions {
            combiner: ensemble_combiner(config)?,
            policy,
        },
        tax: tax_schedule(config)?,
        sqlite: sqlite_settings(config)?,
        universe: universe(config)?,
    };
    tracing::debug!(
        days = settings.forecast_days,
        models = settings.pipeline.combiner.forecasters.len(),
        symbols = settings.universe.count(),
        "configuration loaded"
    );
    Ok(settings)
}

fn parse_or<T: FromStr>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, StockcastError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| StockcastError::config_invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn at_least(config: &dyn ConfigPort, section: &str, key: &str, default: usize, min: usize) -> Result<usize, StockcastError> {
    let value = parse_or(config, section, key, default)?;
    if value < min {
        return Err(StockcastError::config_invalid(
            section,
            key,
            format!("{} must be at least {}", key, min),
        ));
    }
    Ok(value)
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, StockcastError> {
    let value = parse_or(config, section, key, default)?;
    if !value.is_finite() || value < 0.0 {
        return Err(StockcastError::config_invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

fn flag(config: &dyn ConfigPort, section: &str, key: &str, default: bool) -> Result<bool, StockcastError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            other => Err(StockcastError::config_invalid(
                section,
                key,
                format!("expected true or false, got '{}'", other),
            )),
        },
    }
}

pub fn arima_config(config: &dyn ConfigPort) -> Result<ArimaConfig, StockcastError> {
    let d = ArimaConfig::default();
    Ok(ArimaConfig {
        min_points: at_least(config, "arima", "min_points", d.min_points, 4)?,
        max_iterations: at_least(config, "arima", "max_iterations", d.max_iterations, 1)?,
    })
}

pub fn sequence_config(config: &dyn ConfigPort) -> Result<SequenceConfig, StockcastError> {
    let d = SequenceConfig::default();
    let learning_rate = parse_or(config, "lstm", "learning_rate", d.learning_rate)?;
    if !learning_rate.is_finite() || learning_rate <= 0.0 || learning_rate >= 1.0 {
        return Err(StockcastError::config_invalid(
            "lstm",
            "learning_rate",
            "learning_rate must be between 0 and 1",
        ));
    }
    let seed = match config.get_string("lstm", "seed") {
        Some(raw) if !raw.trim().is_empty() => Some(
            raw.trim()
                .parse::<u64>()
                .map_err(|_| StockcastError::config_invalid("lstm", "seed", "seed must be an unsigned integer"))?,
        ),
        _ => None,
    };
    Ok(SequenceConfig {
        look_back: at_least(config, "lstm", "look_back", d.look_back, 1)?,
        min_training_pairs: at_least(config, "lstm", "min_training_pairs", d.min_training_pairs, 1)?,
        epochs: at_least(config, "lstm", "epochs", d.epochs, 1)?,
        batch_size: at_least(config, "lstm", "batch_size", d.batch_size, 1)?,
        patience: at_least(config, "lstm", "patience", d.patience, 1)?,
        hidden_1: at_least(config, "lstm", "hidden_1", d.hidden_1, 1)?,
        hidden_2: at_least(config, "lstm", "hidden_2", d.hidden_2, 1)?,
        dense: at_least(config, "lstm", "dense", d.dense, 1)?,
        learning_rate,
        seed,
    })
}

pub fn seasonal_config(config: &dyn ConfigPort) -> Result<SeasonalConfig, StockcastError> {
    let d = SeasonalConfig::default();
    Ok(SeasonalConfig {
        min_points: at_least(config, "seasonal", "min_points", d.min_points, 3)?,
        weekly_order: at_least(config, "seasonal", "weekly_order", d.weekly_order, 0)?,
        yearly_order: at_least(config, "seasonal", "yearly_order", d.yearly_order, 0)?,
        ridge: non_negative(config, "seasonal", "ridge", d.ridge)?,
    })
}

/// Models listed in `[forecast] models`, in the order given.
pub fn model_kinds(config: &dyn ConfigPort) -> Result<Vec<ModelKind>, StockcastError> {
    let Some(names) = config.get_list("forecast", "models") else {
        return Ok(ModelKind::ALL.to_vec());
    };
    let mut kinds = Vec::with_capacity(names.len());
    for name in names {
        let kind = name
            .parse::<ModelKind>()
            .map_err(|_| StockcastError::config_invalid("forecast", "models", format!("unknown model '{}'", name)))?;
        if kinds.contains(&kind) {
            return Err(StockcastError::config_invalid(
                "forecast",
                "models",
                format!("model '{}' listed twice", name),
            ));
        }
        kinds.push(kind);
    }
    if kinds.is_empty() {
        return Err(StockcastError::config_invalid(
            "forecast",
            "models",
            "at least one model is required",
        ));
    }
    Ok(kinds)
}

pub fn ensemble_combiner(config: &dyn ConfigPort) -> Result<EnsembleCombiner, StockcastError> {
    let mut forecasters = Vec::new();
    for kind in model_kinds(config)? {
        forecasters.push(match kind {
            ModelKind::Arima => Forecaster::Arima(arima_config(config)?),
            ModelKind::Lstm => Forecaster::Sequence(sequence_config(config)?),
            ModelKind::Seasonal => Forecaster::Seasonal(seasonal_config(config)?),
        });
    }

    let execution = if flag(config, "forecast", "parallel", true)? {
        Execution::Parallel
    } else {
        Execution::Sequential
    };
    let timeout_secs = parse_or(config, "forecast", "model_timeout_secs", DEFAULT_MODEL_TIMEOUT.as_secs())?;
    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    Ok(EnsembleCombiner::new(forecasters)
        .with_execution(execution)
        .with_timeout(timeout))
}

pub fn forecast_days(config: &dyn ConfigPort, policy: &RecommendationPolicy) -> Result<usize, StockcastError> {
    let min = policy.min_forecast_days();
    let days = parse_or(config, "forecast", "days", DEFAULT_FORECAST_DAYS)?;
    if days < min {
        return Err(StockcastError::config_invalid(
            "forecast",
            "days",
            format!("days must reach past the short recommendation window ({} days)", min),
        ));
    }
    Ok(days)
}

pub fn recommendation_policy(config: &dyn ConfigPort) -> Result<RecommendationPolicy, StockcastError> {
    let d = RecommendationPolicy::default();
    let get = |key: &str, default: f64| -> Result<f64, StockcastError> {
        let value = parse_or(config, "policy", key, default)?;
        if !value.is_finite() {
            return Err(StockcastError::config_invalid("policy", key, "threshold must be finite"));
        }
        Ok(value)
    };

    let policy = RecommendationPolicy {
        strong_buy_short: get("strong_buy_short", d.strong_buy_short)?,
        strong_buy_medium: get("strong_buy_medium", d.strong_buy_medium)?,
        strong_buy_long: get("strong_buy_long", d.strong_buy_long)?,
        buy_short: get("buy_short", d.buy_short)?,
        buy_medium: get("buy_medium", d.buy_medium)?,
        strong_sell_short: get("strong_sell_short", d.strong_sell_short)?,
        strong_sell_medium: get("strong_sell_medium", d.strong_sell_medium)?,
        strong_sell_long: get("strong_sell_long", d.strong_sell_long)?,
        sell_short: get("sell_short", d.sell_short)?,
        sell_medium: get("sell_medium", d.sell_medium)?,
        short_window: at_least(config, "policy", "short_window", d.short_window, 1)?,
        medium_window: at_least(config, "policy", "medium_window", d.medium_window, 1)?,
    };
    validate_policy(&policy)?;
    Ok(policy)
}

/// Strong rules must be at least as strict as their moderate counterparts,
/// and buy thresholds must sit above sell thresholds.
pub fn validate_policy(policy: &RecommendationPolicy) -> Result<(), StockcastError> {
    let checks = [
        (
            policy.strong_buy_short >= policy.buy_short,
            "strong_buy_short",
            "strong_buy_short must not be below buy_short",
        ),
        (
            policy.strong_sell_short <= policy.sell_short,
            "strong_sell_short",
            "strong_sell_short must not be above sell_short",
        ),
        (
            policy.buy_short > policy.sell_short,
            "buy_short",
            "buy_short must be above sell_short",
        ),
        (
            policy.strong_buy_medium >= policy.buy_medium,
            "strong_buy_medium",
            "strong_buy_medium must not be below buy_medium",
        ),
        (
            policy.strong_sell_medium <= policy.sell_medium,
            "strong_sell_medium",
            "strong_sell_medium must not be above sell_medium",
        ),
    ];
    for (ok, key, reason) in checks {
        if !ok {
            return Err(StockcastError::config_invalid("policy", key, reason));
        }
    }
    Ok(())
}

pub fn tax_schedule(config: &dyn ConfigPort) -> Result<TaxSchedule, StockcastError> {
    let d = TaxSchedule::default();
    let pct = |key: &str, default: f64| -> Result<f64, StockcastError> {
        let value = non_negative(config, "tax", key, default)?;
        if value > 100.0 {
            return Err(StockcastError::config_invalid("tax", key, "rate must not exceed 100%"));
        }
        Ok(value)
    };
    Ok(TaxSchedule {
        stt_pct: pct("stt_pct", d.stt_pct)?,
        transaction_charges_pct: pct("transaction_charges_pct", d.transaction_charges_pct)?,
        gst_pct: pct("gst_pct", d.gst_pct)?,
        stamp_duty_pct: pct("stamp_duty_pct", d.stamp_duty_pct)?,
        short_term_gains_pct: pct("short_term_gains_pct", d.short_term_gains_pct)?,
        long_term_gains_pct: pct("long_term_gains_pct", d.long_term_gains_pct)?,
        long_term_exemption: non_negative(config, "tax", "long_term_exemption", d.long_term_exemption)?,
        profit_tax_pct: pct("profit_tax_pct", d.profit_tax_pct)?,
    })
}

pub fn data_settings(config: &dyn ConfigPort) -> Result<DataSettings, StockcastError> {
    let source = match config.get_string("data", "source") {
        None => DataSourceKind::Csv,
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "" | "csv" => DataSourceKind::Csv,
            "alphavantage" | "alpha_vantage" => DataSourceKind::AlphaVantage,
            other => {
                return Err(StockcastError::config_invalid(
                    "data",
                    "source",
                    format!("unknown source '{}', expected csv or alphavantage", other),
                ));
            }
        },
    };

    let api_key = config
        .get_string("alphavantage", "api_key")
        .map(|k| k.trim().to_string())
        .unwrap_or_else(|| "demo".to_string());
    if source == DataSourceKind::AlphaVantage && api_key.is_empty() {
        return Err(StockcastError::ConfigMissing {
            section: "alphavantage".to_string(),
            key: "api_key".to_string(),
        });
    }

    Ok(DataSettings {
        source,
        csv_dir: PathBuf::from(config.get_string("data", "csv_dir").unwrap_or_else(|| "data".to_string())),
        cache_ttl: Duration::from_secs(parse_or(config, "data", "cache_ttl_secs", DEFAULT_CACHE_TTL.as_secs())?),
        api_key,
        base_url: config
            .get_string("alphavantage", "base_url")
            .unwrap_or_else(|| DEFAULT_ALPHAVANTAGE_URL.to_string()),
    })
}

pub fn sqlite_settings(config: &dyn ConfigPort) -> Result<SqliteSettings, StockcastError> {
    let path = config
        .get_string("sqlite", "path")
        .unwrap_or_else(|| "stockcast.db".to_string());
    if path.trim().is_empty() {
        return Err(StockcastError::config_invalid("sqlite", "path", "path must not be empty"));
    }
    let pool_size = at_least(config, "sqlite", "pool_size", 4, 1)?;
    Ok(SqliteSettings {
        path,
        pool_size: u32::try_from(pool_size)
            .map_err(|_| StockcastError::config_invalid("sqlite", "pool_size", "pool_size is too large"))?,
    })
}

pub fn universe(config: &dyn ConfigPort) -> Result<Universe, StockcastError> {
    match config.get_string("universe", "symbols") {
        None => Ok(Universe::default()),
        Some(raw) => parse_symbols(&raw)
            .map(Universe::new)
            .map_err(|e| StockcastError::config_invalid("universe", "symbols", e.to_string())),
    }
}
