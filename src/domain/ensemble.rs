//! Ensemble combiner.
//!
//! Runs every configured forecaster in isolation, drops the ones that fail,
//! panic, time out or disagree on the date index, and averages the rest.

use chrono::NaiveDate;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::error::{ModelError, ModelFailure, StockcastError};
use crate::domain::forecast::{ForecastSeries, Forecaster, ModelKind};
use crate::domain::series::PriceSeries;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Sequential,
    Parallel,
}

/// Outcome of one model run, before combination.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub model: ModelKind,
    pub result: Result<ForecastSeries, ModelError>,
}

/// Per-model columns over a shared date index plus their per-date mean.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleForecast {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<ForecastSeries>,
    pub ensemble: Vec<f64>,
    #[serde(skip)]
    pub failures: Vec<ModelFailure>,
}

impl EnsembleForecast {
    pub fn len(&self) -> usize {
        self.ensemble.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ensemble.is_empty()
    }

    pub fn column(&self, model: ModelKind) -> Option<&ForecastSeries> {
        self.columns.iter().find(|c| c.model == model)
    }

    pub fn models(&self) -> Vec<ModelKind> {
        self.columns.iter().map(|c| c.model).collect()
    }
}

#[derive(Debug, Clone)]
pub struct EnsembleCombiner {
    pub forecasters: Vec<Forecaster>,
    pub execution: Execution,
    /// `None` waits indefinitely.
    pub model_timeout: Option<Duration>,
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        EnsembleCombiner::new(
            ModelKind::ALL
                .iter()
                .map(|&kind| Forecaster::default_for(kind))
                .collect(),
        )
    }
}

impl EnsembleCombiner {
    pub fn new(forecasters: Vec<Forecaster>) -> Self {
        EnsembleCombiner {
            forecasters,
            execution: Execution::Parallel,
            model_timeout: Some(DEFAULT_MODEL_TIMEOUT),
        }
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout = timeout;
        self
    }

    /// Run every model on its own copy of `series`, then [`combine`].
    pub fn forecast(&self, series: &PriceSeries, days: usize) -> Result<EnsembleForecast, StockcastError> {
        combine(self.run(series, days))
    }

    /// Run every model and collect the raw outcomes in configuration order.
    pub fn run(&self, series: &PriceSeries, days: usize) -> Vec<ModelRun> {
        tracing::info!(
            symbol = %series.symbol,
            models = self.forecasters.len(),
            days,
            execution = ?self.execution,
            "running forecast models"
        );
        match self.execution {
            Execution::Sequential => self
                .forecasters
                .iter()
                .map(|forecaster| {
                    let (tx, rx) = mpsc::channel();
                    let result = match spawn_model(0, forecaster, series, days, tx) {
                        Ok(()) => self.wait_one(&rx),
                        Err(error) => Err(error),
                    };
                    ModelRun {
                        model: forecaster.kind(),
                        result,
                    }
                })
                .collect(),
            Execution::Parallel => self.run_parallel(series, days),
        }
    }

    fn wait_one(&self, rx: &mpsc::Receiver<(usize, Result<ForecastSeries, ModelError>)>) -> Result<ForecastSeries, ModelError> {
        let received = match self.model_timeout {
            Some(timeout) => rx.recv_timeout(timeout),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((_, result)) => result,
            Err(RecvTimeoutError::Timeout) => Err(ModelError::Timeout {
                after: self.model_timeout.unwrap_or_default(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(ModelError::Panicked),
        }
    }

    fn run_parallel(&self, series: &PriceSeries, days: usize) -> Vec<ModelRun> {
        let (tx, rx) = mpsc::channel();
        let mut slots: Vec<Option<Result<ForecastSeries, ModelError>>> = vec![None; self.forecasters.len()];

        let mut pending = 0;
        for (idx, forecaster) in self.forecasters.iter().enumerate() {
            match spawn_model(idx, forecaster, series, days, tx.clone()) {
                Ok(()) => pending += 1,
                Err(error) => slots[idx] = Some(Err(error)),
            }
        }
        drop(tx);

        let deadline = self.model_timeout.map(|t| Instant::now() + t);
        let mut missing = ModelError::Panicked;
        while pending > 0 {
            let received = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((idx, result)) => {
                    slots[idx] = Some(result);
                    pending -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    missing = ModelError::Timeout {
                        after: self.model_timeout.unwrap_or_default(),
                    };
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.forecasters
            .iter()
            .zip(slots)
            .map(|(forecaster, slot)| ModelRun {
                model: forecaster.kind(),
                result: slot.unwrap_or_else(|| Err(missing.clone())),
            })
            .collect()
    }
}

/// Starts `forecaster` on a detached thread that reports `(idx, result)` on `tx`.
/// A late result after the receiver is gone is dropped.
fn spawn_model(
    idx: usize,
    forecaster: &Forecaster,
    series: &PriceSeries,
    days: usize,
    tx: mpsc::Sender<(usize, Result<ForecastSeries, ModelError>)>,
) -> Result<(), ModelError> {
    let forecaster = forecaster.clone();
    let series = series.clone();
    let kind = forecaster.kind();
    thread::Builder::new()
        .name(format!("forecast-{}", kind.name().to_lowercase()))
        .spawn(move || {
            let started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| forecaster.fit_and_forecast(&series, days)))
                .unwrap_or(Err(ModelError::Panicked));
            tracing::debug!(model = %kind, elapsed_ms = started.elapsed().as_millis() as u64, ok = result.is_ok(), "model finished");
            let _ = tx.send((idx, result));
        })
        .map(|_| ())
        .map_err(|e| ModelError::fit(format!("could not start model thread: {}", e)))
}

/// Pure combination step: keeps successful runs that share the first
/// survivor's date index and averages them per date.
pub fn combine(runs: Vec<ModelRun>) -> Result<EnsembleForecast, StockcastError> {
    let mut columns: Vec<ForecastSeries> = Vec::new();
    let mut failures: Vec<ModelFailure> = Vec::new();
    let mut dates: Option<Vec<NaiveDate>> = None;

    for run in runs {
        match run.result {
            Ok(series) => {
                let series_dates = series.dates();
                match &dates {
                    None => {
                        dates = Some(series_dates);
                        columns.push(series);
                    }
                    Some(reference) if *reference == series_dates => columns.push(series),
                    Some(_) => failures.push(ModelFailure {
                        model: run.model,
                        error: ModelError::Misaligned,
                    }),
                }
            }
            Err(error) => failures.push(ModelFailure {
                model: run.model,
                error,
            }),
        }
    }

    for failure in &failures {
        tracing::warn!(model = %failure.model, error = %failure.error, "model excluded from ensemble");
    }

    let Some(dates) = dates else {
        return Err(StockcastError::EnsembleExhausted { failures });
    };

    let width = columns.len() as f64;
    let ensemble = (0..dates.len())
        .map(|i| columns.iter().map(|c| c.points[i].predicted_price).sum::<f64>() / width)
        .collect();

    tracing::info!(
        survivors = columns.len(),
        failed = failures.len(),
        "ensemble combined"
    );

    Ok(EnsembleForecast {
        dates,
        columns,
        ensemble,
        failures,
    })
}
