//! Recommendation engine.
//!
//! Turns a consensus forecast and the current price into a buy/sell/hold
//! signal with a confidence level and a rationale. Horizon returns are the
//! percentage change from the current price of:
//!
//! - short: the mean of the first `short_window` forecast days,
//! - medium: the mean of the following `medium_window` days, or of as many
//!   of them as the forecast covers,
//! - long: the final forecast day.
//!
//! Rules are checked in order and the first match wins; thresholds live in
//! [`RecommendationPolicy`].

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::ensemble::EnsembleForecast;
use crate::domain::error::StockcastError;
use crate::domain::forecast::ModelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Signal {
    type Err = StockcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Signal::Buy),
            "sell" => Ok(Signal::Sell),
            "hold" => Ok(Signal::Hold),
            other => Err(StockcastError::invalid_input(format!("unknown signal '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Moderate,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "Low",
            Confidence::Moderate => "Moderate",
            Confidence::High => "High",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outlook {
    Bullish,
    Bearish,
}

impl fmt::Display for Outlook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outlook::Bullish => f.write_str("Bullish"),
            Outlook::Bearish => f.write_str("Bearish"),
        }
    }
}

/// Direction of one model's final-day forecast relative to the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSignal {
    pub model: ModelKind,
    pub outlook: Outlook,
}

/// Percentage returns per horizon, plus the day counts they cover.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HorizonReturns {
    pub short_pct: f64,
    pub medium_pct: f64,
    pub long_pct: f64,
    pub short_days: usize,
    pub medium_days: usize,
    pub long_days: usize,
}

impl HorizonReturns {
    /// Returns over the default 7/14/30 day horizons.
    pub fn new(short_pct: f64, medium_pct: f64, long_pct: f64) -> Self {
        HorizonReturns {
            short_pct,
            medium_pct,
            long_pct,
            short_days: 7,
            medium_days: 14,
            long_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub signal: Signal,
    pub confidence: Confidence,
    pub rationale: String,
    pub returns: Option<HorizonReturns>,
    pub model_signals: Vec<ModelSignal>,
}

impl Recommendation {
    /// Fallback hold used when the inputs cannot support a recommendation.
    pub fn insufficient(reason: &str) -> Self {
        Recommendation {
            signal: Signal::Hold,
            confidence: Confidence::Low,
            rationale: format!("Insufficient data for recommendation: {}", reason),
            returns: None,
            model_signals: Vec::new(),
        }
    }
}

/// Threshold table. Returns are percentages; every comparison is strict.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationPolicy {
    pub strong_buy_short: f64,
    pub strong_buy_medium: f64,
    pub strong_buy_long: f64,
    pub buy_short: f64,
    pub buy_medium: f64,
    pub strong_sell_short: f64,
    pub strong_sell_medium: f64,
    pub strong_sell_long: f64,
    pub sell_short: f64,
    pub sell_medium: f64,
    pub short_window: usize,
    pub medium_window: usize,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        RecommendationPolicy {
            strong_buy_short: 5.0,
            strong_buy_medium: 3.0,
            strong_buy_long: 0.0,
            buy_short: 3.0,
            buy_medium: 0.0,
            strong_sell_short: -5.0,
            strong_sell_medium: -3.0,
            strong_sell_long: 0.0,
            sell_short: -3.0,
            sell_medium: 0.0,
            short_window: 7,
            medium_window: 7,
        }
    }
}

impl RecommendationPolicy {
    /// Shortest forecast with at least one medium-window day.
    pub fn min_forecast_days(&self) -> usize {
        self.short_window + 1
    }

    /// Day after the last medium-window day when the forecast is long enough.
    pub fn full_medium_end(&self) -> usize {
        self.short_window + self.medium_window
    }
}

/// Pure rule table over horizon returns.
pub fn classify(returns: &HorizonReturns, policy: &RecommendationPolicy) -> (Signal, Confidence) {
    let (s, m, l) = (returns.short_pct, returns.medium_pct, returns.long_pct);

    if s > policy.strong_buy_short && m > policy.strong_buy_medium && l > policy.strong_buy_long {
        (Signal::Buy, Confidence::High)
    } else if s > policy.buy_short && m > policy.buy_medium {
        (Signal::Buy, Confidence::Moderate)
    } else if s < policy.strong_sell_short
        && m < policy.strong_sell_medium
        && l < policy.strong_sell_long
    {
        (Signal::Sell, Confidence::High)
    } else if s < policy.sell_short && m < policy.sell_medium {
        (Signal::Sell, Confidence::Moderate)
    } else {
        (Signal::Hold, Confidence::Moderate)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn pct_change(price: f64, reference: f64) -> f64 {
    (price - reference) / reference * 100.0
}

/// Horizon returns of a consensus path against `current_price`.
pub fn horizon_returns(
    ensemble: &[f64],
    current_price: f64,
    policy: &RecommendationPolicy,
) -> Result<HorizonReturns, StockcastError> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return Err(StockcastError::invalid_input(format!(
            "current price {} is not positive",
            current_price
        )));
    }
    if policy.short_window == 0 || policy.medium_window == 0 {
        return Err(StockcastError::invalid_input("averaging windows must be non-empty"));
    }
    if ensemble.len() < policy.min_forecast_days() {
        return Err(StockcastError::invalid_input(format!(
            "forecast covers {} days, need at least {}",
            ensemble.len(),
            policy.min_forecast_days()
        )));
    }
    let medium_end = policy.full_medium_end().min(ensemble.len());
    if ensemble.iter().any(|v| !v.is_finite()) {
        return Err(StockcastError::invalid_input("forecast contains non-finite values"));
    }

    let short = mean(&ensemble[..policy.short_window]);
    let medium = mean(&ensemble[policy.short_window..medium_end]);
    let long = ensemble[ensemble.len() - 1];

    Ok(HorizonReturns {
        short_pct: pct_change(short, current_price),
        medium_pct: pct_change(medium, current_price),
        long_pct: pct_change(long, current_price),
        short_days: policy.short_window,
        medium_days: medium_end,
        long_days: ensemble.len(),
    })
}

/// Final-day direction of every surviving model, in column order.
pub fn model_signals(ensemble: &EnsembleForecast, current_price: f64) -> Vec<ModelSignal> {
    ensemble
        .columns
        .iter()
        .filter_map(|column| {
            column.last_value().map(|last| ModelSignal {
                model: column.model,
                outlook: if last > current_price {
                    Outlook::Bullish
                } else {
                    Outlook::Bearish
                },
            })
        })
        .collect()
}

fn headline(signal: Signal, confidence: Confidence, r: &HorizonReturns) -> String {
    match (signal, confidence) {
        (Signal::Buy, Confidence::High) => format!(
            "Strong buy signal with expected returns of {:.2}% ({} days), {:.2}% ({} days), and {:.2}% ({} days). \
             All prediction models show an upward trend.",
            r.short_pct, r.short_days, r.medium_pct, r.medium_days, r.long_pct, r.long_days
        ),
        (Signal::Buy, _) => format!(
            "Moderate buy signal with expected returns of {:.2}% ({} days) and {:.2}% ({} days), \
             {:.2}% by day {}. Short to medium-term outlook is positive.",
            r.short_pct, r.short_days, r.medium_pct, r.medium_days, r.long_pct, r.long_days
        ),
        (Signal::Sell, Confidence::High) => format!(
            "Strong sell signal with expected losses of {:.2}% ({} days), {:.2}% ({} days), and {:.2}% ({} days). \
             All prediction models show a downward trend.",
            r.short_pct, r.short_days, r.medium_pct, r.medium_days, r.long_pct, r.long_days
        ),
        (Signal::Sell, _) => format!(
            "Moderate sell signal with expected losses of {:.2}% ({} days) and {:.2}% ({} days), \
             {:.2}% by day {}. Short to medium-term outlook is negative.",
            r.short_pct, r.short_days, r.medium_pct, r.medium_days, r.long_pct, r.long_days
        ),
        (Signal::Hold, _) => format!(
            "Hold recommendation based on mixed signals. Short-term: {:.2}%, Medium-term: {:.2}%, \
             Long-term: {:.2}%. Monitor the stock for clearer trends.",
            r.short_pct, r.medium_pct, r.long_pct
        ),
    }
}

/// Fallible form: invalid input is reported instead of defaulting to hold.
pub fn try_recommend(
    ensemble: Option<&EnsembleForecast>,
    current_price: Option<f64>,
    policy: &RecommendationPolicy,
) -> Result<Recommendation, StockcastError> {
    let ensemble = ensemble
        .filter(|e| !e.is_empty())
        .ok_or_else(|| StockcastError::invalid_input("no forecast available"))?;
    let price = current_price.ok_or_else(|| StockcastError::invalid_input("no current price"))?;

    let returns = horizon_returns(&ensemble.ensemble, price, policy)?;
    let (signal, confidence) = classify(&returns, policy);
    let signals = model_signals(ensemble, price);

    let agreement = signals
        .iter()
        .map(|s| format!("{}: {}", s.model, s.outlook))
        .collect::<Vec<_>>()
        .join(", ");
    let rationale = format!(
        "{}\n\nModel signals: {}\n\nConfidence: {}",
        headline(signal, confidence, &returns),
        agreement,
        confidence
    );

    Ok(Recommendation {
        signal,
        confidence,
        rationale,
        returns: Some(returns),
        model_signals: signals,
    })
}

/// Advisory form: never fails, invalid input yields a low-confidence hold.
pub fn recommend(
    ensemble: Option<&EnsembleForecast>,
    current_price: Option<f64>,
    policy: &RecommendationPolicy,
) -> Recommendation {
    match try_recommend(ensemble, current_price, policy) {
        Ok(recommendation) => recommendation,
        Err(err) => {
            let reason = match &err {
                StockcastError::InvalidInput { reason } => reason.clone(),
                other => other.to_string(),
            };
            tracing::warn!(%reason, "defaulting to hold");
            Recommendation::insufficient(&reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forecast::ForecastSeries;
    use chrono::NaiveDate;

    fn table(columns: Vec<(ModelKind, Vec<f64>)>) -> EnsembleForecast {
        let last = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let columns: Vec<ForecastSeries> = columns
            .into_iter()
            .map(|(model, values)| ForecastSeries::from_values(model, last, values).unwrap())
            .collect();
        let n = columns[0].len();
        let ensemble = (0..n)
            .map(|i| columns.iter().map(|c| c.points[i].predicted_price).sum::<f64>() / columns.len() as f64)
            .collect();
        EnsembleForecast {
            dates: columns[0].dates(),
            columns,
            ensemble,
            failures: vec![],
        }
    }

    #[test]
    fn classify_strong_buy() {
        let p = RecommendationPolicy::default();
        assert_eq!(
            classify(&HorizonReturns::new(6.0, 4.0, 1.0), &p),
            (Signal::Buy, Confidence::High)
        );
    }

    #[test]
    fn classify_strong_sell() {
        let p = RecommendationPolicy::default();
        assert_eq!(
            classify(&HorizonReturns::new(-6.0, -4.0, -1.0), &p),
            (Signal::Sell, Confidence::High)
        );
    }

    #[test]
    fn classify_mixed_is_hold() {
        let p = RecommendationPolicy::default();
        assert_eq!(
            classify(&HorizonReturns::new(1.0, 1.0, 1.0), &p),
            (Signal::Hold, Confidence::Moderate)
        );
    }

    #[test]
    fn classify_moderate_rules() {
        let p = RecommendationPolicy::default();
        // long is negative so the strong rule misses
        assert_eq!(
            classify(&HorizonReturns::new(6.0, 4.0, -1.0), &p),
            (Signal::Buy, Confidence::Moderate)
        );
        assert_eq!(
            classify(&HorizonReturns::new(-4.0, -0.5, 2.0), &p),
            (Signal::Sell, Confidence::Moderate)
        );
    }

    #[test]
    fn thresholds_are_strict() {
        let p = RecommendationPolicy::default();
        assert_eq!(classify(&HorizonReturns::new(3.0, 1.0, 1.0), &p).0, Signal::Hold);
        assert_eq!(classify(&HorizonReturns::new(-3.0, -1.0, -1.0), &p).0, Signal::Hold);
    }

    #[test]
    fn horizon_windows_split_at_seven_and_fourteen() {
        let mut path = vec![110.0; 7];
        path.extend(vec![120.0; 7]);
        path.extend(vec![90.0; 16]);
        let r = horizon_returns(&path, 100.0, &RecommendationPolicy::default()).unwrap();
        assert!((r.short_pct - 10.0).abs() < 1e-9);
        assert!((r.medium_pct - 20.0).abs() < 1e-9);
        assert!((r.long_pct + 10.0).abs() < 1e-9);
        assert_eq!((r.short_days, r.medium_days, r.long_days), (7, 14, 30));
    }

    #[test]
    fn forecast_within_short_window_is_invalid_input() {
        let err = horizon_returns(&[100.0; 7], 100.0, &RecommendationPolicy::default()).unwrap_err();
        assert!(matches!(err, StockcastError::InvalidInput { .. }));
    }

    #[test]
    fn partial_medium_window_uses_available_days() {
        let mut path = vec![110.0; 7];
        path.extend([120.0, 130.0, 140.0]);
        let r = horizon_returns(&path, 100.0, &RecommendationPolicy::default()).unwrap();
        assert!((r.short_pct - 10.0).abs() < 1e-9);
        assert!((r.medium_pct - 30.0).abs() < 1e-9);
        assert!((r.long_pct - 40.0).abs() < 1e-9);
        assert_eq!((r.short_days, r.medium_days, r.long_days), (7, 10, 10));
    }

    #[test]
    fn ten_day_horizon_still_recommends() {
        let t = table(vec![(ModelKind::Arima, vec![110.0; 10])]);
        let r = recommend(Some(&t), Some(100.0), &RecommendationPolicy::default());
        assert_eq!((r.signal, r.confidence), (Signal::Buy, Confidence::High));
        assert!(r.rationale.starts_with(
            "Strong buy signal with expected returns of 10.00% (7 days), 10.00% (10 days), and 10.00% (10 days)."
        ));
    }

    #[test]
    fn non_positive_price_defaults_to_hold() {
        let t = table(vec![(ModelKind::Arima, vec![105.0; 30])]);
        for price in [Some(0.0), Some(-3.0), Some(f64::NAN), None] {
            let r = recommend(Some(&t), price, &RecommendationPolicy::default());
            assert_eq!(r.signal, Signal::Hold);
            assert_eq!(r.confidence, Confidence::Low);
            assert!(r.rationale.starts_with("Insufficient data for recommendation"));
        }
    }

    #[test]
    fn absent_forecast_defaults_to_hold() {
        let r = recommend(None, Some(100.0), &RecommendationPolicy::default());
        assert_eq!(r.signal, Signal::Hold);
        assert!(r.returns.is_none());
    }

    #[test]
    fn try_recommend_reports_invalid_input() {
        assert!(matches!(
            try_recommend(None, Some(100.0), &RecommendationPolicy::default()),
            Err(StockcastError::InvalidInput { .. })
        ));
    }

    #[test]
    fn rationale_lists_horizons_models_and_confidence() {
        let t = table(vec![
            (ModelKind::Arima, vec![110.0; 30]),
            (ModelKind::Lstm, vec![95.0; 30]),
        ]);
        let r = recommend(Some(&t), Some(100.0), &RecommendationPolicy::default());
        // mean path is 102.5 everywhere
        assert_eq!(r.signal, Signal::Hold);
        assert!(r.rationale.contains("Short-term: 2.50%"));
        assert!(r.rationale.contains("Long-term: 2.50%"));
        assert!(r.rationale.contains("Model signals: ARIMA: Bullish, LSTM: Bearish"));
        assert!(r.rationale.ends_with("Confidence: Moderate"));
    }

    #[test]
    fn strong_buy_rationale_names_horizon_lengths() {
        let t = table(vec![(ModelKind::Seasonal, vec![110.0; 30])]);
        let r = recommend(Some(&t), Some(100.0), &RecommendationPolicy::default());
        assert_eq!((r.signal, r.confidence), (Signal::Buy, Confidence::High));
        assert!(r.rationale.starts_with(
            "Strong buy signal with expected returns of 10.00% (7 days), 10.00% (14 days), and 10.00% (30 days)."
        ));
    }

    #[test]
    fn final_day_equal_to_price_is_bearish() {
        let t = table(vec![(ModelKind::Arima, vec![100.0; 14])]);
        let signals = model_signals(&t, 100.0);
        assert_eq!(signals[0].outlook, Outlook::Bearish);
    }

    #[test]
    fn recommend_is_idempotent() {
        let path: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.3).collect();
        let t = table(vec![(ModelKind::Arima, path.clone()), (ModelKind::Seasonal, path)]);
        let policy = RecommendationPolicy::default();
        let a = recommend(Some(&t), Some(101.0), &policy);
        let b = recommend(Some(&t), Some(101.0), &policy);
        assert_eq!(a, b);
    }
}
