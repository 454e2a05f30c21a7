//! Technical indicators over a daily close series.
//!
//! Every indicator returns an [`IndicatorSeries`] aligned one-to-one with the
//! input bars. Points inside the warm-up window are marked invalid rather
//! than omitted, so index `i` always refers to bar `i`.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::domain::series::PriceSeries;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndicatorValue {
    Simple(f64),
    Macd { line: f64, signal: f64, histogram: f64 },
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd { fast: usize, slow: usize, signal: usize },
    Bollinger { period: usize, stddev_mult_x100: u32 },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at the final bar, if that bar is past warm-up.
    pub fn latest(&self) -> Option<IndicatorValue> {
        self.values.last().filter(|p| p.valid).map(|p| p.value)
    }

    pub fn latest_simple(&self) -> Option<f64> {
        match self.latest()? {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiZone {
    pub fn of(rsi: f64) -> Self {
        if rsi > 70.0 {
            RsiZone::Overbought
        } else if rsi < 30.0 {
            RsiZone::Oversold
        } else {
            RsiZone::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdReading {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Where the close sits between the bands, 0 at the lower band and 100
    /// at the upper. `None` when the bands have collapsed.
    pub position_pct: Option<f64>,
}

/// Most recent value of each standard indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_20: Option<f64>,
    pub rsi_14: Option<f64>,
    pub rsi_zone: Option<RsiZone>,
    pub macd: Option<MacdReading>,
    pub bollinger: Option<BollingerReading>,
}

impl IndicatorSnapshot {
    /// `None` for an empty series.
    pub fn latest(series: &PriceSeries) -> Option<Self> {
        let last = series.last()?;
        let bars = &series.bars;

        let rsi_14 = calculate_rsi(bars, 14).latest_simple();
        let macd = match calculate_macd(bars, macd::DEFAULT_FAST, macd::DEFAULT_SLOW, macd::DEFAULT_SIGNAL).latest() {
            Some(IndicatorValue::Macd {
                line,
                signal,
                histogram,
            }) => Some(MacdReading {
                line,
                signal,
                histogram,
            }),
            _ => None,
        };
        let bollinger = match calculate_bollinger(bars, 20, 200).latest() {
            Some(IndicatorValue::Bollinger { upper, middle, lower }) => {
                let width = upper - lower;
                Some(BollingerReading {
                    upper,
                    middle,
                    lower,
                    position_pct: (width > 0.0).then(|| (last.close - lower) / width * 100.0),
                })
            }
            _ => None,
        };

        Some(IndicatorSnapshot {
            date: last.date,
            close: last.close,
            sma_20: calculate_sma(bars, 20).latest_simple(),
            sma_50: calculate_sma(bars, 50).latest_simple(),
            ema_20: calculate_ema(bars, 20).latest_simple(),
            rsi_14,
            rsi_zone: rsi_14.map(RsiZone::of),
            macd,
            bollinger,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_bars {
    use crate::domain::ohlcv::PriceBar;
    use chrono::{Duration, NaiveDate};

    pub fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar::from_close(start + Duration::days(i as i64), close))
            .collect()
    }
}
