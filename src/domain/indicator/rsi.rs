//! Relative Strength Index over simple rolling means.
//!
//! avg_gain and avg_loss are the plain means of the last n close-to-close
//! gains and losses; RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! RSI is 100 when there are no losses and undefined (invalid) when the
//! window is flat. Warmup: first n bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let invalid = |bar: &PriceBar| IndicatorPoint {
        date: bar.date,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    };

    if period == 0 || bars.len() < 2 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values: bars.iter().map(invalid).collect(),
        };
    }

    let changes: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();

    let mut values = Vec::with_capacity(bars.len());
    values.push(invalid(&bars[0]));
    for (i, bar) in bars.iter().enumerate().skip(1) {
        if i < period {
            values.push(invalid(bar));
            continue;
        }
        let window = &changes[i - period..i];
        let avg_gain = window.iter().filter(|&&c| c > 0.0).sum::<f64>() / period as f64;
        let avg_loss = -window.iter().filter(|&&c| c < 0.0).sum::<f64>() / period as f64;

        let rsi = if avg_loss > 0.0 {
            Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
        } else if avg_gain > 0.0 {
            Some(100.0)
        } else {
            None
        };
        values.push(match rsi {
            Some(rsi) => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: IndicatorValue::Simple(rsi),
            },
            None => invalid(bar),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
