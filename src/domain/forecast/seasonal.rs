//! Additive trend plus Fourier seasonality.
//!
//! `y(t) = k + m·t + weekly(t) + yearly(t)` with `t` the day offset from the
//! first observation scaled so the history spans [0, 1]. Daily seasonality is
//! constant on daily bars and folds into `k`. Yearly terms are only fitted
//! once the history covers two years.
//!
//! Weekdays never seen in the history (weekends on exchange data) take the
//! weekly effect of the closest earlier weekday that was seen.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use crate::domain::error::ModelError;

const WEEK: f64 = 7.0;
const YEAR: f64 = 365.25;
const YEARLY_MIN_SPAN_DAYS: i64 = 730;

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalConfig {
    pub min_points: usize,
    pub weekly_order: usize,
    pub yearly_order: usize,
    /// Ridge penalty on the seasonal coefficients; trend terms are not penalised.
    pub ridge: f64,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        SeasonalConfig {
            min_points: 14,
            weekly_order: 3,
            yearly_order: 10,
            ridge: 1e-3,
        }
    }
}

struct Basis {
    span_days: f64,
    weekly_order: usize,
    yearly_order: usize,
}

impl Basis {
    fn width(&self) -> usize {
        2 + 2 * self.weekly_order + 2 * self.yearly_order
    }

    fn row(&self, offset_days: f64) -> Vec<f64> {
        self.row_at(offset_days, offset_days)
    }

    /// Trend and yearly terms at `offset_days`, weekly terms at `weekly_days`.
    fn row_at(&self, offset_days: f64, weekly_days: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.push(1.0);
        row.push(offset_days / self.span_days);
        for k in 1..=self.weekly_order {
            let angle = 2.0 * PI * k as f64 * weekly_days / WEEK;
            row.push(angle.sin());
            row.push(angle.cos());
        }
        for k in 1..=self.yearly_order {
            let angle = 2.0 * PI * k as f64 * offset_days / YEAR;
            row.push(angle.sin());
            row.push(angle.cos());
        }
        row
    }
}

/// Which day-of-week phases (offset mod 7) occur in the history.
fn observed_phases(offsets: &[i64]) -> [bool; 7] {
    let mut seen = [false; 7];
    for offset in offsets {
        seen[offset.rem_euclid(7) as usize] = true;
    }
    seen
}

/// `offset`, moved back to the nearest day whose phase was observed.
fn nearest_observed(offset: i64, seen: &[bool; 7]) -> i64 {
    (0..7)
        .map(|back| offset - back)
        .find(|day| seen[day.rem_euclid(7) as usize])
        .unwrap_or(offset)
}

pub fn forecast(
    dates: &[NaiveDate],
    closes: &[f64],
    days: usize,
    config: &SeasonalConfig,
) -> Result<Vec<f64>, ModelError> {
    let need = config.min_points.max(3);
    if closes.len() < need || dates.len() != closes.len() {
        return Err(ModelError::InsufficientData {
            have: closes.len().min(dates.len()),
            need,
        });
    }

    let first = dates[0];
    let days_in: Vec<i64> = dates.iter().map(|d| (*d - first).num_days()).collect();
    let offsets: Vec<f64> = days_in.iter().map(|&d| d as f64).collect();
    let span = (dates[dates.len() - 1] - first).num_days();
    if span <= 0 {
        return Err(ModelError::fit("history covers a single day"));
    }

    let basis = Basis {
        span_days: span as f64,
        weekly_order: config.weekly_order,
        yearly_order: if span >= YEARLY_MIN_SPAN_DAYS { config.yearly_order } else { 0 },
    };

    let scale = closes.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if !(scale.is_finite() && scale > 0.0) {
        return Err(ModelError::fit("closes cannot be scaled"));
    }

    let width = basis.width();
    let rows: Vec<f64> = offsets.iter().flat_map(|&t| basis.row(t)).collect();
    let x = DMatrix::from_row_slice(offsets.len(), width, &rows);
    let y = DVector::from_iterator(closes.len(), closes.iter().map(|v| v / scale));

    let mut normal = x.tr_mul(&x);
    for j in 2..width {
        normal[(j, j)] += config.ridge;
    }
    let rhs = x.tr_mul(&y);
    let beta = normal
        .cholesky()
        .ok_or_else(|| ModelError::fit("singular normal equations"))?
        .solve(&rhs);

    tracing::debug!(
        intercept = beta[0] * scale,
        slope = beta[1] * scale,
        terms = width,
        "seasonal model fitted"
    );

    let seen = observed_phases(&days_in);
    let last = days_in[days_in.len() - 1];
    let out: Vec<f64> = (1..=days as i64)
        .map(|h| {
            let t = last + h;
            let row = DVector::from_vec(basis.row_at(t as f64, nearest_observed(t, &seen) as f64));
            row.dot(&beta) * scale
        })
        .collect();

    if out.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::fit("seasonal forecast is not finite"));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn daily(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n as i64).map(|i| start + Duration::days(i)).collect()
    }

    #[test]
    fn rejects_fewer_than_two_weeks() {
        let dates = daily(13);
        let closes = vec![100.0; 13];
        let err = forecast(&dates, &closes, 5, &SeasonalConfig::default()).unwrap_err();
        assert_eq!(err, ModelError::InsufficientData { have: 13, need: 14 });
    }

    #[test]
    fn extends_a_linear_trend() {
        let dates = daily(60);
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + 0.5 * i as f64).collect();
        let out = forecast(&dates, &closes, 3, &SeasonalConfig::default()).unwrap();
        assert!((out[0] - 130.0).abs() < 1e-6);
        assert!((out[2] - 131.0).abs() < 1e-6);
    }

    #[test]
    fn reproduces_weekly_cycle() {
        let dates = daily(56);
        let closes: Vec<f64> = (0..56)
            .map(|i| 100.0 + 3.0 * (2.0 * PI * i as f64 / 7.0).sin())
            .collect();
        let out = forecast(&dates, &closes, 7, &SeasonalConfig::default()).unwrap();
        for (h, value) in out.iter().enumerate() {
            let t = (55 + h + 1) as f64;
            let expected = 100.0 + 3.0 * (2.0 * PI * t / 7.0).sin();
            assert!((value - expected).abs() < 0.05, "day {}: {} vs {}", h + 1, value, expected);
        }
    }

    #[test]
    fn business_day_history_still_fits() {
        let dates: Vec<NaiveDate> = daily(84)
            .into_iter()
            .filter(|d| {
                use chrono::Datelike;
                d.weekday().number_from_monday() <= 5
            })
            .collect();
        let closes: Vec<f64> = (0..dates.len()).map(|i| 200.0 + (i as f64 * 0.4).sin()).collect();
        let out = forecast(&dates, &closes, 10, &SeasonalConfig::default()).unwrap();
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn weekends_follow_the_preceding_friday() {
        use chrono::Datelike;
        // Mon..Fri pattern, no trend
        let pattern = [100.0, 102.0, 104.0, 103.0, 101.0];
        let dates: Vec<NaiveDate> = daily(84)
            .into_iter()
            .filter(|d| d.weekday().number_from_monday() <= 5)
            .collect();
        let closes: Vec<f64> = dates
            .iter()
            .map(|d| pattern[d.weekday().num_days_from_monday() as usize])
            .collect();
        assert_eq!(dates.last().unwrap().weekday(), chrono::Weekday::Fri);

        let out = forecast(&dates, &closes, 9, &SeasonalConfig::default()).unwrap();
        // out[0..2] Sat/Sun, out[2..7] Mon..Fri, out[7..9] Sat/Sun
        for weekend in [out[0], out[1]] {
            assert!((weekend - 101.0).abs() < 0.5, "{out:?}");
        }
        for (value, expected) in out[2..7].iter().zip(pattern) {
            assert!((value - expected).abs() < 0.5, "{out:?}");
        }
        for weekend in [out[7], out[8]] {
            assert!((weekend - out[6]).abs() < 0.5, "{out:?}");
        }
    }

    #[test]
    fn unseen_phases_map_back_to_seen_ones() {
        let seen = observed_phases(&[0, 1, 2, 3, 4, 7, 8]);
        assert_eq!(seen, [true, true, true, true, true, false, false]);
        assert_eq!(nearest_observed(12, &seen), 11);
        assert_eq!(nearest_observed(13, &seen), 11);
        assert_eq!(nearest_observed(14, &seen), 14);
    }

    #[test]
    fn basis_width_counts_fourier_pairs() {
        let short = Basis { span_days: 400.0, weekly_order: 3, yearly_order: 0 };
        let long = Basis { span_days: 800.0, weekly_order: 3, yearly_order: 10 };
        assert_eq!(short.width(), 8);
        assert_eq!(long.width(), 28);
    }

    #[test]
    fn multi_year_history_fits_with_yearly_terms() {
        let dates = daily(800);
        let closes: Vec<f64> = (0..800)
            .map(|i| 500.0 + 0.1 * i as f64 + 20.0 * (2.0 * PI * i as f64 / YEAR).sin())
            .collect();
        let out = forecast(&dates, &closes, 5, &SeasonalConfig::default()).unwrap();
        let next = 500.0 + 0.1 * 800.0 + 20.0 * (2.0 * PI * 800.0 / YEAR).sin();
        assert!((out[0] - next).abs() < 1.0);
    }
}
