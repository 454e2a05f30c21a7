//! ARIMA(1,1,1) on closing prices.
//!
//! The differenced series is modelled as
//! `Δy_t = c + φ·Δy_{t-1} + θ·e_{t-1} + e_t`. Starting values come from a
//! two-stage Hannan–Rissanen regression; `(c, φ, θ)` are then refined by
//! Nelder–Mead on the conditional sum of squares with `|φ| < 1` and
//! `|θ| < 1` enforced by penalty.

use nalgebra::{DMatrix, DVector};

use crate::domain::error::ModelError;

#[derive(Debug, Clone, PartialEq)]
pub struct ArimaConfig {
    pub min_points: usize,
    pub max_iterations: usize,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        ArimaConfig {
            min_points: 10,
            max_iterations: 500,
        }
    }
}

/// Fitted coefficients of the differenced ARMA(1,1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArimaParams {
    pub c: f64,
    pub phi: f64,
    pub theta: f64,
}

const BOUND: f64 = 0.99;
const PENALTY: f64 = 1e12;

pub fn forecast(closes: &[f64], days: usize, config: &ArimaConfig) -> Result<Vec<f64>, ModelError> {
    let need = config.min_points.max(4);
    if closes.len() < need {
        return Err(ModelError::InsufficientData {
            have: closes.len(),
            need,
        });
    }

    let diffs: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let params = fit(&diffs, config.max_iterations)?;
    tracing::debug!(c = params.c, phi = params.phi, theta = params.theta, "arima fitted");

    let residuals = css_residuals(&diffs, &params);
    let mut prev_diff = diffs[diffs.len() - 1];
    let mut prev_shock = residuals[residuals.len() - 1];
    let mut level = closes[closes.len() - 1];

    let mut out = Vec::with_capacity(days);
    for _ in 0..days {
        let next = params.c + params.phi * prev_diff + params.theta * prev_shock;
        level += next;
        out.push(level);
        prev_diff = next;
        prev_shock = 0.0;
    }

    if out.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::fit("ARIMA forecast is not finite"));
    }
    Ok(out)
}

/// Estimate `(c, φ, θ)` on an already differenced series.
pub fn fit(diffs: &[f64], max_iterations: usize) -> Result<ArimaParams, ModelError> {
    let start = hannan_rissanen(diffs)?;
    let objective = |p: &[f64; 3]| conditional_sse(diffs, p);

    let spread = std_dev(diffs).max(1e-4);
    let steps = [spread * 0.1, 0.1, 0.1];
    let (best, value) = nelder_mead(
        objective,
        [start.c, start.phi, start.theta],
        steps,
        max_iterations,
    );

    let params = ArimaParams {
        c: best[0],
        phi: best[1],
        theta: best[2],
    };
    if !value.is_finite() || value >= PENALTY {
        return Err(ModelError::fit("ARIMA optimisation did not converge"));
    }
    if ![params.c, params.phi, params.theta]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(ModelError::fit("ARIMA coefficients are not finite"));
    }
    Ok(params)
}

fn hannan_rissanen(diffs: &[f64]) -> Result<ArimaParams, ModelError> {
    let n = diffs.len();
    let order = (n / 4).clamp(1, 10);

    // Stage 1: long AR to approximate the innovations.
    let rows = n - order;
    let x = DMatrix::from_fn(rows, order + 1, |r, col| {
        if col == 0 { 1.0 } else { diffs[r + order - col] }
    });
    let y = DVector::from_fn(rows, |r, _| diffs[r + order]);
    let beta = least_squares(&x, &y)
        .ok_or_else(|| ModelError::fit("singular regression in long AR stage"))?;

    let mut shocks = vec![0.0; n];
    for t in order..n {
        let mut pred = beta[0];
        for lag in 1..=order {
            pred += beta[lag] * diffs[t - lag];
        }
        shocks[t] = diffs[t] - pred;
    }

    // Stage 2: regress on (1, Δy_{t-1}, e_{t-1}).
    let first = order + 1;
    let rows = n - first;
    if rows < 3 {
        return Err(ModelError::InsufficientData {
            have: n + 1,
            need: first + 4,
        });
    }
    let x = DMatrix::from_fn(rows, 3, |r, col| match col {
        0 => 1.0,
        1 => diffs[r + first - 1],
        _ => shocks[r + first - 1],
    });
    let y = DVector::from_fn(rows, |r, _| diffs[r + first]);
    let beta = least_squares(&x, &y)
        .ok_or_else(|| ModelError::fit("singular regression in ARMA stage"))?;

    Ok(ArimaParams {
        c: beta[0],
        phi: beta[1].clamp(-0.95, 0.95),
        theta: beta[2].clamp(-0.95, 0.95),
    })
}

/// Ordinary least squares via SVD. `None` when `x` is rank deficient.
pub(crate) fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    let max = svd.singular_values.max();
    let min = svd.singular_values.min();
    if max.is_nan() || max <= 0.0 || min / max < 1e-10 {
        return None;
    }
    let solution = svd.solve(y, 1e-12).ok()?;
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}

fn css_residuals(diffs: &[f64], p: &ArimaParams) -> Vec<f64> {
    let mut residuals = vec![0.0; diffs.len()];
    for t in 1..diffs.len() {
        let pred = p.c + p.phi * diffs[t - 1] + p.theta * residuals[t - 1];
        residuals[t] = diffs[t] - pred;
    }
    residuals
}

fn conditional_sse(diffs: &[f64], p: &[f64; 3]) -> f64 {
    let excess = (p[1].abs() - BOUND).max(0.0) + (p[2].abs() - BOUND).max(0.0);
    if excess > 0.0 {
        return PENALTY * (1.0 + excess);
    }
    let params = ArimaParams {
        c: p[0],
        phi: p[1],
        theta: p[2],
    };
    let sse: f64 = css_residuals(diffs, &params)
        .iter()
        .skip(1)
        .map(|e| e * e)
        .sum();
    if sse.is_finite() { sse } else { PENALTY }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Derivative-free minimiser. Returns the best vertex and its value.
pub(crate) fn nelder_mead<F, const N: usize>(
    f: F,
    start: [f64; N],
    steps: [f64; N],
    max_iterations: usize,
) -> ([f64; N], f64)
where
    F: Fn(&[f64; N]) -> f64,
{
    const ALPHA: f64 = 1.0;
    const GAMMA: f64 = 2.0;
    const RHO: f64 = 0.5;
    const SIGMA: f64 = 0.5;

    let mut simplex: Vec<([f64; N], f64)> = Vec::with_capacity(N + 1);
    simplex.push((start, f(&start)));
    for i in 0..N {
        let mut vertex = start;
        vertex[i] += steps[i];
        simplex.push((vertex, f(&vertex)));
    }

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[N].1;
        if (worst - best).abs() <= 1e-12 * (best.abs() + 1e-12) {
            break;
        }

        let mut centroid = [0.0; N];
        for (vertex, _) in &simplex[..N] {
            for i in 0..N {
                centroid[i] += vertex[i] / N as f64;
            }
        }
        let toward = |coef: f64| {
            let mut point = [0.0; N];
            for i in 0..N {
                point[i] = centroid[i] + coef * (simplex[N].0[i] - centroid[i]);
            }
            point
        };

        let reflected = toward(-ALPHA);
        let f_reflected = f(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = toward(-GAMMA);
            let f_expanded = f(&expanded);
            simplex[N] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[N - 1].1 {
            simplex[N] = (reflected, f_reflected);
        } else {
            let contracted = toward(RHO);
            let f_contracted = f(&contracted);
            if f_contracted < simplex[N].1 {
                simplex[N] = (contracted, f_contracted);
            } else {
                let anchor = simplex[0].0;
                for (vertex, value) in simplex.iter_mut().skip(1) {
                    for i in 0..N {
                        vertex[i] = anchor[i] + SIGMA * (vertex[i] - anchor[i]);
                    }
                    *value = f(vertex);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex[0]
}
