/*!
 * # ARIMA Model
 *
 * Autoregressive integrated moving-average fitting by conditional sum of
 * squares (CSS). Candidate parameters are searched in an unconstrained space
 * and mapped through partial autocorrelations, so every candidate the
 * optimizer evaluates is stationary (AR part) and invertible (MA part).
 *
 * No constant term is estimated once the series has been differenced.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

const DEFAULT_MAX_ITERATIONS: usize = 500;
const DEFAULT_TOLERANCE: f64 = 1e-8;
const INITIAL_STEP: f64 = 0.5;

/// Model order `(p, d, q)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ArimaOrder {
    /// Autoregressive lags
    pub p: usize,
    /// Differencing passes
    pub d: usize,
    /// Moving-average lags
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Number of estimated coefficients
    pub fn parameter_count(&self) -> usize {
        self.p + self.q
    }

    /// Shortest input series this order can be fitted on
    pub fn min_observations(&self) -> usize {
        self.d + self.p + self.q + 2
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

/// Reasons a fit or forecast can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("{observations} observations are too few for order {order}")]
    TooShort {
        observations: usize,
        order: ArimaOrder,
    },

    #[error("input series contains a non-finite value")]
    NonFiniteInput,

    #[error("series is constant after differencing")]
    ConstantSeries,

    #[error("objective evaluated to a non-finite value")]
    NonFiniteObjective,

    #[error("optimizer did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("fitted model produced a non-finite forecast")]
    NonFiniteForecast,
}

/// ARIMA estimator
#[derive(Debug, Clone)]
pub struct Arima {
    order: ArimaOrder,
    max_iterations: usize,
    tolerance: f64,
}

impl Arima {
    pub fn new(order: ArimaOrder) -> Self {
        Self {
            order,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Fit the model to `series` (oldest observation first)
    pub fn fit(&self, series: &[f64]) -> Result<FittedArima, FitError> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteInput);
        }
        if series.len() < self.order.min_observations() {
            return Err(FitError::TooShort {
                observations: series.len(),
                order: self.order,
            });
        }

        let (anchors, differenced) = difference(series, self.order.d);
        if is_constant(&differenced) {
            return Err(FitError::ConstantSeries);
        }

        let p = self.order.p;
        let objective = |x: &[f64]| {
            let (ar, ma) = unpack(x, p);
            conditional_sum_of_squares(&differenced, &ar, &ma).0
        };

        let (solution, iterations) = if self.order.parameter_count() == 0 {
            (Vec::new(), 0)
        } else {
            nelder_mead(
                objective,
                &vec![0.0; self.order.parameter_count()],
                self.max_iterations,
                self.tolerance,
            )?
        };

        let (ar, ma) = unpack(&solution, p);
        let (css, residuals) = conditional_sum_of_squares(&differenced, &ar, &ma);
        if !css.is_finite() {
            return Err(FitError::NonFiniteObjective);
        }

        let effective = (differenced.len() - p).max(1);
        Ok(FittedArima {
            order: self.order,
            sigma2: css / effective as f64,
            iterations,
            anchors,
            recent_values: differenced[differenced.len() - p..].to_vec(),
            recent_residuals: residuals[residuals.len() - self.order.q..].to_vec(),
            ar,
            ma,
        })
    }
}

/// Result of a successful fit
#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sigma2: f64,
    iterations: usize,
    /// Last value of each differencing level, level 0 first
    anchors: Vec<f64>,
    /// Last `p` differenced values, oldest first
    recent_values: Vec<f64>,
    /// Last `q` residuals, oldest first
    recent_residuals: Vec<f64>,
}

impl FittedArima {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    /// Residual variance of the CSS fit
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Forecast `steps` values past the end of the fitted series
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, FitError> {
        let mut values = self.recent_values.clone();
        let mut residuals = self.recent_residuals.clone();
        let mut differenced = Vec::with_capacity(steps);

        for _ in 0..steps {
            let mut next = 0.0;
            for (lag, phi) in self.ar.iter().enumerate() {
                next += phi * values[values.len() - 1 - lag];
            }
            for (lag, theta) in self.ma.iter().enumerate() {
                next += theta * residuals[residuals.len() - 1 - lag];
            }
            values.push(next);
            // future shocks have zero expectation
            residuals.push(0.0);
            differenced.push(next);
        }

        let forecast = integrate(differenced, &self.anchors);
        if forecast.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteForecast);
        }
        Ok(forecast)
    }
}

/// Apply `d` differencing passes; returns the last value of every level
/// that was differenced away, plus the final series.
fn difference(series: &[f64], d: usize) -> (Vec<f64>, Vec<f64>) {
    let mut anchors = Vec::with_capacity(d);
    let mut current = series.to_vec();
    for _ in 0..d {
        if let Some(last) = current.last() {
            anchors.push(*last);
        }
        current = current.windows(2).map(|pair| pair[1] - pair[0]).collect();
    }
    (anchors, current)
}

/// Undo `difference` for values that continue past the end of the series
fn integrate(mut values: Vec<f64>, anchors: &[f64]) -> Vec<f64> {
    for anchor in anchors.iter().rev() {
        let mut level = *anchor;
        for value in values.iter_mut() {
            level += *value;
            *value = level;
        }
    }
    values
}

fn is_constant(series: &[f64]) -> bool {
    match series.first() {
        Some(first) => {
            let scale = first.abs().max(1.0);
            series.iter().all(|v| (v - first).abs() <= 1e-12 * scale)
        }
        None => true,
    }
}

/// Map unconstrained search coordinates to (AR, MA) coefficients
fn unpack(x: &[f64], p: usize) -> (Vec<f64>, Vec<f64>) {
    let (ar_raw, ma_raw) = x.split_at(p);
    let ar = partials_to_coefficients(&ar_raw.iter().map(|v| v.tanh()).collect::<Vec<_>>());
    let ma = partials_to_coefficients(&ma_raw.iter().map(|v| v.tanh()).collect::<Vec<_>>())
        .into_iter()
        .map(|c| -c)
        .collect();
    (ar, ma)
}

/// Durbin-Levinson recursion from partial autocorrelations in (-1, 1) to
/// coefficients of a polynomial `1 - sum(c_i z^i)` with roots outside the
/// unit circle.
fn partials_to_coefficients(partials: &[f64]) -> Vec<f64> {
    let mut coefficients: Vec<f64> = Vec::with_capacity(partials.len());
    for (k, &r) in partials.iter().enumerate() {
        let previous = coefficients.clone();
        for j in 0..k {
            coefficients[j] = previous[j] - r * previous[k - 1 - j];
        }
        coefficients.push(r);
    }
    coefficients
}

/// CSS objective and the residual series it was computed from
fn conditional_sum_of_squares(series: &[f64], ar: &[f64], ma: &[f64]) -> (f64, Vec<f64>) {
    let p = ar.len();
    let mut residuals = vec![0.0; series.len()];
    let mut total = 0.0;

    for t in p..series.len() {
        let mut predicted = 0.0;
        for (lag, phi) in ar.iter().enumerate() {
            predicted += phi * series[t - 1 - lag];
        }
        for (lag, theta) in ma.iter().enumerate() {
            if t > lag {
                predicted += theta * residuals[t - 1 - lag];
            }
        }
        residuals[t] = series[t] - predicted;
        total += residuals[t] * residuals[t];
    }

    (total, residuals)
}

fn blend(centroid: &[f64], point: &[f64], coefficient: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(point)
        .map(|(c, p)| c + coefficient * (p - c))
        .collect()
}

/// Downhill simplex minimisation; returns the best vertex and the
/// iteration it converged on.
fn nelder_mead<F>(
    objective: F,
    start: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> Result<(Vec<f64>, usize), FitError>
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), objective(start)));
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += INITIAL_STEP;
        let value = objective(&vertex);
        simplex.push((vertex, value));
    }

    for iteration in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best = simplex[0].1;
        let worst = simplex[n].1;
        if !best.is_finite() {
            return Err(FitError::NonFiniteObjective);
        }
        if (worst - best).abs() <= tolerance * (best.abs() + worst.abs()) + 1e-12 {
            return Ok((simplex.swap_remove(0).0, iteration));
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(v, _)| v[j]).sum::<f64>() / n as f64)
            .collect();
        let worst_vertex = simplex[n].0.clone();

        let reflected = blend(&centroid, &worst_vertex, -1.0);
        let reflected_value = objective(&reflected);

        if reflected_value < best {
            let expanded = blend(&centroid, &worst_vertex, -2.0);
            let expanded_value = objective(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value, accept) = if reflected_value < worst {
            let outside = blend(&centroid, &worst_vertex, -0.5);
            let value = objective(&outside);
            (outside, value, value <= reflected_value)
        } else {
            let inside = blend(&centroid, &worst_vertex, 0.5);
            let value = objective(&inside);
            (inside, value, value < worst)
        };

        if accept {
            simplex[n] = (contracted, contracted_value);
        } else {
            let anchor = simplex[0].0.clone();
            for entry in simplex.iter_mut().skip(1) {
                let vertex = blend(&anchor, &entry.0, 0.5);
                entry.1 = objective(&vertex);
                entry.0 = vertex;
            }
        }
    }

    Err(FitError::NonConvergence {
        iterations: max_iterations,
    })
}
