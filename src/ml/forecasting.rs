/*!
 * # Demand Forecasting
 *
 * Turns one product's daily sales history into a multi-day quantity
 * forecast. Histories with enough observations are fitted with an ARIMA
 * model; short histories, degenerate series and failed fits use a flat
 * trailing moving average instead. A forecast is always produced for a
 * non-empty history.
 */

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::arima::{Arima, ArimaOrder, FitError};

pub const DEFAULT_HORIZON: usize = 7;
const DEFAULT_MIN_OBSERVATIONS: usize = 10;
const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 3;
const DEFAULT_MAX_HORIZON: usize = 365;
const DEFAULT_MAX_ITERATIONS: usize = 500;

/// One sales row as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub product_id: String,
    pub quantity_sold: u32,
}

/// Total quantity sold on one calendar day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySales {
    pub date: NaiveDate,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("history for {expected} contains a record for {found}")]
    MixedProducts { expected: String, found: String },
}

/// Sum same-day records into one value per calendar day, oldest first.
///
/// Days without any record are left out rather than filled with zero sales.
pub fn aggregate_daily(records: &[SalesRecord]) -> Result<Vec<DailySales>, HistoryError> {
    let mut days: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    if let Some(first) = records.first() {
        for record in records {
            if record.product_id != first.product_id {
                return Err(HistoryError::MixedProducts {
                    expected: first.product_id.clone(),
                    found: record.product_id.clone(),
                });
            }
            *days.entry(record.date).or_insert(0.0) += f64::from(record.quantity_sold);
        }
    }

    Ok(days
        .into_iter()
        .map(|(date, quantity)| DailySales { date, quantity })
        .collect())
}

/// Forecasting policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// ARIMA order used when a parametric fit is attempted
    #[validate(custom = "validate_arima_order")]
    pub arima_order: ArimaOrder,

    /// Daily observations required before an ARIMA fit is attempted
    #[validate(range(min = 1))]
    pub min_observations: usize,

    /// Trailing window of the moving-average fallback
    #[validate(range(min = 1))]
    pub moving_average_window: usize,

    /// Horizon used when the caller does not ask for one
    #[validate(range(min = 1))]
    pub default_horizon: usize,

    /// Largest horizon a caller may request
    #[validate(range(min = 1, max = 3650))]
    pub max_horizon: usize,

    /// Optimizer iteration budget for one fit
    #[validate(range(min = 1))]
    pub max_iterations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            arima_order: ArimaOrder::default(),
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            default_horizon: DEFAULT_HORIZON,
            max_horizon: DEFAULT_MAX_HORIZON,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

fn validate_arima_order(order: &ArimaOrder) -> Result<(), ValidationError> {
    if order.p > 5 || order.q > 5 || order.d > 2 {
        let mut err = ValidationError::new("arima_order");
        err.message = Some("ARIMA order must satisfy p <= 5, d <= 2, q <= 5".into());
        return Err(err);
    }
    Ok(())
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ForecastMethod {
    Arima,
    MovingAverage,
}

impl ForecastMethod {
    pub fn confidence(self) -> Confidence {
        match self {
            ForecastMethod::Arima => Confidence::Medium,
            ForecastMethod::MovingAverage => Confidence::Low,
        }
    }
}

/// Coarse confidence tag reported with a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
    Medium,
    Low,
}

/// Why the moving average was used instead of a fitted model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FallbackReason {
    #[error("{observations} daily observations, {required} required for model fitting")]
    InsufficientHistory { observations: usize, required: usize },

    #[error("model fit failed: {0}")]
    FitFailed(#[from] FitError),
}

/// Real-valued forecast tagged with how it was produced
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastOutcome {
    Fitted {
        values: Vec<f64>,
        order: ArimaOrder,
    },
    FellBack {
        values: Vec<f64>,
        reason: FallbackReason,
    },
}

impl ForecastOutcome {
    pub fn method(&self) -> ForecastMethod {
        match self {
            ForecastOutcome::Fitted { .. } => ForecastMethod::Arima,
            ForecastOutcome::FellBack { .. } => ForecastMethod::MovingAverage,
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            ForecastOutcome::Fitted { values, .. } | ForecastOutcome::FellBack { values, .. } => {
                values
            }
        }
    }

    pub fn into_values(self) -> Vec<f64> {
        match self {
            ForecastOutcome::Fitted { values, .. } | ForecastOutcome::FellBack { values, .. } => {
                values
            }
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            ForecastOutcome::Fitted { .. } => None,
            ForecastOutcome::FellBack { reason, .. } => Some(reason),
        }
    }
}

/// Forecast for a product history, anchored to its last observed day
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryForecast {
    pub last_observed: NaiveDate,
    pub observations: usize,
    pub outcome: ForecastOutcome,
}

/// Stateless forecast engine; every call is a pure function of its inputs.
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Forecast `horizon` values from a daily series, oldest first.
    ///
    /// Returns `None` for an empty series: no data is not zero demand.
    pub fn forecast(&self, series: &[f64], horizon: usize) -> Option<ForecastOutcome> {
        if series.is_empty() {
            return None;
        }

        let fallback = || {
            moving_average_forecast(series, self.config.moving_average_window, horizon)
        };

        if series.len() < self.config.min_observations {
            return Some(ForecastOutcome::FellBack {
                values: fallback(),
                reason: FallbackReason::InsufficientHistory {
                    observations: series.len(),
                    required: self.config.min_observations,
                },
            });
        }

        let order = self.config.arima_order;
        let fitted = Arima::new(order)
            .with_max_iterations(self.config.max_iterations)
            .fit(series)
            .and_then(|model| model.forecast(horizon));

        Some(match fitted {
            Ok(values) => ForecastOutcome::Fitted {
                values: values.into_iter().map(|v| v.max(0.0)).collect(),
                order,
            },
            Err(err) => {
                debug!(error = %err, %order, "ARIMA fit failed; using moving average");
                ForecastOutcome::FellBack {
                    values: fallback(),
                    reason: err.into(),
                }
            }
        })
    }

    /// Aggregate raw records to daily totals and forecast from them
    pub fn forecast_history(
        &self,
        records: &[SalesRecord],
        horizon: usize,
    ) -> Result<Option<HistoryForecast>, HistoryError> {
        let daily = aggregate_daily(records)?;
        let Some(last) = daily.last() else {
            return Ok(None);
        };

        let series: Vec<f64> = daily.iter().map(|day| day.quantity).collect();
        Ok(self
            .forecast(&series, horizon)
            .map(|outcome| HistoryForecast {
                last_observed: last.date,
                observations: series.len(),
                outcome,
            }))
    }
}

/// Trailing mean over up to `window` observations (fewer at the start)
pub fn trailing_moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &series[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Repeat the last smoothed value for every step of the horizon
pub fn moving_average_forecast(series: &[f64], window: usize, horizon: usize) -> Vec<f64> {
    let last = trailing_moving_average(series, window)
        .last()
        .copied()
        .unwrap_or(0.0);
    vec![last; horizon]
}

/// Round a predicted quantity to a whole, non-negative unit count
pub fn round_quantity(value: f64) -> u32 {
    value.max(0.0).round() as u32
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_quantity: u32,
    pub method: ForecastMethod,
}

/// Forecast as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Forecast {
    pub product_id: String,
    pub method: ForecastMethod,
    pub predictions: Vec<ForecastPoint>,
    /// Mean of the unrounded predictions, two decimals
    pub avg_prediction: f64,
    pub confidence: Confidence,
}

impl Forecast {
    /// Date the outcome's values on consecutive days after `last_observed`
    pub fn from_outcome(
        product_id: impl Into<String>,
        last_observed: NaiveDate,
        outcome: &ForecastOutcome,
    ) -> Self {
        let method = outcome.method();
        let predictions = outcome
            .values()
            .iter()
            .enumerate()
            .map(|(i, value)| ForecastPoint {
                date: last_observed + Duration::days(i as i64 + 1),
                predicted_quantity: round_quantity(*value),
                method,
            })
            .collect();

        Self {
            product_id: product_id.into(),
            method,
            predictions,
            avg_prediction: round_to(mean(outcome.values()).unwrap_or(0.0), 2),
            confidence: method.confidence(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(d as i64)
    }

    fn record(d: u32, quantity: u32) -> SalesRecord {
        SalesRecord {
            date: day(d),
            product_id: "prod_001".to_string(),
            quantity_sold: quantity,
        }
    }

    fn noisy_series(len: usize) -> Vec<f64> {
        let pattern = [3.0, 7.0, 4.0, 9.0, 2.0, 6.0, 8.0, 5.0, 1.0, 7.0, 4.0];
        (0..len).map(|i| pattern[i % pattern.len()] + (i % 4) as f64).collect()
    }

    #[test]
    fn aggregation_sums_same_day_and_skips_missing_days() {
        let records = vec![record(2, 4), record(0, 1), record(0, 2), record(5, 3)];
        let daily = aggregate_daily(&records).unwrap();

        assert_eq!(
            daily,
            vec![
                DailySales { date: day(0), quantity: 3.0 },
                DailySales { date: day(2), quantity: 4.0 },
                DailySales { date: day(5), quantity: 3.0 },
            ]
        );
    }

    #[test]
    fn aggregation_rejects_mixed_products() {
        let mut other = record(1, 1);
        other.product_id = "prod_002".to_string();
        let result = aggregate_daily(&[record(0, 1), other]);
        assert_matches!(result, Err(HistoryError::MixedProducts { .. }));
    }

    #[test]
    fn trailing_average_uses_shorter_windows_at_start() {
        let smoothed = trailing_moving_average(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(smoothed, vec![2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn five_day_history_uses_moving_average() {
        let engine = ForecastEngine::default();
        let outcome = engine.forecast(&[2.0, 3.0, 2.0, 4.0, 3.0], 7).unwrap();

        assert_eq!(outcome.method(), ForecastMethod::MovingAverage);
        assert_eq!(outcome.values(), &[3.0; 7]);
        assert_matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::InsufficientHistory {
                observations: 5,
                required: 10
            })
        );

        let forecast = Forecast::from_outcome("prod_001", day(4), &outcome);
        assert!(forecast.predictions.iter().all(|p| p.predicted_quantity == 3));
        assert_eq!(forecast.avg_prediction, 3.0);
        assert_eq!(forecast.confidence, Confidence::Low);
    }

    #[test]
    fn empty_series_has_no_forecast() {
        assert!(ForecastEngine::default().forecast(&[], 7).is_none());
        assert!(ForecastEngine::default()
            .forecast_history(&[], 7)
            .unwrap()
            .is_none());
    }

    #[test]
    fn constant_history_falls_back_instead_of_failing() {
        let outcome = ForecastEngine::default().forecast(&[4.0; 14], 5).unwrap();

        assert_eq!(outcome.method(), ForecastMethod::MovingAverage);
        assert_eq!(outcome.values(), &[4.0; 5]);
        assert_matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::FitFailed(FitError::ConstantSeries))
        );
    }

    #[test]
    fn long_varied_history_is_fitted_with_arima() {
        let outcome = ForecastEngine::default()
            .forecast(&noisy_series(40), 7)
            .unwrap();

        assert_matches!(outcome, ForecastOutcome::Fitted { order, .. } if order == ArimaOrder::new(1, 1, 1));
        assert_eq!(outcome.values().len(), 7);
        assert!(outcome.values().iter().all(|v| *v >= 0.0 && v.is_finite()));
    }

    #[test]
    fn exact_linear_trend_gets_flat_moving_average() {
        let trend: Vec<f64> = (1..=15).map(f64::from).collect();
        let outcome = ForecastEngine::default().forecast(&trend, 3).unwrap();

        assert_eq!(outcome.values(), &[14.0; 3]);
        assert_matches!(
            outcome.fallback_reason(),
            Some(FallbackReason::FitFailed(FitError::ConstantSeries))
        );
    }

    #[rstest]
    #[case(9, ForecastMethod::MovingAverage)]
    #[case(10, ForecastMethod::Arima)]
    fn model_selection_switches_at_ten_observations(
        #[case] len: usize,
        #[case] expected: ForecastMethod,
    ) {
        let outcome = ForecastEngine::default()
            .forecast(&noisy_series(len), 7)
            .unwrap();
        assert_eq!(outcome.method(), expected);
        assert_eq!(outcome.values().len(), 7);
    }

    #[test]
    fn horizon_is_always_honoured() {
        let engine = ForecastEngine::default();
        for len in [1, 5, 9, 10, 25] {
            for horizon in [1, 7, 30] {
                let outcome = engine.forecast(&noisy_series(len), horizon).unwrap();
                assert_eq!(outcome.values().len(), horizon, "len={len} horizon={horizon}");
            }
        }
    }

    #[test]
    fn forecast_history_dates_follow_last_observation() {
        let records: Vec<SalesRecord> = (0..4).map(|d| record(d * 2, 5)).collect();
        let result = ForecastEngine::default()
            .forecast_history(&records, 3)
            .unwrap()
            .unwrap();

        assert_eq!(result.last_observed, day(6));
        assert_eq!(result.observations, 4);

        let forecast = Forecast::from_outcome("prod_001", result.last_observed, &result.outcome);
        let dates: Vec<NaiveDate> = forecast.predictions.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(7), day(8), day(9)]);
    }

    #[test]
    fn average_prediction_uses_unrounded_values() {
        let outcome = ForecastOutcome::FellBack {
            values: vec![1.4, 1.4, 1.5],
            reason: FallbackReason::InsufficientHistory {
                observations: 2,
                required: 10,
            },
        };
        let forecast = Forecast::from_outcome("p", day(0), &outcome);

        let quantities: Vec<u32> = forecast.predictions.iter().map(|p| p.predicted_quantity).collect();
        assert_eq!(quantities, vec![1, 1, 2]);
        assert_eq!(forecast.avg_prediction, 1.43);
    }

    #[test]
    fn config_rejects_unsupported_order() {
        assert!(ForecastConfig::default().validate().is_ok());

        let config = ForecastConfig {
            arima_order: ArimaOrder::new(1, 3, 1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
