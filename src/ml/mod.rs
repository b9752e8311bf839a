/*!
 * # Forecasting Core
 *
 * Pure, synchronous models behind the service layer: ARIMA fitting, the
 * forecast engine with its moving-average fallback, and the reorder risk
 * classifier. Nothing here performs I/O.
 */

/// ARIMA(p,d,q) fitting and forecasting
pub mod arima;

/// Demand forecast engine
pub mod forecasting;

/// Reorder risk classification and alert ranking
pub mod reorder_risk;
