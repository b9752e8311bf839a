use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    ml::{
        forecasting::{Forecast, ForecastEngine, ForecastMethod, ForecastOutcome, HistoryForecast},
        reorder_risk::{assess_risk, rank_alerts, AlertSummary, InventoryItem, ReorderAlert, ReorderPolicy},
    },
    services::sales_history::SalesHistorySource,
};

/// Forecasts for every product with sales history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllForecasts {
    pub days: usize,
    /// Keyed by product id, sorted
    pub predictions: BTreeMap<String, Forecast>,
    pub total_products: usize,
}

/// Ranked alerts for one inventory snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReorderAlertBatch {
    pub alerts: Vec<ReorderAlert>,
    #[serde(flatten)]
    pub summary: AlertSummary,
    /// Products whose forecast failed and were checked against threshold only
    pub failed_items: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Demand forecasting and reorder alerting over a sales history source
#[derive(Clone)]
pub struct ForecastingService {
    history: Arc<dyn SalesHistorySource>,
    engine: ForecastEngine,
    policy: ReorderPolicy,
}

impl ForecastingService {
    pub fn new(
        history: Arc<dyn SalesHistorySource>,
        engine: ForecastEngine,
        policy: ReorderPolicy,
    ) -> Self {
        Self {
            history,
            engine,
            policy,
        }
    }

    pub fn policy(&self) -> &ReorderPolicy {
        &self.policy
    }

    /// Number of products with sales history
    pub fn product_count(&self) -> usize {
        self.history.product_ids().len()
    }

    /// Resolve an optional requested horizon against the configured bounds
    pub fn resolve_horizon(&self, requested: Option<usize>) -> Result<usize, ServiceError> {
        let config = self.engine.config();
        let horizon = requested.unwrap_or(config.default_horizon);
        if horizon == 0 || horizon > config.max_horizon {
            return Err(ServiceError::ValidationError(format!(
                "days must be between 1 and {}",
                config.max_horizon
            )));
        }
        Ok(horizon)
    }

    /// Forecast demand for one product
    #[instrument(skip(self))]
    pub async fn get_forecast(
        &self,
        product_id: &str,
        horizon: Option<usize>,
    ) -> Result<Forecast, ServiceError> {
        let product_id = product_id.trim();
        if product_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "product_id is required".to_string(),
            ));
        }
        let horizon = self.resolve_horizon(horizon)?;

        let records = self
            .history
            .history_for(product_id)?
            .ok_or_else(|| not_found(product_id))?;

        let engine = self.engine.clone();
        let forecast = tokio::task::spawn_blocking(move || engine.forecast_history(&records, horizon))
            .await?
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .ok_or_else(|| not_found(product_id))?;

        record_method(&forecast.outcome);
        debug!(
            observations = forecast.observations,
            method = %forecast.outcome.method(),
            "Forecast computed"
        );

        Ok(Forecast::from_outcome(
            product_id,
            forecast.last_observed,
            &forecast.outcome,
        ))
    }

    /// Forecast demand for every product, in product-id order
    #[instrument(skip(self))]
    pub async fn get_all_forecasts(
        &self,
        horizon: Option<usize>,
    ) -> Result<AllForecasts, ServiceError> {
        let horizon = self.resolve_horizon(horizon)?;
        let history = Arc::clone(&self.history);
        let engine = self.engine.clone();

        let predictions = tokio::task::spawn_blocking(move || {
            let mut predictions = BTreeMap::new();
            for product_id in history.product_ids() {
                match forecast_product(history.as_ref(), &engine, &product_id, horizon) {
                    Ok(Some(forecast)) => {
                        record_method(&forecast.outcome);
                        predictions.insert(
                            product_id.clone(),
                            Forecast::from_outcome(
                                product_id,
                                forecast.last_observed,
                                &forecast.outcome,
                            ),
                        );
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%product_id, error = %err, "Skipping product forecast"),
                }
            }
            predictions
        })
        .await?;

        info!(products = predictions.len(), horizon, "All-product forecast computed");
        Ok(AllForecasts {
            days: horizon,
            total_products: predictions.len(),
            predictions,
        })
    }

    /// Assess every inventory item and return ranked alerts.
    ///
    /// A product whose forecast fails is checked against its threshold only;
    /// the batch itself never fails on a single item.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn reorder_alerts(
        &self,
        items: Vec<InventoryItem>,
    ) -> Result<ReorderAlertBatch, ServiceError> {
        if let Some(position) = items.iter().position(|i| i.product_id.trim().is_empty()) {
            return Err(ServiceError::ValidationError(format!(
                "inventory[{}]: product_id is required",
                position
            )));
        }

        let history = Arc::clone(&self.history);
        let engine = self.engine.clone();
        let policy = self.policy.clone();

        let (mut alerts, failed_items) = tokio::task::spawn_blocking(move || {
            let horizon = engine.config().default_horizon;
            let mut alerts = Vec::new();
            let mut failed_items = Vec::new();

            for item in &items {
                let forecast = match forecast_item(history.as_ref(), &engine, &item.product_id, horizon) {
                    Ok(forecast) => forecast.map(|f| f.outcome.into_values()),
                    Err(err) => {
                        warn!(
                            product_id = %item.product_id,
                            error = %err,
                            "Forecast failed; using threshold check only"
                        );
                        counter!("reorder_alerts.item_failures", 1);
                        failed_items.push(item.product_id.clone());
                        None
                    }
                };

                if let Some(alert) = assess_risk(item, forecast.as_deref(), &policy) {
                    alerts.push(alert);
                }
            }

            (alerts, failed_items)
        })
        .await?;

        rank_alerts(&mut alerts);
        let summary = AlertSummary::from_alerts(&alerts);

        counter!("reorder_alerts.generated", summary.total_alerts as u64);
        histogram!("reorder_alerts.batch_size", summary.total_alerts as f64);
        info!(
            total_alerts = summary.total_alerts,
            high_priority = summary.high_priority_count,
            failed_items = failed_items.len(),
            "Reorder alerts generated"
        );

        Ok(ReorderAlertBatch {
            alerts,
            summary,
            failed_items,
            generated_at: Utc::now(),
        })
    }
}

fn forecast_product(
    history: &dyn SalesHistorySource,
    engine: &ForecastEngine,
    product_id: &str,
    horizon: usize,
) -> Result<Option<HistoryForecast>, ServiceError> {
    let Some(records) = history.history_for(product_id)? else {
        return Ok(None);
    };
    engine
        .forecast_history(&records, horizon)
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))
}

/// Forecast one batch item, turning a panic into an item-level error
fn forecast_item(
    history: &dyn SalesHistorySource,
    engine: &ForecastEngine,
    product_id: &str,
    horizon: usize,
) -> Result<Option<HistoryForecast>, ServiceError> {
    catch_unwind(AssertUnwindSafe(|| {
        forecast_product(history, engine, product_id, horizon)
    }))
    .unwrap_or_else(|_| {
        Err(ServiceError::InternalError(format!(
            "forecast for {} panicked",
            product_id
        )))
    })
}

fn record_method(outcome: &ForecastOutcome) {
    match outcome.method() {
        ForecastMethod::Arima => counter!("forecast.method.arima", 1),
        ForecastMethod::MovingAverage => counter!("forecast.method.moving_average", 1),
    }
    if let Some(reason) = outcome.fallback_reason() {
        debug!(%reason, "Moving-average fallback used");
    }
}

fn not_found(product_id: &str) -> ServiceError {
    ServiceError::NotFound(format!("no sales history for product {}", product_id))
}
