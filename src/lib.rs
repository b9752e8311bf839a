//! Inventory demand forecasting and reorder alerting
//!
//! Forecasts near-term per-product demand from historical sales and turns
//! forecasts plus stock levels into ranked reorder alerts, served over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod ml;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use utoipa::ToSchema;

use crate::ml::forecasting::ForecastEngine;
use crate::services::{
    forecasting::ForecastingService,
    sales_history::{SalesHistory, SalesHistorySource},
};

const SERVICE_NAME: &str = "inventory-forecast";
const MODEL_DESCRIPTION: &str = "ARIMA + Moving Average + Reorder Alerts";

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub forecasting_service: ForecastingService,
}

impl AppState {
    pub fn new(config: config::AppConfig, history: Arc<dyn SalesHistorySource>) -> Self {
        let forecasting_service = ForecastingService::new(
            history,
            ForecastEngine::new(config.forecast.clone()),
            config.reorder.clone(),
        );
        Self {
            config: Arc::new(config),
            forecasting_service,
        }
    }

    /// Build state from configuration, loading the configured sales file
    pub fn from_config(config: config::AppConfig) -> Result<Self, errors::ServiceError> {
        let (history, _report) = SalesHistory::load_json(&config.sales_data_path)?;
        Ok(Self::new(config, Arc::new(history)))
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        assert!(DateTime::parse_from_rfc3339(&meta.timestamp).is_ok());
    }
}

/// Routes mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .merge(handlers::forecasts::forecast_routes())
        .merge(handlers::reorder_alerts::reorder_alert_routes())
}

/// Full application router with request ids, HTTP tracing and timeouts
pub fn app_router(state: AppState) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let forecast = &state.config.forecast;
    let status_data = json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "model": MODEL_DESCRIPTION,
        "forecast": {
            "arima_order": forecast.arima_order,
            "min_observations": forecast.min_observations,
            "moving_average_window": forecast.moving_average_window,
            "default_horizon": forecast.default_horizon,
            "max_horizon": forecast.max_horizon,
        },
        "products_loaded": state.forecasting_service.product_count(),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(ApiResponse::success(status_data))
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let health_data = json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "model": MODEL_DESCRIPTION,
        "products_loaded": state.forecasting_service.product_count(),
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(ApiResponse::success(health_data))
}
