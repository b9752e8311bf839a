use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::{Duration, NaiveDate};
use inventory_forecast::{
    app_router, config::AppConfig, ml::forecasting::SalesRecord,
    services::sales_history::SalesHistory, AppState,
};
use serde_json::Value;
use tower::ServiceExt;

/// Helper harness driving the full router against an in-memory sales history.
pub struct TestApp {
    router: Router,
    #[allow(dead_code)]
    pub state: AppState,
}

impl TestApp {
    /// Application seeded with the standard fixture products.
    pub fn new() -> Self {
        Self::with_records(fixture_records())
    }

    pub fn with_records(records: Vec<SalesRecord>) -> Self {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(SalesHistory::from_records(records)),
        );
        Self::from_state(state)
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            router: app_router(state.clone()),
            state,
        }
    }

    /// Send a request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.request(Method::GET, uri, None).await
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&body).expect("response body is not JSON")
}

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date") + Duration::days(offset)
}

pub fn series(product_id: &str, quantities: &[u32]) -> Vec<SalesRecord> {
    quantities
        .iter()
        .enumerate()
        .map(|(i, quantity)| SalesRecord {
            date: day(i as i64),
            product_id: product_id.to_string(),
            quantity_sold: *quantity,
        })
        .collect()
}

/// `prod_short`: 5 days averaging 3 over the last three.
/// `prod_flat`: 14 days of constant demand 5.
/// `prod_long`: 60 days of varied demand.
pub fn fixture_records() -> Vec<SalesRecord> {
    let varied: Vec<u32> = (0..60u32).map(|i| 8 + (i * 7) % 5 + (i % 3) * 2).collect();

    let mut records = series("prod_short", &[2, 3, 2, 4, 3]);
    records.extend(series("prod_flat", &[5; 14]));
    records.extend(series("prod_long", &varied));
    records
}
