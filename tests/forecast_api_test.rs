mod common;

use axum::http::StatusCode;
use common::{read_json, TestApp};
use inventory_forecast::{config::AppConfig, AppState};
use std::io::Write;

#[tokio::test]
async fn short_history_uses_moving_average() {
    let app = TestApp::new();

    let response = app.get("/api/v1/predictions?product_id=prod_short").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["success"], true);
    let data = &body["data"];
    assert_eq!(data["product_id"], "prod_short");
    assert_eq!(data["method"], "moving_average");
    assert_eq!(data["confidence"], "low");
    assert_eq!(data["avg_prediction"], 3.0);

    let predictions = data["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 7);
    assert_eq!(predictions[0]["date"], "2024-01-06");
    assert_eq!(predictions[6]["date"], "2024-01-12");
    assert!(predictions
        .iter()
        .all(|p| p["predicted_quantity"] == 3 && p["method"] == "moving_average"));
}

#[tokio::test]
async fn constant_history_falls_back_without_error() {
    let app = TestApp::new();

    let body = read_json(app.get("/api/v1/predictions?product_id=prod_flat&days=3").await).await;
    assert_eq!(body["data"]["method"], "moving_average");
    assert_eq!(body["data"]["predictions"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["predictions"][0]["predicted_quantity"], 5);
}

#[tokio::test]
async fn long_history_returns_requested_horizon() {
    let app = TestApp::new();

    let body = read_json(app.get("/api/v1/predictions?product_id=prod_long&days=14").await).await;
    let data = &body["data"];
    let method = data["method"].as_str().unwrap();
    assert!(method == "arima" || method == "moving_average");
    let predictions = data["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 14);
    assert!(predictions.iter().all(|p| p["method"] == method));
}

#[tokio::test]
async fn unknown_product_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/api/v1/predictions?product_id=prod_missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = read_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn missing_product_id_is_bad_request() {
    let app = TestApp::new();

    let response = app.get("/api/v1/predictions").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = read_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"].as_str().unwrap().contains("product_id"));
}

#[tokio::test]
async fn zero_day_horizon_is_bad_request() {
    let app = TestApp::new();
    let response = app.get("/api/v1/predictions?product_id=prod_short&days=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn all_predictions_cover_every_product() {
    let app = TestApp::new();

    let response = app.get("/api/v1/predictions/all?days=5").await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = read_json(response).await["data"].clone();
    assert_eq!(data["days"], 5);
    assert_eq!(data["total_products"], 3);
    for product in ["prod_flat", "prod_long", "prod_short"] {
        assert_eq!(
            data["predictions"][product]["predictions"]
                .as_array()
                .unwrap()
                .len(),
            5
        );
    }
}

#[tokio::test]
async fn health_reports_model_and_products() {
    let app = TestApp::new();

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let data = read_json(response).await["data"].clone();
    assert_eq!(data["status"], "healthy");
    assert_eq!(data["model"], "ARIMA + Moving Average + Reorder Alerts");
    assert_eq!(data["products_loaded"], 3);
}

#[tokio::test]
async fn status_reports_forecast_settings() {
    let app = TestApp::new();

    let data = read_json(app.get("/api/v1/status").await).await["data"].clone();
    assert_eq!(data["forecast"]["arima_order"]["p"], 1);
    assert_eq!(data["forecast"]["min_observations"], 10);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();

    let response = app.get("/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = read_json(response).await;
    assert!(doc["paths"]["/api/v1/reorder-alerts"].is_object());
}

#[tokio::test]
async fn state_loads_sales_file_from_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"date": "2024-02-01", "product_id": "sku-1", "product_name": "Beans", "quantity_sold": 6}},
            {{"date": "2024-02-02", "product_id": "sku-1", "quantity_sold": 3}},
            {{"date": "2024-02-02", "product_id": "sku-1", "quantity_sold": 3}},
            {{"date": "bad", "product_id": "sku-1", "quantity_sold": 3}}
        ]"#
    )
    .unwrap();

    let config = AppConfig {
        sales_data_path: file.path().to_path_buf(),
        ..AppConfig::default()
    };
    let app = TestApp::from_state(AppState::from_config(config).unwrap());

    let data = read_json(app.get("/api/v1/predictions?product_id=sku-1&days=2").await).await["data"]
        .clone();
    // daily totals are [6, 6]
    assert_eq!(data["avg_prediction"], 6.0);
    assert_eq!(data["predictions"][0]["date"], "2024-02-03");
}
