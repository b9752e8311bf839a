use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Inventory Forecast API",
        version = "0.1.0",
        description = r#"
# Inventory Forecast API

Per-product demand forecasts and reorder alerts.

## Forecasting

Products with at least 10 days of sales history are forecast with an
ARIMA(1,1,1) model. Shorter histories, and histories the model cannot fit,
use a flat 3-day moving average. Every forecast reports the method used.

## Reorder Alerts

Post an inventory snapshot to receive alerts ranked by risk. An item is
alerted when its stock is at or below its reorder threshold, or when the
forecast says it will run out within 7 days.

## Error Handling

Errors use a consistent JSON body:

```json
{
  "error": "Bad Request",
  "message": "Validation error: product_id is required",
  "request_id": "req-abc123xyz",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:5001", description = "Local development")
    ),
    tags(
        (name = "Forecasts", description = "Demand forecast endpoints"),
        (name = "Reorder Alerts", description = "Reorder risk endpoints")
    ),
    paths(
        crate::handlers::forecasts::get_predictions,
        crate::handlers::forecasts::get_all_predictions,
        crate::handlers::reorder_alerts::create_reorder_alerts,
    ),
    components(
        schemas(
            crate::ml::forecasting::Forecast,
            crate::ml::forecasting::ForecastPoint,
            crate::ml::forecasting::ForecastMethod,
            crate::ml::forecasting::Confidence,
            crate::ml::arima::ArimaOrder,
            crate::services::forecasting::AllForecasts,
            crate::services::forecasting::ReorderAlertBatch,
            crate::ml::reorder_risk::ReorderAlert,
            crate::ml::reorder_risk::RiskLevel,
            crate::ml::reorder_risk::PredictionPreview,
            crate::ml::reorder_risk::AlertSummary,
            crate::handlers::reorder_alerts::ReorderAlertsRequest,
            crate::handlers::reorder_alerts::InventoryItemInput,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
