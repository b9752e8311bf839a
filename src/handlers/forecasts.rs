use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    errors::ServiceError,
    ml::forecasting::Forecast,
    services::forecasting::AllForecasts,
    ApiResponse, AppState,
};

/// Build the forecast Router scoped under `/api/v1`.
pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/predictions", get(get_predictions))
        .route("/predictions/all", get(get_all_predictions))
}

/// Query parameters for a single-product forecast
#[derive(Debug, Deserialize, IntoParams)]
pub struct PredictionQuery {
    /// Product to forecast
    pub product_id: Option<String>,
    /// Number of days to forecast (default: 7)
    #[param(minimum = 1, maximum = 365)]
    pub days: Option<usize>,
}

/// Query parameters for the all-products forecast
#[derive(Debug, Deserialize, IntoParams)]
pub struct AllPredictionsQuery {
    /// Number of days to forecast (default: 7)
    #[param(minimum = 1, maximum = 365)]
    pub days: Option<usize>,
}

/// Forecast daily demand for one product
#[utoipa::path(
    get,
    path = "/api/v1/predictions",
    params(PredictionQuery),
    responses(
        (status = 200, description = "Forecast computed", body = ApiResponse<Forecast>),
        (status = 400, description = "Missing product_id or days out of range", body = crate::errors::ErrorResponse),
        (status = 404, description = "No sales history for the product", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasts"
)]
pub async fn get_predictions(
    State(state): State<AppState>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<ApiResponse<Forecast>>, ServiceError> {
    let product_id = query.product_id.unwrap_or_default();
    let forecast = state
        .forecasting_service
        .get_forecast(&product_id, query.days)
        .await?;

    Ok(Json(ApiResponse::success(forecast)))
}

/// Forecast daily demand for every product with sales history
#[utoipa::path(
    get,
    path = "/api/v1/predictions/all",
    params(AllPredictionsQuery),
    responses(
        (status = 200, description = "Forecasts computed", body = ApiResponse<AllForecasts>),
        (status = 400, description = "days out of range", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasts"
)]
pub async fn get_all_predictions(
    State(state): State<AppState>,
    Query(query): Query<AllPredictionsQuery>,
) -> Result<Json<ApiResponse<AllForecasts>>, ServiceError> {
    let forecasts = state
        .forecasting_service
        .get_all_forecasts(query.days)
        .await?;

    Ok(Json(ApiResponse::success(forecasts)))
}
