use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::ServiceError,
    ml::reorder_risk::InventoryItem,
    services::forecasting::ReorderAlertBatch,
    ApiResponse, AppState,
};

/// Build the reorder alert Router scoped under `/api/v1`.
pub fn reorder_alert_routes() -> Router<AppState> {
    Router::new().route("/reorder-alerts", post(create_reorder_alerts))
}

/// Inventory snapshot to assess
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ReorderAlertsRequest {
    #[serde(default)]
    #[validate]
    pub inventory: Vec<InventoryItemInput>,
}

/// One inventory row.
///
/// Field aliases used by inventory stores are accepted: `_id` or `id` for
/// `product_id`, `name` for `product_name`, `remainingQuantity` or
/// `quantity` for `current_stock` and `reorderThreshold` for
/// `reorder_threshold`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct InventoryItemInput {
    pub product_id: Option<String>,
    #[serde(rename = "_id")]
    pub object_id: Option<String>,
    pub id: Option<String>,

    pub product_name: Option<String>,
    pub name: Option<String>,

    #[validate(range(min = 0.0))]
    pub current_stock: Option<f64>,
    #[serde(rename = "remainingQuantity")]
    #[validate(range(min = 0.0))]
    pub remaining_quantity: Option<f64>,
    #[validate(range(min = 0.0))]
    pub quantity: Option<f64>,

    #[validate(range(min = 0.0))]
    pub reorder_threshold: Option<f64>,
    #[serde(rename = "reorderThreshold")]
    #[validate(range(min = 0.0))]
    pub reorder_threshold_alias: Option<f64>,
}

impl InventoryItemInput {
    /// Resolve aliases and defaults; `index` locates the row in error messages
    pub fn into_item(self, index: usize, default_threshold: f64) -> Result<InventoryItem, ServiceError> {
        let product_id = self
            .product_id
            .or(self.object_id)
            .or(self.id)
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("inventory[{}]: product_id is required", index))
            })?;

        let current_stock = self
            .current_stock
            .or(self.remaining_quantity)
            .or(self.quantity)
            .unwrap_or(0.0);
        let reorder_threshold = self
            .reorder_threshold
            .or(self.reorder_threshold_alias)
            .unwrap_or(default_threshold);
        if !current_stock.is_finite() || !reorder_threshold.is_finite() {
            return Err(ServiceError::ValidationError(format!(
                "inventory[{}]: stock and threshold must be finite",
                index
            )));
        }

        Ok(InventoryItem {
            product_name: self
                .product_name
                .or(self.name)
                .unwrap_or_else(|| format!("Product {}", product_id)),
            product_id,
            current_stock,
            reorder_threshold,
        })
    }
}

/// Assess an inventory snapshot and return ranked reorder alerts
#[utoipa::path(
    post,
    path = "/api/v1/reorder-alerts",
    request_body = ReorderAlertsRequest,
    responses(
        (status = 200, description = "Alerts generated", body = ApiResponse<ReorderAlertBatch>),
        (status = 400, description = "Invalid inventory row", body = crate::errors::ErrorResponse)
    ),
    tag = "Reorder Alerts"
)]
pub async fn create_reorder_alerts(
    State(state): State<AppState>,
    Json(request): Json<ReorderAlertsRequest>,
) -> Result<Json<ApiResponse<ReorderAlertBatch>>, ServiceError> {
    request.validate()?;

    let default_threshold = state.forecasting_service.policy().default_threshold;
    let items = request
        .inventory
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.into_item(index, default_threshold))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = state.forecasting_service.reorder_alerts(items).await?;
    Ok(Json(ApiResponse::success(batch)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(json: &str) -> InventoryItemInput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn aliases_are_resolved() {
        let item = parse(r#"{"_id": "64f1", "name": "Rice", "remainingQuantity": 4, "reorderThreshold": 5}"#)
            .into_item(0, 2.0)
            .unwrap();

        assert_eq!(item.product_id, "64f1");
        assert_eq!(item.product_name, "Rice");
        assert_eq!(item.current_stock, 4.0);
        assert_eq!(item.reorder_threshold, 5.0);
    }

    #[test]
    fn canonical_fields_take_precedence() {
        let item = parse(r#"{"product_id": "p1", "id": "legacy", "current_stock": 3, "quantity": 9}"#)
            .into_item(0, 2.0)
            .unwrap();

        assert_eq!(item.product_id, "p1");
        assert_eq!(item.current_stock, 3.0);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let item = parse(r#"{"id": "p7"}"#).into_item(0, 2.0).unwrap();

        assert_eq!(item.product_name, "Product p7");
        assert_eq!(item.current_stock, 0.0);
        assert_eq!(item.reorder_threshold, 2.0);
    }

    #[test]
    fn missing_id_names_the_row() {
        let result = parse(r#"{"name": "Orphan"}"#).into_item(3, 2.0);
        assert_matches!(result, Err(ServiceError::ValidationError(msg)) if msg.starts_with("inventory[3]"));
    }

    #[test]
    fn negative_stock_fails_validation() {
        let request: ReorderAlertsRequest =
            serde_json::from_str(r#"{"inventory": [{"id": "p1", "quantity": -4}]}"#).unwrap();
        assert!(request.validate().is_err());
    }
}
