pub mod forecasts;
pub mod reorder_alerts;
