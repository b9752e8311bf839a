// Forecasting and reorder alerting
pub mod forecasting;

// Sales history storage
pub mod sales_history;
