use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use validator::Validate;

use inventory_forecast::{
    config::{self, AppConfig},
    handlers::reorder_alerts::{InventoryItemInput, ReorderAlertsRequest},
    ml::{forecasting::Forecast, reorder_risk::ReorderAlert},
    services::{forecasting::ReorderAlertBatch, sales_history::SalesHistory},
    AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::Forecast(args) => handle_forecast(config, args, cli.json).await,
        Commands::Alerts(args) => handle_alerts(config, args, cli.json).await,
    }
}

#[derive(Parser)]
#[command(
    name = "forecast-cli",
    about = "Offline demand forecasts and reorder alerts",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast daily demand for one product
    Forecast(ForecastArgs),
    /// Generate ranked reorder alerts for an inventory snapshot
    Alerts(AlertsArgs),
}

#[derive(Args)]
struct ForecastArgs {
    /// Sales history JSON file (defaults to the configured sales_data_path)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Product to forecast
    #[arg(long)]
    product: String,
    /// Number of days to forecast
    #[arg(long)]
    days: Option<usize>,
}

#[derive(Args)]
struct AlertsArgs {
    /// Sales history JSON file (defaults to the configured sales_data_path)
    #[arg(long)]
    data: Option<PathBuf>,
    /// Inventory JSON file: an array of items or `{"inventory": [...]}`
    #[arg(long)]
    inventory: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InventoryFile {
    Wrapped(ReorderAlertsRequest),
    Items(Vec<InventoryItemInput>),
}

fn load_state(mut config: AppConfig, data: Option<PathBuf>) -> Result<AppState> {
    if let Some(path) = data {
        config.sales_data_path = path;
    }
    let (history, report) = SalesHistory::load_json(&config.sales_data_path)
        .with_context(|| format!("failed to load {}", config.sales_data_path.display()))?;
    if report.rows_skipped > 0 {
        eprintln!(
            "warning: skipped {} malformed sales rows ({} loaded)",
            report.rows_skipped, report.rows_loaded
        );
    }
    Ok(AppState::new(config, Arc::new(history)))
}

async fn handle_forecast(config: AppConfig, args: ForecastArgs, json: bool) -> Result<()> {
    let state = load_state(config, args.data)?;
    let forecast = state
        .forecasting_service
        .get_forecast(&args.product, args.days)
        .await
        .with_context(|| format!("failed to forecast {}", args.product))?;

    if json {
        print_json(&forecast)
    } else {
        render_forecast(&forecast);
        Ok(())
    }
}

async fn handle_alerts(config: AppConfig, args: AlertsArgs, json: bool) -> Result<()> {
    let raw = fs::read_to_string(&args.inventory)
        .with_context(|| format!("failed to read {}", args.inventory.display()))?;
    let request = match serde_json::from_str::<InventoryFile>(&raw)
        .with_context(|| format!("{} is not a valid inventory file", args.inventory.display()))?
    {
        InventoryFile::Wrapped(request) => request,
        InventoryFile::Items(inventory) => ReorderAlertsRequest { inventory },
    };
    request
        .validate()
        .context("inventory file failed validation")?;

    let state = load_state(config, args.data)?;
    let default_threshold = state.forecasting_service.policy().default_threshold;
    let items = request
        .inventory
        .into_iter()
        .enumerate()
        .map(|(index, input)| input.into_item(index, default_threshold))
        .collect::<Result<Vec<_>, _>>()?;

    let batch = state.forecasting_service.reorder_alerts(items).await?;

    if json {
        print_json(&batch)
    } else {
        render_batch(&batch);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_forecast(forecast: &Forecast) {
    println!(
        "Forecast for {} • method {} • confidence {} • avg {:.2}/day",
        forecast.product_id, forecast.method, forecast.confidence, forecast.avg_prediction
    );
    for point in &forecast.predictions {
        println!("  {}  {}", point.date, point.predicted_quantity);
    }
}

fn render_alert(alert: &ReorderAlert) {
    println!(
        "- [{}] {} ({}) • stock {} / threshold {} • {:.1} days • reorder {}",
        alert.risk_level,
        alert.product_name,
        alert.product_id,
        alert.current_stock,
        alert.threshold,
        alert.days_until_reorder,
        alert.recommended_order_quantity
    );
    println!("    {}", alert.alert_message);
}

fn render_batch(batch: &ReorderAlertBatch) {
    println!(
        "{} alerts ({} high, {} medium, {} low)",
        batch.summary.total_alerts,
        batch.summary.high_priority_count,
        batch.summary.medium_priority_count,
        batch.summary.low_priority_count
    );
    for alert in &batch.alerts {
        render_alert(alert);
    }
    if !batch.failed_items.is_empty() {
        println!(
            "Forecast failed for: {} (threshold check only)",
            batch.failed_items.join(", ")
        );
    }
}
