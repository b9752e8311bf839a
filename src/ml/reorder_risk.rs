/*!
 * # Reorder Risk
 *
 * Combines current stock, a reorder threshold and a demand forecast into a
 * risk classification, a recommended order quantity and an alert message.
 * The reorder threshold is a backstop: an item at or below it is always
 * alerted, but fast-selling items are alerted earlier on forecast velocity.
 */

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::forecasting::{mean, round_quantity, round_to};

const DEFAULT_HIGH_RISK_DAYS: f64 = 3.0;
const DEFAULT_MEDIUM_RISK_DAYS: f64 = 7.0;
const DEFAULT_THRESHOLD: f64 = 2.0;
const DEFAULT_MIN_ORDER_QUANTITY: u32 = 10;
const DEFAULT_COVERAGE_DAYS: u32 = 7;
const DEFAULT_NO_DEMAND_DAYS: f64 = 30.0;
const DEFAULT_PREVIEW_DAYS: usize = 7;
/// Days reported for an item with no history that is at or below threshold
const THRESHOLD_ONLY_DAYS: f64 = 1.0;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Sort key for batch ranking, most urgent first
    pub fn priority(self) -> u8 {
        match self {
            RiskLevel::High => 0,
            RiskLevel::Medium => 1,
            RiskLevel::Low => 2,
        }
    }
}

/// Stock snapshot for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InventoryItem {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: f64,
    pub reorder_threshold: f64,
}

/// Reorder decision policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ReorderPolicy {
    /// Days of stock at or below which risk is high
    #[validate(custom = "validate_positive_days")]
    pub high_risk_days: f64,

    /// Days of stock at or below which risk is medium
    #[validate(custom = "validate_positive_days")]
    pub medium_risk_days: f64,

    /// Threshold applied when an inventory row carries none
    #[validate(custom = "validate_non_negative")]
    pub default_threshold: f64,

    /// Floor of every recommended order
    #[validate(range(min = 1))]
    pub min_order_quantity: u32,

    /// Days of forecast demand a recommended order should cover
    #[validate(range(min = 1))]
    pub coverage_days: u32,

    /// Days reported when the forecast expects no demand
    #[validate(custom = "validate_positive_days")]
    pub no_demand_days: f64,

    /// Forecast days echoed back in an alert
    #[validate(range(min = 1))]
    pub prediction_preview_days: usize,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            high_risk_days: DEFAULT_HIGH_RISK_DAYS,
            medium_risk_days: DEFAULT_MEDIUM_RISK_DAYS,
            default_threshold: DEFAULT_THRESHOLD,
            min_order_quantity: DEFAULT_MIN_ORDER_QUANTITY,
            coverage_days: DEFAULT_COVERAGE_DAYS,
            no_demand_days: DEFAULT_NO_DEMAND_DAYS,
            prediction_preview_days: DEFAULT_PREVIEW_DAYS,
        }
    }
}

fn validate_positive_days(days: f64) -> Result<(), ValidationError> {
    if !days.is_finite() || days <= 0.0 {
        let mut err = ValidationError::new("days");
        err.message = Some("day cut-offs must be finite and greater than 0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_non_negative(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        let mut err = ValidationError::new("default_threshold");
        err.message = Some("default_threshold must be finite and non-negative".into());
        return Err(err);
    }
    Ok(())
}

/// Intermediate result of risk classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    /// Unrounded days of stock remaining
    pub days_until_reorder: f64,
    /// Mean forecast demand; `None` when the product has no forecast
    pub avg_daily_sales: Option<f64>,
}

/// Forecast day echoed back in an alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PredictionPreview {
    pub day: u32,
    pub predicted_sales: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReorderAlert {
    pub product_id: String,
    pub product_name: String,
    pub current_stock: f64,
    pub threshold: f64,
    pub risk_level: RiskLevel,
    /// Days of stock remaining, one decimal
    pub days_until_reorder: f64,
    pub recommended_order_quantity: u32,
    pub predictions: Vec<PredictionPreview>,
    pub alert_message: String,
}

impl ReorderPolicy {
    /// Map days of remaining stock onto a risk level
    pub fn classify(&self, days_until_reorder: f64) -> RiskLevel {
        if days_until_reorder <= self.high_risk_days {
            RiskLevel::High
        } else if days_until_reorder <= self.medium_risk_days {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Classify an item against its forecast (`None` when it has no history)
    pub fn assess(&self, item: &InventoryItem, forecast: Option<&[f64]>) -> RiskAssessment {
        let avg_daily_sales = forecast.and_then(mean);
        let mut assessment = RiskAssessment {
            risk_level: RiskLevel::Low,
            days_until_reorder: self.no_demand_days,
            avg_daily_sales,
        };

        match avg_daily_sales {
            None => {
                if item.current_stock <= item.reorder_threshold {
                    assessment.risk_level = RiskLevel::High;
                    assessment.days_until_reorder = THRESHOLD_ONLY_DAYS;
                }
            }
            Some(avg) if avg > 0.0 => {
                assessment.days_until_reorder = item.current_stock / avg;
                assessment.risk_level = self.classify(assessment.days_until_reorder);
            }
            // no expected demand: keep the low/no-demand defaults
            Some(_) => {}
        }

        assessment
    }

    /// Whether an assessed item warrants an alert
    pub fn should_alert(&self, item: &InventoryItem, assessment: &RiskAssessment) -> bool {
        item.current_stock <= item.reorder_threshold
            || matches!(assessment.risk_level, RiskLevel::High | RiskLevel::Medium)
    }

    pub fn recommended_order_quantity(&self, avg_daily_sales: Option<f64>) -> u32 {
        let covered = avg_daily_sales
            .map(|avg| round_quantity(avg * f64::from(self.coverage_days)))
            .unwrap_or(0);
        covered.max(self.min_order_quantity)
    }
}

/// Human-readable alert text for an assessed item
pub fn alert_message(risk_level: RiskLevel, days_until_reorder: f64, current_stock: f64) -> String {
    match risk_level {
        RiskLevel::High if days_until_reorder <= 1.0 => format!(
            "CRITICAL: Stock critically low! Only {} units remaining. Reorder immediately!",
            current_stock
        ),
        RiskLevel::High => format!(
            "HIGH RISK: Stock running low. {:.1} days until reorder needed.",
            days_until_reorder
        ),
        RiskLevel::Medium => format!(
            "MEDIUM RISK: Monitor stock closely. {:.1} days until reorder needed.",
            days_until_reorder
        ),
        RiskLevel::Low => {
            "LOW RISK: Stock adequate but below threshold. Consider reordering soon.".to_string()
        }
    }
}

/// Assess one item; `None` when it is judged safe
pub fn assess_risk(
    item: &InventoryItem,
    forecast: Option<&[f64]>,
    policy: &ReorderPolicy,
) -> Option<ReorderAlert> {
    let assessment = policy.assess(item, forecast);
    if !policy.should_alert(item, &assessment) {
        return None;
    }

    let predictions = forecast
        .unwrap_or_default()
        .iter()
        .take(policy.prediction_preview_days)
        .enumerate()
        .map(|(i, value)| PredictionPreview {
            day: i as u32 + 1,
            predicted_sales: round_quantity(*value),
        })
        .collect();

    Some(ReorderAlert {
        product_id: item.product_id.clone(),
        product_name: item.product_name.clone(),
        current_stock: item.current_stock,
        threshold: item.reorder_threshold,
        risk_level: assessment.risk_level,
        days_until_reorder: round_to(assessment.days_until_reorder, 1),
        recommended_order_quantity: policy.recommended_order_quantity(assessment.avg_daily_sales),
        predictions,
        alert_message: alert_message(
            assessment.risk_level,
            assessment.days_until_reorder,
            item.current_stock,
        ),
    })
}

/// Order alerts most urgent first; equal-risk alerts keep their input order
pub fn rank_alerts(alerts: &mut [ReorderAlert]) {
    // stable sort
    alerts.sort_by_key(|alert| alert.risk_level.priority());
}

/// Counters reported alongside a batch of alerts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AlertSummary {
    pub total_alerts: usize,
    pub high_priority_count: usize,
    pub medium_priority_count: usize,
    pub low_priority_count: usize,
}

impl AlertSummary {
    pub fn from_alerts(alerts: &[ReorderAlert]) -> Self {
        alerts.iter().fold(
            Self {
                total_alerts: alerts.len(),
                ..Default::default()
            },
            |mut summary, alert| {
                match alert.risk_level {
                    RiskLevel::High => summary.high_priority_count += 1,
                    RiskLevel::Medium => summary.medium_priority_count += 1,
                    RiskLevel::Low => summary.low_priority_count += 1,
                }
                summary
            },
        )
    }
}
