use std::{collections::BTreeMap, path::Path};

use serde_json::Value;
use tracing::{info, warn};

use crate::{errors::ServiceError, ml::forecasting::SalesRecord};

/// Read access to per-product sales history
#[cfg_attr(test, mockall::automock)]
pub trait SalesHistorySource: Send + Sync {
    /// Records for one product, oldest first; `None` when the product is unknown
    fn history_for(&self, product_id: &str) -> Result<Option<Vec<SalesRecord>>, ServiceError>;

    /// Every product with at least one record, sorted
    fn product_ids(&self) -> Vec<String>;
}

/// Row counts from loading a sales file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_loaded: usize,
    pub rows_skipped: usize,
}

/// In-memory sales history grouped by product
#[derive(Debug, Clone, Default)]
pub struct SalesHistory {
    by_product: BTreeMap<String, Vec<SalesRecord>>,
}

impl SalesHistory {
    pub fn from_records(records: impl IntoIterator<Item = SalesRecord>) -> Self {
        let mut by_product: BTreeMap<String, Vec<SalesRecord>> = BTreeMap::new();
        for record in records {
            by_product
                .entry(record.product_id.clone())
                .or_default()
                .push(record);
        }
        for records in by_product.values_mut() {
            records.sort_by_key(|r| r.date);
        }
        Self { by_product }
    }

    /// Parse a JSON array of sales rows.
    ///
    /// Rows with an unparseable date, a negative or fractional quantity or an
    /// empty product id are skipped. A document that is not an array fails.
    pub fn from_json_str(json: &str) -> Result<(Self, LoadReport), ServiceError> {
        let rows: Vec<Value> = serde_json::from_str(json).map_err(|e| {
            ServiceError::DataLoadError(format!("sales data is not a JSON array: {}", e))
        })?;

        let mut report = LoadReport::default();
        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match parse_row(row) {
                Ok(record) => {
                    report.rows_loaded += 1;
                    records.push(record);
                }
                Err(reason) => {
                    report.rows_skipped += 1;
                    warn!(row = index, %reason, "Skipping malformed sales row");
                }
            }
        }

        Ok((Self::from_records(records), report))
    }

    /// Load a sales file; a missing file yields an empty history
    pub fn load_json(path: impl AsRef<Path>) -> Result<(Self, LoadReport), ServiceError> {
        let path = path.as_ref();
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Sales data file not found; starting with empty history");
                return Ok((Self::default(), LoadReport::default()));
            }
            Err(e) => {
                return Err(ServiceError::DataLoadError(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let (history, report) = Self::from_json_str(&json)?;
        info!(
            path = %path.display(),
            products = history.len(),
            rows_loaded = report.rows_loaded,
            rows_skipped = report.rows_skipped,
            "Loaded sales history"
        );
        Ok((history, report))
    }

    pub fn len(&self) -> usize {
        self.by_product.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty()
    }

    pub fn records(&self, product_id: &str) -> Option<&[SalesRecord]> {
        self.by_product.get(product_id).map(Vec::as_slice)
    }
}

impl SalesHistorySource for SalesHistory {
    fn history_for(&self, product_id: &str) -> Result<Option<Vec<SalesRecord>>, ServiceError> {
        Ok(self.records(product_id).map(<[SalesRecord]>::to_vec))
    }

    fn product_ids(&self) -> Vec<String> {
        self.by_product.keys().cloned().collect()
    }
}

fn parse_row(row: Value) -> Result<SalesRecord, String> {
    let record: SalesRecord = serde_json::from_value(row).map_err(|e| e.to_string())?;
    if record.product_id.trim().is_empty() {
        return Err("empty product_id".to_string());
    }
    Ok(record)
}
