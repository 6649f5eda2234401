use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

use crate::services::cleaner::{CleaningStats, CleaningStrategy};
use crate::services::table::Table;

fn default_true() -> bool {
    true
}

fn default_periods() -> usize {
    6
}

fn default_clusters() -> usize {
    4
}

fn default_sample_size() -> usize {
    500
}

fn default_preview_limit() -> usize {
    5
}

fn default_outlier_threshold() -> f64 {
    crate::services::outliers::DEFAULT_OUTLIER_THRESHOLD
}

fn default_anomaly_threshold() -> f64 {
    crate::services::outliers::DEFAULT_ANOMALY_THRESHOLD
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfigRequest {
    #[serde(default)]
    pub strategy: CleaningStrategy,
    #[serde(default = "default_true")]
    pub remove_duplicates: bool,
    #[serde(default = "default_true")]
    pub standardize_data: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    #[serde(default = "default_periods")]
    pub periods: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationRequest {
    #[serde(default = "default_clusters")]
    pub n_clusters: usize,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    #[serde(default = "default_sample_size")]
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    #[serde(default = "default_preview_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct OutlierQuery {
    #[serde(default = "default_outlier_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default = "default_anomaly_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    pub column: String,
    pub bins: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnQuery {
    pub column: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub date_col: String,
    pub value_col: String,
}

#[derive(Debug, Deserialize)]
pub struct HypothesisQuery {
    pub col1: String,
    pub col2: String,
}

/// Reply to an upload or a sample generation.
#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub success: bool,
    pub message: String,
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<String>,
}

impl LoadResponse {
    pub fn new(message: String, table: &Table) -> Self {
        Self {
            success: true,
            message,
            rows: table.row_count(),
            columns: table.column_count(),
            headers: table.headers(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub data: TableRecords,
    pub total_rows: usize,
    pub has_cleaned: bool,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: TableRecords,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct CleaningResults {
    pub success: bool,
    #[serde(flatten)]
    pub stats: CleaningStats,
    pub strategy_used: CleaningStrategy,
    pub final_rows: usize,
    pub final_columns: usize,
}

/// Table rows serialized as JSON objects, keys in column order and missing
/// cells as `null`.
#[derive(Debug, Clone)]
pub struct TableRecords {
    table: Arc<Table>,
    limit: Option<usize>,
}

impl TableRecords {
    pub fn all(table: Arc<Table>) -> Self {
        Self { table, limit: None }
    }

    pub fn head(table: Arc<Table>, limit: usize) -> Self {
        Self { table, limit: Some(limit) }
    }

    pub fn len(&self) -> usize {
        let rows = self.table.row_count();
        self.limit.map_or(rows, |l| l.min(rows))
    }
}

struct Record<'a> {
    table: &'a Table,
    row: usize,
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.table.column_count()))?;
        for (column, cell) in self.table.columns().iter().zip(self.table.row(self.row)) {
            map.serialize_entry(column.name(), &cell)?;
        }
        map.end()
    }
}

impl Serialize for TableRecords {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows = self.len();
        let mut seq = serializer.serialize_seq(Some(rows))?;
        for row in 0..rows {
            seq.serialize_element(&Record { table: &self.table, row })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::table::Column;

    #[test]
    fn test_records_keep_column_order_and_nulls() {
        let table = Table::new(vec![
            Column::text("zeta", vec![Some("a".into()), None]),
            Column::numeric("alpha", vec![Some(1.0), Some(2.5)]),
        ])
        .unwrap();

        let json = serde_json::to_string(&TableRecords::all(Arc::new(table))).unwrap();
        assert_eq!(json, r#"[{"zeta":"a","alpha":1.0},{"zeta":null,"alpha":2.5}]"#);
    }

    #[test]
    fn test_head_is_capped_by_row_count() {
        let table = Arc::new(Table::new(vec![Column::numeric("v", vec![Some(1.0); 3])]).unwrap());
        assert_eq!(TableRecords::head(table.clone(), 2).len(), 2);
        assert_eq!(TableRecords::head(table, 10).len(), 3);
    }

    #[test]
    fn test_cleaning_request_defaults() {
        let req: CleaningConfigRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.strategy, CleaningStrategy::Mean);
        assert!(req.remove_duplicates && req.standardize_data);

        let req: CleaningConfigRequest = serde_json::from_str(r#"{"strategy":"interpolation"}"#).unwrap();
        assert_eq!(req.strategy, CleaningStrategy::Interpolation);
    }
}
