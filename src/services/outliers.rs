//! Z-score scan over numeric columns.
//!
//! One algorithm, two report shapes: the cleaning view (outliers) and the ML
//! view (anomalies). They differ only in default threshold and field names.

use serde::Serialize;
use smallvec::SmallVec;

use super::statistics::{mean, sample_std};
use super::table::Table;
use crate::error::AnalyticsError;

pub const MAX_FLAGGED_PER_COLUMN: usize = 5;
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ZScoreHit {
    pub field: String,
    pub value: f64,
    pub mean: f64,
    pub z_score: f64,
    pub row_index: usize,
}

/// Flags `|x - mean| / std > threshold`, at most five per column in row
/// order. Zero-variance columns are skipped.
pub fn scan(table: &Table, threshold: f64) -> Result<Vec<ZScoreHit>, AnalyticsError> {
    if !(threshold.is_finite() && threshold > 0.0) {
        return Err(AnalyticsError::validation("threshold must be a positive number"));
    }

    let mut hits = Vec::new();
    for (name, values) in table.numeric_columns() {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let (Some(m), Some(std)) = (mean(&present), sample_std(&present)) else {
            continue;
        };
        if std <= 0.0 || !std.is_finite() {
            continue;
        }

        let flagged: SmallVec<[ZScoreHit; MAX_FLAGGED_PER_COLUMN]> = values
            .iter()
            .enumerate()
            .filter_map(|(row, v)| {
                let v = (*v)?;
                let z = (v - m).abs() / std;
                (z > threshold).then(|| ZScoreHit {
                    field: name.to_string(),
                    value: v,
                    mean: m,
                    z_score: z,
                    row_index: row,
                })
            })
            .take(MAX_FLAGGED_PER_COLUMN)
            .collect();

        hits.extend(flagged);
    }
    Ok(hits)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRecord {
    pub field: String,
    pub value: f64,
    pub mean: f64,
    pub z_score: f64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub total_outliers: usize,
    pub outliers: Vec<OutlierRecord>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub field: String,
    pub value: f64,
    pub mean: f64,
    #[serde(rename = "zScore")]
    pub z_score: f64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub success: bool,
    pub anomaly_count: usize,
    pub anomalies: Vec<AnomalyRecord>,
    pub threshold: f64,
}

impl From<ZScoreHit> for OutlierRecord {
    fn from(hit: ZScoreHit) -> Self {
        Self {
            field: hit.field,
            value: hit.value,
            mean: hit.mean,
            z_score: hit.z_score,
            index: hit.row_index,
        }
    }
}

impl From<ZScoreHit> for AnomalyRecord {
    fn from(hit: ZScoreHit) -> Self {
        Self {
            field: hit.field,
            value: hit.value,
            mean: hit.mean,
            z_score: hit.z_score,
            index: hit.row_index,
        }
    }
}

pub fn detect_outliers(table: &Table, threshold: f64) -> Result<OutlierReport, AnalyticsError> {
    let outliers: Vec<OutlierRecord> = scan(table, threshold)?.into_iter().map(Into::into).collect();
    Ok(OutlierReport {
        total_outliers: outliers.len(),
        outliers,
        threshold,
    })
}

pub fn detect_anomalies(table: &Table, threshold: f64) -> Result<AnomalyReport, AnalyticsError> {
    let anomalies: Vec<AnomalyRecord> = scan(table, threshold)?.into_iter().map(Into::into).collect();
    Ok(AnomalyReport {
        success: true,
        anomaly_count: anomalies.len(),
        anomalies,
        threshold,
    })
}
