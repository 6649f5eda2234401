use rayon::prelude::*;
use serde::Serialize;

use super::table::{Column, Table};

const GOOD_COMPLETENESS: f64 = 90.0;
const FAIR_COMPLETENESS: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityScore {
    Good,
    Fair,
    Poor,
}

impl QualityScore {
    pub fn from_completeness(pct: f64) -> Self {
        if pct > GOOD_COMPLETENESS {
            QualityScore::Good
        } else if pct > FAIR_COMPLETENESS {
            QualityScore::Fair
        } else {
            QualityScore::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// Percentage of non-missing cells, rounded to one decimal.
    #[serde(rename = "completeness")]
    pub completeness_pct: f64,
    pub missing_count: usize,
    pub total_cells: usize,
    pub duplicate_count: usize,
    pub quality_score: QualityScore,
}

/// Completeness and duplicate metrics. Pure; never mutates the table.
pub fn assess(table: &Table) -> QualityMetrics {
    let total_cells = table.total_cells();
    let missing_count: usize = table.columns().par_iter().map(Column::missing_count).sum();

    let completeness = if total_cells > 0 {
        (total_cells - missing_count) as f64 / total_cells as f64 * 100.0
    } else {
        0.0
    };

    QualityMetrics {
        completeness_pct: (completeness * 10.0).round() / 10.0,
        missing_count,
        total_cells,
        duplicate_count: table.duplicate_count(),
        quality_score: QualityScore::from_completeness(completeness),
    }
}
