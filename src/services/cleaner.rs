use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::statistics::{mean, median, sample_std};
use super::table::{Column, ColumnData, Table};
use crate::error::AnalyticsError;

/// Relative spread of the noise added by the `ml` strategy.
const ML_NOISE_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleaningStrategy {
    #[default]
    Mean,
    Median,
    Mode,
    Interpolation,
    /// Mean fill plus Gaussian jitter on the filled cells. A stand-in for a
    /// learned imputer, not a model.
    Ml,
    Remove,
}

impl CleaningStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningStrategy::Mean => "mean",
            CleaningStrategy::Median => "median",
            CleaningStrategy::Mode => "mode",
            CleaningStrategy::Interpolation => "interpolation",
            CleaningStrategy::Ml => "ml",
            CleaningStrategy::Remove => "remove",
        }
    }
}

impl fmt::Display for CleaningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleaningOptions {
    pub strategy: CleaningStrategy,
    pub remove_duplicates: bool,
    pub standardize: bool,
    /// Seed for the `ml` strategy noise.
    pub seed: u64,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            strategy: CleaningStrategy::Mean,
            remove_duplicates: true,
            standardize: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CleaningStats {
    pub missing_found: usize,
    pub missing_filled: usize,
    pub duplicates_removed: usize,
}

/// Fills missing values, drops duplicate rows and trims text, returning a new
/// table. The input is never modified.
pub fn clean(table: &Table, options: &CleaningOptions) -> Result<(Table, CleaningStats), AnalyticsError> {
    if table.column_count() == 0 {
        return Err(AnalyticsError::validation("Cannot clean a table with no columns"));
    }

    let mut stats = CleaningStats {
        missing_found: table.missing_count(),
        ..CleaningStats::default()
    };
    info!(
        "Cleaning {} rows x {} columns with strategy {} ({} missing)",
        table.row_count(),
        table.column_count(),
        options.strategy,
        stats.missing_found
    );

    let mut cleaned = match options.strategy {
        CleaningStrategy::Remove => {
            let keep: Vec<usize> = (0..table.row_count())
                .filter(|&row| !table.row_has_missing(row))
                .collect();
            table.select_rows(&keep)
        }
        strategy => fill_missing(table, strategy, options.seed)?,
    };

    stats.missing_filled = match options.strategy {
        CleaningStrategy::Remove => stats.missing_found,
        _ => stats.missing_found - cleaned.missing_count(),
    };

    if options.remove_duplicates {
        let before = cleaned.row_count();
        let keep: Vec<usize> = cleaned
            .duplicate_flags()
            .into_iter()
            .enumerate()
            .filter(|(_, dup)| !dup)
            .map(|(row, _)| row)
            .collect();
        cleaned = cleaned.select_rows(&keep);
        stats.duplicates_removed = before - cleaned.row_count();
    }

    if options.standardize {
        cleaned = standardize_text(&cleaned)?;
    }

    debug!("Cleaning finished: {:?}", stats);
    Ok((cleaned, stats))
}

fn fill_missing(table: &Table, strategy: CleaningStrategy, seed: u64) -> Result<Table, AnalyticsError> {
    let mut rng = StdRng::seed_from_u64(seed);

    let columns = table
        .columns()
        .iter()
        .map(|column| match (column.data(), strategy) {
            (ColumnData::Numeric(values), CleaningStrategy::Mean) => {
                Column::numeric(column.name(), fill_constant(values, mean))
            }
            (ColumnData::Numeric(values), CleaningStrategy::Median) => {
                Column::numeric(column.name(), fill_constant(values, median))
            }
            (ColumnData::Numeric(values), CleaningStrategy::Mode) => {
                Column::numeric(column.name(), fill_constant(values, numeric_mode))
            }
            (ColumnData::Numeric(values), CleaningStrategy::Interpolation) => {
                Column::numeric(column.name(), interpolate(values))
            }
            (ColumnData::Numeric(values), CleaningStrategy::Ml) => {
                Column::numeric(column.name(), fill_with_noise(values, &mut rng))
            }
            (ColumnData::Text(values), _) => Column::text(column.name(), fill_text_mode(values)),
            _ => column.clone(),
        })
        .collect();

    Table::new(columns)
}

fn fill_constant(values: &[Option<f64>], stat: fn(&[f64]) -> Option<f64>) -> Vec<Option<f64>> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    match stat(&present) {
        Some(fill) => values.iter().map(|v| Some(v.unwrap_or(fill))).collect(),
        None => values.to_vec(),
    }
}

/// Most frequent value; ties resolve to the smallest.
fn numeric_mode(values: &[f64]) -> Option<f64> {
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for v in values {
        counts.entry((v + 0.0).to_bits()).or_insert((*v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal))
        })
        .map(|(v, _)| v)
}

/// Most frequent text; ties resolve to the lexicographically smallest.
fn text_mode(values: &[Option<String>]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values.iter().flatten() {
        *counts.entry(v.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
}

fn fill_text_mode(values: &[Option<String>]) -> Vec<Option<String>> {
    match text_mode(values) {
        Some(fill) => values
            .iter()
            .map(|v| Some(v.clone().unwrap_or_else(|| fill.clone())))
            .collect(),
        None => values.to_vec(),
    }
}

/// Linear interpolation by row position. Leading and trailing gaps take the
/// nearest present value.
fn interpolate(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let anchors: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|x| (i, x)))
        .collect();
    let (Some(&first), Some(&last)) = (anchors.first(), anchors.last()) else {
        return values.to_vec();
    };

    let mut out = values.to_vec();
    for window in anchors.windows(2) {
        let ((i0, y0), (i1, y1)) = (window[0], window[1]);
        for (i, slot) in out.iter_mut().enumerate().take(i1).skip(i0 + 1) {
            let t = (i - i0) as f64 / (i1 - i0) as f64;
            *slot = Some(y0 + (y1 - y0) * t);
        }
    }
    for slot in out.iter_mut().take(first.0) {
        *slot = Some(first.1);
    }
    for slot in out.iter_mut().skip(last.0 + 1) {
        *slot = Some(last.1);
    }
    out
}

fn fill_with_noise(values: &[Option<f64>], rng: &mut StdRng) -> Vec<Option<f64>> {
    let mut filled = fill_constant(values, mean);
    let dense: Vec<f64> = filled.iter().flatten().copied().collect();
    let sigma = sample_std(&dense).unwrap_or(0.0) * ML_NOISE_FRACTION;

    if let Ok(noise) = Normal::new(0.0, sigma) {
        for (slot, original) in filled.iter_mut().zip(values) {
            if original.is_none() {
                if let Some(v) = slot.as_mut() {
                    *v += noise.sample(rng);
                }
            }
        }
    }
    filled
}

fn standardize_text(table: &Table) -> Result<Table, AnalyticsError> {
    let columns = table
        .columns()
        .iter()
        .map(|column| match column.as_text() {
            Some(values) => Column::text(
                column.name(),
                values
                    .iter()
                    .map(|v| v.as_ref().map(|s| s.trim().to_string()))
                    .collect(),
            ),
            None => column.clone(),
        })
        .collect();
    Table::new(columns)
}
