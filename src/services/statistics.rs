use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use super::dates::{month_key, month_label, parse_date};
use super::table::{format_number, CellValue, ColumnData, Table};
use crate::error::AnalyticsError;

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;
pub const MAX_BINS: usize = 1000;
const PERCENTILE_POINTS: [f64; 7] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Population standard deviation (n denominator).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

/// Linear-interpolated percentile over an ascending slice, `p` in `[0, 100]`.
fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile_sorted(&sorted(values), 50.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub field: String,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Descriptive statistics for every numeric column with at least one value.
pub fn summary(table: &Table) -> Vec<FieldSummary> {
    let numeric: Vec<(&str, &[Option<f64>])> = table.numeric_columns().collect();

    numeric
        .par_iter()
        .filter_map(|(name, values)| {
            let data: Vec<f64> = values.iter().flatten().copied().collect();
            let sorted = sorted(&data);
            Some(FieldSummary {
                field: name.to_string(),
                mean: mean(&data)?,
                median: percentile_sorted(&sorted, 50.0)?,
                // A single observation has no spread.
                std: sample_std(&data).unwrap_or(0.0),
                min: *sorted.first()?,
                max: *sorted.last()?,
                count: data.len(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
    pub column: String,
}

/// Equal-width histogram over the non-missing values of a numeric column.
pub fn distribution(table: &Table, column: &str, bins: usize) -> Result<Distribution, AnalyticsError> {
    if bins == 0 || bins > MAX_BINS {
        return Err(AnalyticsError::validation(format!("bins must be between 1 and {}", MAX_BINS)));
    }
    let data: Vec<f64> = table.require_numeric(column)?.iter().flatten().copied().collect();

    let (mut lo, mut hi) = data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    });
    if data.is_empty() {
        lo = 0.0;
        hi = 1.0;
    } else if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + width * i as f64 })
        .collect();

    let mut counts = vec![0usize; bins];
    for v in &data {
        let idx = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(Distribution {
        labels: edges
            .windows(2)
            .map(|w| format!("{:.0}-{:.0}", w[0], w[1]))
            .collect(),
        values: counts,
        column: column.to_string(),
    })
}

/// Pearson correlation matrix, or an explicit "insufficient columns" signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Correlation {
    Matrix {
        columns: Vec<String>,
        /// `None` where a pair has no variance or fewer than two shared rows.
        #[serde(rename = "values")]
        matrix: Vec<Vec<Option<f64>>>,
    },
    Insufficient {
        error: String,
    },
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

pub fn correlation(table: &Table) -> Correlation {
    let numeric: Vec<(&str, &[Option<f64>])> = table.numeric_columns().collect();
    if numeric.len() < 2 {
        return Correlation::Insufficient {
            error: "Need at least 2 numeric columns for correlation".to_string(),
        };
    }

    let matrix = numeric
        .par_iter()
        .map(|(_, a)| numeric.iter().map(|(_, b)| pearson(a, b)).collect::<Vec<_>>())
        .collect();

    Correlation::Matrix {
        columns: numeric.iter().map(|(name, _)| name.to_string()).collect(),
        matrix,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalDistribution {
    pub labels: Vec<CellValue>,
    pub values: Vec<usize>,
    pub column: String,
}

/// Value counts, most frequent first; ties keep first-appearance order.
pub fn categorical_distribution(table: &Table, column: &str) -> Result<CategoricalDistribution, AnalyticsError> {
    let col = table.require_column(column)?;
    let counts = value_counts(col.data());

    Ok(CategoricalDistribution {
        labels: counts.iter().map(|(v, _)| v.clone()).collect(),
        values: counts.iter().map(|(_, n)| *n).collect(),
        column: column.to_string(),
    })
}

/// Non-missing value counts sorted descending, stable on first appearance.
pub fn value_counts(data: &ColumnData) -> Vec<(CellValue, usize)> {
    let mut order: Vec<CellValue> = Vec::new();
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    let mut bump = |key: String, value: CellValue| {
        let next = order.len();
        let entry = counts.entry(key).or_insert((next, 0));
        if entry.0 == next {
            order.push(value);
        }
        entry.1 += 1;
    };

    match data {
        ColumnData::Numeric(values) => {
            for v in values.iter().flatten() {
                bump(format_number(*v), CellValue::Number(*v));
            }
        }
        ColumnData::Text(values) => {
            for v in values.iter().flatten() {
                bump(v.clone(), CellValue::Text(v.clone()));
            }
        }
        ColumnData::Missing(_) => {}
    }

    let mut ranked: Vec<(usize, usize)> = counts.into_values().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .map(|(idx, n)| (order[idx].clone(), n))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Monthly sums of `value_col`. Rows with an unparseable date or a missing
/// value are dropped.
pub fn time_series_trend(table: &Table, date_col: &str, value_col: &str) -> Result<Trend, AnalyticsError> {
    let dates = table.require_column(date_col)?;
    let values = table.require_column(value_col)?;
    let values = values
        .as_numeric()
        .ok_or_else(|| AnalyticsError::validation(format!("Column {} is not numeric", value_col)))?;

    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let Some(value) = value else { continue };
        let date = match dates.cell(row) {
            CellValue::Text(s) => parse_date(&s),
            _ => None,
        };
        if let Some(date) = date {
            *buckets.entry(month_key(date)).or_insert(0.0) += value;
        }
    }

    debug!("Trend over {} monthly buckets", buckets.len());

    Ok(Trend {
        labels: buckets.keys().map(|k| month_label(*k)).collect(),
        values: buckets.into_values().collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisTest {
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub interpretation: String,
}

/// Independent two-sample t-test with pooled variance.
pub fn hypothesis_test(table: &Table, col1: &str, col2: &str) -> Result<HypothesisTest, AnalyticsError> {
    table.require_column(col1)?;
    table.require_column(col2)?;
    let (a, b) = match (table.require_numeric(col1), table.require_numeric(col2)) {
        (Ok(a), Ok(b)) => (a, b),
        _ => return Err(AnalyticsError::validation("Both columns must be numeric")),
    };
    let a: Vec<f64> = a.iter().flatten().copied().collect();
    let b: Vec<f64> = b.iter().flatten().copied().collect();

    if a.len() < 2 || b.len() < 2 {
        return Err(AnalyticsError::insufficient(
            "Each column needs at least 2 values for a t-test",
        ));
    }

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, m2) = (mean(&a).unwrap_or(0.0), mean(&b).unwrap_or(0.0));
    let v1 = sample_std(&a).unwrap_or(0.0).powi(2);
    let v2 = sample_std(&b).unwrap_or(0.0).powi(2);
    let df = n1 + n2 - 2.0;
    let pooled = ((n1 - 1.0) * v1 + (n2 - 1.0) * v2) / df;
    let se = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();

    if se == 0.0 || !se.is_finite() {
        return Err(AnalyticsError::insufficient(
            "Both columns have zero variance; t-test is undefined",
        ));
    }

    let t_statistic = (m1 - m2) / se;
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalyticsError::validation(format!("Invalid t distribution: {}", e)))?;
    let p_value = (2.0 * (1.0 - dist.cdf(t_statistic.abs()))).clamp(0.0, 1.0);
    let significant = p_value < SIGNIFICANCE_LEVEL;

    Ok(HypothesisTest {
        t_statistic,
        p_value,
        significant,
        interpretation: if significant {
            "Significant difference"
        } else {
            "No significant difference"
        }
        .to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileSet {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentiles {
    pub column: String,
    pub percentiles: PercentileSet,
}

pub fn percentiles(table: &Table, column: &str) -> Result<Percentiles, AnalyticsError> {
    let data: Vec<f64> = table.require_numeric(column)?.iter().flatten().copied().collect();
    let sorted = sorted(&data);
    if sorted.is_empty() {
        return Err(AnalyticsError::insufficient(format!("Column {} has no values", column)));
    }

    let p: Vec<f64> = PERCENTILE_POINTS
        .iter()
        .filter_map(|&q| percentile_sorted(&sorted, q))
        .collect();

    Ok(Percentiles {
        column: column.to_string(),
        percentiles: PercentileSet {
            p10: p[0],
            p25: p[1],
            p50: p[2],
            p75: p[3],
            p90: p[4],
            p95: p[5],
            p99: p[6],
        },
    })
}
