use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::columns::{candidates, ColumnRole};
use super::dates::{month_key, month_label, parse_date};
use super::table::{Column, Table};
use crate::error::AnalyticsError;

const HISTORY_TAIL: usize = 6;
const FALLBACK_PERIODS: usize = 8;
const MIN_HISTORY: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastMetrics {
    pub avg_historical: f64,
    pub avg_forecast: f64,
    /// Percent change of the forecast average over the historical average.
    pub growth_rate: f64,
    pub total_historical: f64,
    pub total_forecast: f64,
    pub periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub success: bool,
    pub historical: Vec<f64>,
    pub forecast: Vec<f64>,
    pub labels: Vec<String>,
    pub metrics: ForecastMetrics,
}

/// Least-squares line fitted against `0..n`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearTrend {
    slope: f64,
    intercept: f64,
}

impl LinearTrend {
    fn fit(series: &[f64]) -> Self {
        let n = series.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = series.iter().sum::<f64>() / n;

        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (i, y) in series.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxy += dx * (y - y_mean);
            sxx += dx * dx;
        }
        let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };

        Self { slope, intercept: y_mean - slope * x_mean }
    }

    fn predict(&self, x: usize) -> f64 {
        self.intercept + self.slope * x as f64
    }
}

/// Value column: the last numeric column whose name looks monetary or
/// sales-like, else the first numeric column.
fn value_column(table: &Table) -> Result<&Column, AnalyticsError> {
    candidates(table, &[ColumnRole::Monetary, ColumnRole::Sales])
        .into_iter()
        .filter(|c| c.as_numeric().is_some())
        .last()
        .or_else(|| table.columns().iter().find(|c| c.as_numeric().is_some()))
        .ok_or_else(|| AnalyticsError::validation("No numeric column found for forecasting"))
}

/// Monthly sums keyed by the date column. `None` when the column holds a
/// value that is not a date, which sends the caller to the chunked fallback.
fn monthly_series(dates: &Column, values: &[Option<f64>]) -> Option<(Vec<f64>, Vec<String>)> {
    let dates = dates.as_text()?;
    let mut buckets: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for (date, value) in dates.iter().zip(values) {
        let Some(date) = date else { continue };
        let key = month_key(parse_date(date)?);
        *buckets.entry(key).or_insert(0.0) += value.unwrap_or(0.0);
    }

    let labels = buckets.keys().map(|k| month_label(*k)).collect();
    Some((buckets.into_values().collect(), labels))
}

/// Splits values into `parts` contiguous chunks and sums each; the last chunk
/// takes the remainder.
fn chunked_series(values: &[f64], parts: usize) -> Vec<f64> {
    let size = (values.len() / parts).max(1);
    (0..parts)
        .filter_map(|i| {
            let start = i * size;
            if start >= values.len() {
                return None;
            }
            let end = if i == parts - 1 { values.len() } else { (start + size).min(values.len()) };
            Some(values[start..end].iter().sum())
        })
        .collect()
}

/// Linear-trend extrapolation over a period-aggregated value series.
pub fn forecast(table: &Table, periods: usize) -> Result<ForecastResult, AnalyticsError> {
    if periods == 0 {
        return Err(AnalyticsError::validation("periods must be at least 1"));
    }

    let value_col = value_column(table)?;
    let values = value_col.as_numeric().unwrap_or_default();
    let date_col = candidates(table, &[ColumnRole::Temporal]).into_iter().last();

    let monthly = date_col.and_then(|d| monthly_series(d, values));
    let (historical, labels) = match monthly {
        Some(series) => {
            debug!("Forecasting {} by month", value_col.name());
            series
        }
        None => {
            debug!("Forecasting {} over {} chunks", value_col.name(), FALLBACK_PERIODS);
            let present = value_col.present_numbers();
            let series = chunked_series(&present, FALLBACK_PERIODS);
            let labels = (1..=series.len()).map(|i| format!("Period {}", i)).collect();
            (series, labels)
        }
    };

    if historical.len() < MIN_HISTORY {
        return Err(AnalyticsError::insufficient(format!(
            "Insufficient data for forecasting: need at least {} periods, got {}",
            MIN_HISTORY,
            historical.len()
        )));
    }

    let trend = LinearTrend::fit(&historical);
    let forecast: Vec<f64> = (historical.len()..historical.len() + periods)
        .map(|x| trend.predict(x))
        .collect();

    let avg_historical = historical.iter().sum::<f64>() / historical.len() as f64;
    let avg_forecast = forecast.iter().sum::<f64>() / forecast.len() as f64;
    let growth_rate = if avg_historical != 0.0 {
        (avg_forecast - avg_historical) / avg_historical * 100.0
    } else {
        0.0
    };

    info!(
        "Forecast {} periods from {} historical points (slope {:.3})",
        periods,
        historical.len(),
        trend.slope
    );

    let tail_start = historical.len().saturating_sub(HISTORY_TAIL);
    let mut out_labels: Vec<String> = labels[tail_start..].to_vec();
    out_labels.extend((1..=periods).map(|i| format!("Forecast +{}", i)));

    Ok(ForecastResult {
        success: true,
        historical: historical[tail_start..].to_vec(),
        metrics: ForecastMetrics {
            avg_historical,
            avg_forecast,
            growth_rate: (growth_rate * 10.0).round() / 10.0,
            total_historical: historical.iter().sum(),
            total_forecast: forecast.iter().sum(),
            periods,
        },
        forecast,
        labels: out_labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sample_data::{generate, SampleKind};

    #[test]
    fn test_linear_series_extrapolates_exactly() {
        let dates = (1..=5).map(|m| Some(format!("2025-{:02}-15", m))).collect();
        let table = Table::new(vec![
            Column::text("order_date", dates),
            Column::numeric("revenue", vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0), Some(50.0)]),
        ])
        .unwrap();

        let result = forecast(&table, 2).unwrap();
        assert_eq!(result.forecast.len(), 2);
        assert!((result.forecast[0] - 60.0).abs() < 1e-9);
        assert!((result.forecast[1] - 70.0).abs() < 1e-9);
        assert_eq!(result.historical, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(
            result.labels,
            vec!["2025-01", "2025-02", "2025-03", "2025-04", "2025-05", "Forecast +1", "Forecast +2"]
        );
        assert_eq!(result.metrics.avg_historical, 30.0);
        assert_eq!(result.metrics.avg_forecast, 65.0);
        assert_eq!(result.metrics.growth_rate, 116.7);
        assert_eq!(result.metrics.total_forecast, 130.0);
    }

    #[test]
    fn test_unparseable_dates_fall_back_to_chunks() {
        let table = Table::new(vec![
            Column::text("date", (0..16).map(|i| Some(format!("day {}", i))).collect()),
            Column::numeric("amount", (0..16).map(|i| Some(i as f64)).collect()),
        ])
        .unwrap();

        let result = forecast(&table, 3).unwrap();
        assert_eq!(result.forecast.len(), 3);
        assert_eq!(result.historical.len(), HISTORY_TAIL);
        assert_eq!(result.labels[0], "Period 3");
        assert_eq!(result.metrics.total_historical, 120.0);
    }

    #[test]
    fn test_chunking_absorbs_remainder() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let chunks = chunked_series(&values, 8);
        assert_eq!(chunks.len(), 8);
        assert_eq!(chunks[7], 8.0 + 9.0 + 10.0);
        assert_eq!(chunked_series(&[1.0, 2.0], 8), vec![1.0, 2.0]);
    }

    #[test]
    fn test_insufficient_history() {
        let table = Table::new(vec![Column::numeric("sales", vec![Some(1.0), Some(2.0)])]).unwrap();
        assert!(matches!(
            forecast(&table, 6),
            Err(AnalyticsError::InsufficientData(_))
        ));

        let table = Table::new(vec![
            Column::text("date", vec![Some("2025-01-01".into()), Some("2025-01-09".into())]),
            Column::numeric("revenue", vec![Some(1.0), Some(2.0)]),
        ])
        .unwrap();
        assert!(matches!(
            forecast(&table, 6),
            Err(AnalyticsError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_requires_numeric_column() {
        let table = Table::new(vec![Column::text("name", vec![Some("a".into())])]).unwrap();
        assert!(matches!(forecast(&table, 1), Err(AnalyticsError::Validation(_))));
    }

    #[test]
    fn test_sales_sample_forecasts_requested_periods() {
        let table = generate(SampleKind::Sales, 500, 42).unwrap();
        for periods in [1, 6, 12] {
            let result = forecast(&table, periods).unwrap();
            assert_eq!(result.forecast.len(), periods);
            assert_eq!(result.labels.len(), result.historical.len() + periods);
            assert_eq!(result.metrics.periods, periods);
        }
    }
}
