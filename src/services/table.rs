//! Column-oriented in-memory table with an explicit missing-value state.
//!
//! Every column carries a dtype tag fixed when the column is built. Missing
//! cells are `None`, never a NaN sentinel.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::AnalyticsError;

/// Dtype tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Text,
    /// No parseable value at all.
    Missing,
}

/// A single cell, as handed across the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{}", format_number(*v)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Missing => Ok(()),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Number(v) if v.is_finite() => serializer.serialize_f64(*v),
            CellValue::Number(_) | CellValue::Missing => serializer.serialize_none(),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Renders integral floats without a fractional part ("3" rather than "3.0").
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Missing(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    /// Numeric column. A column with no present value becomes missing-only.
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        // NaN coming from an upstream parser is a missing marker, not data.
        let values: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        let data = if values.iter().all(Option::is_none) {
            ColumnData::Missing(values.len())
        } else {
            ColumnData::Numeric(values)
        };
        Self { name: name.into(), data }
    }

    /// Text column. A column with no present value becomes missing-only.
    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        let data = if values.iter().all(Option::is_none) {
            ColumnData::Missing(values.len())
        } else {
            ColumnData::Text(values)
        };
        Self { name: name.into(), data }
    }

    pub fn missing(name: impl Into<String>, len: usize) -> Self {
        Self { name: name.into(), data: ColumnData::Missing(len) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn kind(&self) -> ColumnKind {
        match self.data {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
            ColumnData::Missing(_) => ColumnKind::Missing,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Missing(n) => *n,
        }
    }

    pub fn is_missing_at(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric(v) => v[row].is_none(),
            ColumnData::Text(v) => v[row].is_none(),
            ColumnData::Missing(_) => true,
        }
    }

    pub fn missing_count(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Missing(n) => *n,
        }
    }

    pub fn cell(&self, row: usize) -> CellValue {
        match &self.data {
            ColumnData::Numeric(v) => v[row].map_or(CellValue::Missing, CellValue::Number),
            ColumnData::Text(v) => v[row]
                .as_ref()
                .map_or(CellValue::Missing, |s| CellValue::Text(s.clone())),
            ColumnData::Missing(_) => CellValue::Missing,
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Non-missing numeric values in row order; empty for non-numeric columns.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.as_numeric()
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Same column restricted to the given rows, kind re-derived.
    fn select(&self, rows: &[usize]) -> Column {
        match &self.data {
            ColumnData::Numeric(v) => {
                Column::numeric(self.name.clone(), rows.iter().map(|&i| v[i]).collect())
            }
            ColumnData::Text(v) => {
                Column::text(self.name.clone(), rows.iter().map(|&i| v[i].clone()).collect())
            }
            ColumnData::Missing(_) => Column::missing(self.name.clone(), rows.len()),
        }
    }
}

/// Hashable form of a cell used for full-row equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Number(u64),
    Text(&'a str),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Builds a rectangular table. Column names must be unique and every
    /// column must hold exactly the same number of values.
    pub fn new(columns: Vec<Column>) -> Result<Self, AnalyticsError> {
        let rows = columns.first().map_or(0, Column::len);

        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != rows {
                return Err(AnalyticsError::validation(format!(
                    "Column {} has {} values, expected {}",
                    column.name(),
                    column.len(),
                    rows
                )));
            }
            if !seen.insert(column.name()) {
                return Err(AnalyticsError::validation(format!(
                    "Duplicate column name {}",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn total_cells(&self) -> usize {
        self.rows * self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, AnalyticsError> {
        self.column(name)
            .ok_or_else(|| AnalyticsError::validation(format!("Column {} not found", name)))
    }

    pub fn require_numeric(&self, name: &str) -> Result<&[Option<f64>], AnalyticsError> {
        self.require_column(name)?
            .as_numeric()
            .ok_or_else(|| AnalyticsError::validation(format!("Column {} is not numeric", name)))
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns
            .iter()
            .filter_map(|c| c.as_numeric().map(|v| (c.name(), v)))
    }

    pub fn missing_count(&self) -> usize {
        self.columns.iter().map(Column::missing_count).sum()
    }

    pub fn row_has_missing(&self, row: usize) -> bool {
        self.columns.iter().any(|c| c.is_missing_at(row))
    }

    pub fn row(&self, row: usize) -> Vec<CellValue> {
        self.columns.iter().map(|c| c.cell(row)).collect()
    }

    /// Keeps the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            rows: rows.len(),
        }
    }

    /// `true` at every row that repeats an earlier row across all columns.
    /// Missing cells compare equal to each other.
    pub fn duplicate_flags(&self) -> Vec<bool> {
        let mut seen = HashSet::with_capacity(self.rows);
        (0..self.rows)
            .map(|row| !seen.insert(self.row_key(row)))
            .collect()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_flags().into_iter().filter(|d| *d).count()
    }

    fn row_key(&self, row: usize) -> Vec<CellKey<'_>> {
        self.columns
            .iter()
            .map(|c| match &c.data {
                ColumnData::Numeric(v) => match v[row] {
                    // -0.0 and 0.0 are the same value
                    Some(x) => CellKey::Number((x + 0.0).to_bits()),
                    None => CellKey::Missing,
                },
                ColumnData::Text(v) => v[row].as_deref().map_or(CellKey::Missing, CellKey::Text),
                ColumnData::Missing(_) => CellKey::Missing,
            })
            .collect()
    }
}
