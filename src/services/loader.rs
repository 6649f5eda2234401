use std::collections::HashSet;
use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_from_rs, Data, DataType as _, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rayon::prelude::*;

use super::table::{Column, Table};
use crate::error::AppError;

/// Supported upload formats, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Csv,
    Xlsx,
}

impl UploadFormat {
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(UploadFormat::Csv)
        } else if lower.ends_with(".xlsx") {
            Ok(UploadFormat::Xlsx)
        } else {
            Err(AppError::InvalidInput("Only CSV or XLSX files are supported".to_string()))
        }
    }
}

pub fn load_upload(filename: &str, data: Bytes) -> Result<Table, AppError> {
    match UploadFormat::from_filename(filename)? {
        UploadFormat::Csv => table_from_csv(data),
        UploadFormat::Xlsx => table_from_xlsx(data),
    }
}

/// Header names as given, with blanks named by position and repeats
/// suffixed `_1`, `_2`, ...
fn unique_header(name: &str, index: usize, existing: &mut HashSet<String>) -> String {
    let trimmed = name.trim();
    let base = if trimmed.is_empty() {
        format!("column_{}", index + 1)
    } else {
        trimmed.to_string()
    };

    let mut candidate = base.clone();
    let mut counter = 1;
    while !existing.insert(candidate.clone()) {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }
    candidate
}

pub fn table_from_csv(data: Bytes) -> Result<Table, AppError> {
    tracing::info!("Parsing CSV upload ({} bytes)", data.len());

    let df = CsvReader::new(Cursor::new(data.to_vec()))
        .has_header(true)
        .infer_schema(Some(100))
        .finish()
        .map_err(|e| AppError::FileProcessingError(format!("Failed to parse CSV: {}", e)))?;

    let table = table_from_dataframe(&df)?;
    tracing::info!("Loaded CSV with {} rows and {} columns", table.row_count(), table.column_count());
    Ok(table)
}

fn table_from_dataframe(df: &DataFrame) -> Result<Table, AppError> {
    let polars_err = |e: PolarsError| AppError::FileProcessingError(format!("Failed to read column: {}", e));
    let mut existing = HashSet::new();
    let mut columns = Vec::with_capacity(df.width());

    for (index, series) in df.get_columns().iter().enumerate() {
        let name = unique_header(series.name(), index, &mut existing);
        let column = match series.dtype() {
            DataType::Null => Column::missing(name, series.len()),
            dtype if dtype.is_numeric() => {
                let cast = series.cast(&DataType::Float64).map_err(polars_err)?;
                let values = cast.f64().map_err(polars_err)?.into_iter().collect();
                Column::numeric(name, values)
            }
            _ => {
                let cast = series.cast(&DataType::String).map_err(polars_err)?;
                let values = cast
                    .str()
                    .map_err(polars_err)?
                    .into_iter()
                    .map(|v| v.filter(|s| !s.trim().is_empty()).map(str::to_string))
                    .collect();
                Column::text(name, values)
            }
        };
        tracing::debug!("Column {} read as {:?}", column.name(), column.kind());
        columns.push(column);
    }

    Ok(Table::new(columns)?)
}

/// Excel serial day numbers count from 1899-12-30.
fn excel_serial_to_date(serial: f64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let date = epoch.checked_add_signed(Duration::days(serial.floor() as i64))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn is_numeric_cell(value: &Data) -> bool {
    matches!(value, Data::Float(_) | Data::Int(_))
}

/// A sheet column is numeric when every non-empty cell holds a number.
fn detect_numeric(values: &[Data]) -> bool {
    let (numeric, filled) = values
        .par_iter()
        .filter(|v| !matches!(v, Data::Empty))
        .fold(|| (0usize, 0usize), |(num, filled), v| (num + is_numeric_cell(v) as usize, filled + 1))
        .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

    filled > 0 && numeric == filled
}

fn cell_text(value: &Data) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::DateTimeIso(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn table_from_xlsx(data: Bytes) -> Result<Table, AppError> {
    tracing::info!("Parsing XLSX upload ({} bytes)", data.len());

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e| AppError::FileProcessingError(format!("Failed to open Excel file: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::FileProcessingError("Workbook has no sheets".to_string()))?;
    tracing::info!("Reading sheet: {}", sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::FileProcessingError(format!("Failed to read sheet {}: {}", sheet_name, e)))?;

    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
    let Some(header_row) = rows.first() else {
        return Err(AppError::FileProcessingError(format!("Sheet {} is empty", sheet_name)));
    };

    let mut existing = HashSet::new();
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, cell)| unique_header(&cell.to_string(), i, &mut existing))
        .collect();

    let columns = headers
        .into_iter()
        .enumerate()
        .map(|(col_idx, header)| {
            let values: Vec<Data> = rows
                .iter()
                .skip(1)
                .map(|row| row.get(col_idx).cloned().unwrap_or(Data::Empty))
                .collect();

            if detect_numeric(&values) {
                Column::numeric(header, values.iter().map(|v| v.as_f64()).collect())
            } else {
                Column::text(header, values.iter().map(cell_text).collect())
            }
        })
        .collect();

    let table = Table::new(columns)?;
    tracing::info!("Loaded sheet {} with {} rows", sheet_name, table.row_count());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::table::{CellValue, ColumnKind};
    use tokio_test::assert_ok;

    fn csv(text: &str) -> Bytes {
        Bytes::from(text.to_string())
    }

    #[test]
    fn test_csv_types_and_gaps() {
        let table = assert_ok!(table_from_csv(csv(
            "product,price,date\nMouse,10.5,2025-01-02\nLaptop,,2025-02-03\n,99,2025-02-04\n"
        )));
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.headers(), vec!["product", "price", "date"]);
        assert_eq!(table.column("price").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(table.column("price").unwrap().missing_count(), 1);
        assert_eq!(table.column("product").unwrap().kind(), ColumnKind::Text);
        assert!(table.column("product").unwrap().is_missing_at(2));
        assert_eq!(table.column("date").unwrap().cell(0), CellValue::Text("2025-01-02".into()));
    }

    #[test]
    fn test_csv_integers_become_numbers() {
        let table = assert_ok!(table_from_csv(csv("qty\n1\n2\n3\n")));
        assert_eq!(table.require_numeric("qty").unwrap(), &[Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_extension_dispatch() {
        assert_eq!(assert_ok!(UploadFormat::from_filename("Report.CSV")), UploadFormat::Csv);
        assert_eq!(assert_ok!(UploadFormat::from_filename("book.xlsx")), UploadFormat::Xlsx);
        assert!(matches!(
            load_upload("notes.txt", csv("a\n1\n")),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_workbook_is_a_processing_error() {
        assert!(matches!(
            table_from_xlsx(csv("not a zip archive")),
            Err(AppError::FileProcessingError(_))
        ));
    }

    #[test]
    fn test_unique_headers() {
        let mut existing = HashSet::new();
        assert_eq!(unique_header("price", 0, &mut existing), "price");
        assert_eq!(unique_header("price", 1, &mut existing), "price_1");
        assert_eq!(unique_header("  ", 2, &mut existing), "column_3");
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(excel_serial_to_date(45658.0).as_deref(), Some("2025-01-01"));
        assert!(!detect_numeric(&[Data::Empty]));
        assert!(detect_numeric(&[Data::Int(1), Data::Empty, Data::Float(2.5)]));
        assert!(!detect_numeric(&[Data::Int(1), Data::String("x".into())]));
    }
}
