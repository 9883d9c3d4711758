//! CSV ingest.
//!
//! Turns a case-count table into clean `(x, y)` series ready to fit. The
//! expected shape is one header row, a day-index column (default `day`) and
//! one or more count columns, e.g.:
//!
//! ```text
//! day,confirmed,deaths,intensive_care
//! 55,229,7,26
//! 56,322,10,23
//! ```
//!
//! Design goals:
//! - **Strict schema** for the requested columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad cells per column, but report what happened)
//! - **Separation of concerns**: no date parsing and no fitting logic here

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::warn;

use crate::domain::TimeSeries;
use crate::error::AppError;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub column: String,
    pub message: String,
}

/// Ingest output: one series per count column, plus row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub series: Vec<TimeSeries>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load series from a CSV file.
///
/// `columns` selects the count columns; empty means "every column except `x_column`".
pub fn load_series(path: &Path, x_column: &str, columns: &[String]) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_series(file, x_column, columns)
}

/// Read series from any CSV source.
pub fn read_series<R: Read>(source: R, x_column: &str, columns: &[String]) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let x_idx = find_column(&headers, x_column)?;
    let y_cols: Vec<(usize, String)> = if columns.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != x_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect()
    } else {
        columns
            .iter()
            .map(|c| find_column(&headers, c).map(|i| (i, c.clone())))
            .collect::<Result<_, _>>()?
    };
    if y_cols.is_empty() {
        return Err(AppError::new(2, "CSV has no count columns to fit."));
    }

    let mut xs: Vec<Vec<f64>> = vec![Vec::new(); y_cols.len()];
    let mut ys: Vec<Vec<f64>> = vec![Vec::new(); y_cols.len()];
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    column: String::new(),
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let x = match parse_cell(&record, x_idx) {
            Ok(v) => v,
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    column: x_column.to_string(),
                    message,
                });
                continue;
            }
        };

        for (k, (col_idx, name)) in y_cols.iter().enumerate() {
            match parse_cell(&record, *col_idx) {
                Ok(y) => {
                    xs[k].push(x);
                    ys[k].push(y);
                }
                Err(message) => row_errors.push(RowError {
                    line,
                    column: name.clone(),
                    message,
                }),
            }
        }
    }

    for e in &row_errors {
        warn!("skipped line {} column '{}': {}", e.line, e.column, e.message);
    }

    let series = y_cols
        .into_iter()
        .zip(xs.into_iter().zip(ys))
        .map(|((_, name), (x, y))| TimeSeries::new(name, x, y).map_err(AppError::from))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IngestedData {
        series,
        row_errors,
        rows_read,
    })
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, AppError> {
    let wanted = name.trim().to_ascii_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_ascii_lowercase() == wanted)
        .ok_or_else(|| {
            let available: Vec<&str> = headers.iter().collect();
            AppError::new(
                2,
                format!("Missing column '{name}'. Available: {}", available.join(", ")),
            )
        })
}

fn parse_cell(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = record.get(idx).unwrap_or("").trim();
    if raw.is_empty() {
        return Err("empty value".to_string());
    }
    let v: f64 = raw.parse().map_err(|_| format!("not a number: '{raw}'"))?;
    if !v.is_finite() {
        return Err(format!("non-finite value: '{raw}'"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "day,confirmed,intensive_care\n\
                       55,229,26\n\
                       56,322,\n\
                       57,400,35\n\
                       x,1,2\n\
                       59,888,56\n";

    #[test]
    fn reads_every_count_column_by_default() {
        let data = read_series(CSV.as_bytes(), "day", &[]).unwrap();
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.series.len(), 2);

        let confirmed = &data.series[0];
        assert_eq!(confirmed.name, "confirmed");
        assert_eq!(confirmed.x, vec![55.0, 56.0, 57.0, 59.0]);

        let icu = &data.series[1];
        assert_eq!(icu.x, vec![55.0, 57.0, 59.0]);
        assert_eq!(icu.y, vec![26.0, 35.0, 56.0]);

        // Bad day on line 5, empty cell on line 3.
        assert_eq!(data.row_errors.len(), 2);
        assert!(data.row_errors.iter().any(|e| e.line == 5 && e.column == "day"));
        assert!(data.row_errors.iter().any(|e| e.line == 3 && e.column == "intensive_care"));
    }

    #[test]
    fn selects_requested_columns_case_insensitively() {
        let data = read_series(CSV.as_bytes(), "DAY", &["Intensive_Care".to_string()]).unwrap();
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.series[0].y.len(), 3);
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let err = read_series(CSV.as_bytes(), "day", &["deaths".to_string()]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Missing column 'deaths'"));
    }
}
