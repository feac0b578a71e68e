//! Bulk KPI row import
//!
//! Rows arrive as a header plus string fields (from a spreadsheet export).
//! `EmployeeName` is required; known metric columns are range-checked and
//! unknown columns are ignored. Any invalid row rejects the whole import so
//! a half-applied sheet never reaches storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EMPLOYEE_COLUMN: &str = "EmployeeName";

/// Columns holding a percentage, accepted in 0..=100
pub const PERCENT_COLUMNS: [&str; 4] = ["ProductivityRate", "PrebookRate", "RetailRate", "RebookRate"];

/// Columns holding a 1..=10 rating
pub const SCORE_COLUMNS: [&str; 2] = ["ClientSatisfaction", "TeamworkScore"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("missing required column {0}")]
    MissingColumn(&'static str),
    #[error("row {row}: expected {expected} fields, found {found}")]
    FieldCount { row: usize, expected: usize, found: usize },
    #[error("row {row}: {column} is empty")]
    EmptyField { row: usize, column: String },
    #[error("row {row}: {column} value '{value}' is not a number")]
    NotANumber { row: usize, column: String, value: String },
    #[error("row {row}: {column} value {value} is outside {min}..={max}")]
    OutOfRange {
        row: usize,
        column: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// One validated employee row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiRow {
    pub employee_name: String,
    /// Metric column name to value; blank cells are omitted
    pub metrics: BTreeMap<String, f64>,
}

impl KpiRow {
    pub fn metric(&self, column: &str) -> Option<f64> {
        self.metrics.get(column).copied()
    }

    /// Convert one data row; `row` is the 1-based data row number used in errors
    pub fn from_fields(headers: &[&str], fields: &[&str], row: usize) -> Result<Self, ImportError> {
        if fields.len() != headers.len() {
            return Err(ImportError::FieldCount {
                row,
                expected: headers.len(),
                found: fields.len(),
            });
        }

        let mut employee_name = None;
        let mut metrics = BTreeMap::new();
        for (&column, &raw) in headers.iter().zip(fields) {
            let raw = raw.trim();
            if column == EMPLOYEE_COLUMN {
                if raw.is_empty() {
                    return Err(ImportError::EmptyField {
                        row,
                        column: column.to_string(),
                    });
                }
                employee_name = Some(raw.to_string());
                continue;
            }

            let Some((min, max)) = column_range(column) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let value: f64 = raw.parse().map_err(|_| ImportError::NotANumber {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })?;
            if !(min..=max).contains(&value) {
                return Err(ImportError::OutOfRange {
                    row,
                    column: column.to_string(),
                    value,
                    min,
                    max,
                });
            }
            metrics.insert(column.to_string(), value);
        }

        let employee_name = employee_name.ok_or(ImportError::MissingColumn(EMPLOYEE_COLUMN))?;
        Ok(Self { employee_name, metrics })
    }
}

fn column_range(column: &str) -> Option<(f64, f64)> {
    if PERCENT_COLUMNS.contains(&column) {
        Some((0.0, 100.0))
    } else if SCORE_COLUMNS.contains(&column) {
        Some((1.0, 10.0))
    } else {
        None
    }
}

/// Convert every row, collecting all errors instead of stopping at the first
pub fn validate_rows(headers: &[&str], rows: &[Vec<&str>]) -> Result<Vec<KpiRow>, Vec<ImportError>> {
    if !headers.contains(&EMPLOYEE_COLUMN) {
        return Err(vec![ImportError::MissingColumn(EMPLOYEE_COLUMN)]);
    }

    let mut parsed = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (i, fields) in rows.iter().enumerate() {
        match KpiRow::from_fields(headers, fields, i + 1) {
            Ok(row) => parsed.push(row),
            Err(err) => errors.push(err),
        }
    }

    if errors.is_empty() { Ok(parsed) } else { Err(errors) }
}

/// Plain comma-separated text: first line is the header, blank lines are
/// skipped. Quoted fields are not supported.
pub fn parse_delimited(text: &str) -> Result<Vec<KpiRow>, Vec<ImportError>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Err(vec![ImportError::MissingColumn(EMPLOYEE_COLUMN)]);
    };

    let headers: Vec<&str> = header_line.split(',').map(str::trim).collect();
    let rows: Vec<Vec<&str>> = lines.map(|line| line.split(',').collect()).collect();
    validate_rows(&headers, &rows)
}
