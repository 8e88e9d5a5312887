//! Export functionality for displayed tables.
//!
//! A displayed table is written back out with exactly the columns and column
//! order it was shown with. The only transformation is float rounding to the
//! configured precision.

use polars::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Decimal places kept by default when exporting floats.
pub const DEFAULT_FLOAT_PRECISION: usize = 6;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error while reading cells.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// Output was not valid UTF-8.
    #[error("Invalid UTF-8 in output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidFormat`] for unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(format!(
                "unsupported export extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// A displayed table ready for export.
#[derive(Debug, Clone)]
pub struct TableExport<'a> {
    frame: &'a DataFrame,
    precision: usize,
}

impl<'a> TableExport<'a> {
    /// Wrap a frame with the default float precision.
    pub const fn new(frame: &'a DataFrame) -> Self {
        Self {
            frame,
            precision: DEFAULT_FLOAT_PRECISION,
        }
    }

    /// Set the number of decimals floats are rounded to.
    pub const fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Column names in display order.
    pub fn headers(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn to_csv(&self) -> Result<String, ExportError> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.write_record(self.headers())?;

        let columns = self.frame.get_columns();
        for row in 0..self.frame.height() {
            let mut record = Vec::with_capacity(columns.len());
            for column in columns {
                record.push(csv_cell(&column.get(row)?, self.precision));
            }
            wtr.write_record(&record)?;
        }

        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Rows as JSON objects keyed by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell cannot be read.
    pub fn to_json_rows(&self) -> Result<Vec<Value>, ExportError> {
        let headers = self.headers();
        let columns = self.frame.get_columns();
        let mut rows = Vec::with_capacity(self.frame.height());

        for row in 0..self.frame.height() {
            let mut object = Map::with_capacity(columns.len());
            for (name, column) in headers.iter().zip(columns) {
                object.insert(name.clone(), json_cell(&column.get(row)?, self.precision));
            }
            rows.push(Value::Object(object));
        }

        Ok(rows)
    }
}

impl Exporter for TableExport<'_> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Json => Ok(serde_json::to_string(&self.to_json_rows()?)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&self.to_json_rows()?)?),
        }
    }
}

/// A list of typed records, exported one row per record.
#[derive(Debug, Clone)]
pub struct RecordsExport<'a, T> {
    records: &'a [T],
}

impl<'a, T: Serialize> RecordsExport<'a, T> {
    /// Wrap a record slice.
    pub const fn new(records: &'a [T]) -> Self {
        Self { records }
    }
}

impl<T: Serialize> Exporter for RecordsExport<'_, T> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for record in self.records {
                    wtr.serialize(record)?;
                }
                let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
                Ok(String::from_utf8(bytes)?)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self.records)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self.records)?),
        }
    }
}

/// Round to `precision` decimals.
pub fn round_to(value: f64, precision: usize) -> f64 {
    let factor = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX).min(15));
    (value * factor).round() / factor
}

/// Format a cell for CSV. Nulls become empty fields.
pub fn csv_cell(value: &AnyValue<'_>, precision: usize) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Float64(v) => float_cell(*v, precision),
        AnyValue::Float32(v) => float_cell(f64::from(*v), precision),
        AnyValue::String(s) => (*s).to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn float_cell(v: f64, precision: usize) -> String {
    if v.is_finite() {
        round_to(v, precision).to_string()
    } else {
        v.to_string()
    }
}

fn json_cell(value: &AnyValue<'_>, precision: usize) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Float64(v) => float_json(*v, precision),
        AnyValue::Float32(v) => float_json(f64::from(*v), precision),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::String(s) => Value::String((*s).to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn float_json(v: f64, precision: usize) -> Value {
    serde_json::Number::from_f64(round_to(v, precision)).map_or(Value::Null, Value::Number)
}
