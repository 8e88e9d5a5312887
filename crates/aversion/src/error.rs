//! Error types for the dashboard core.

use thiserror::Error;

/// Errors raised while building pages.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Data layer error
    #[error(transparent)]
    Data(#[from] aversion_data::DataError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Export error
    #[error(transparent)]
    Export(#[from] aversion_output::ExportError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A page needs a table that no source provided
    #[error("No data available: {0}")]
    NoData(String),

    /// An export would write into the directory the sources are read from
    #[error("Refusing to write exports into the data directory {}", .0.display())]
    DataDirWrite(std::path::PathBuf),

    /// A computation got fewer inputs than it needs
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;
