//! Error types for data operations.

use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
///
/// Missing and malformed source files are not errors: the loader absorbs them and
/// moves on to the next candidate. These variants cover the conditions that a
/// caller has to see.
#[derive(Debug, Error)]
pub enum DataError {
    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A table has no column that can serve as the entity key
    #[error("No entity key column found in {table}")]
    MissingKey {
        /// Name of the table that was inspected
        table: String,
    },
}
