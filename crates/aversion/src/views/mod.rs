//! Page views.
//!
//! Each page is a pure function from a [`Dataset`](crate::Dataset) and an
//! [`AssetSelection`](crate::AssetSelection) to a page model. A model renders
//! itself as text, Markdown or JSON; nothing here touches the terminal.

pub mod diagnostics;
pub mod downloads;
pub mod gammas;
pub mod heatmap;
pub mod sources;
pub mod summary;
pub mod volatility;

pub use diagnostics::{DiagnosticsPage, PersistenceCount, TestRejections};
pub use downloads::{DownloadsPage, ExportTarget};
pub use gammas::GammaTable;
pub use heatmap::{CorrelationMatrix, HeatmapPage, MonthlySigma};
pub use sources::SourcesPage;
pub use summary::SummaryPage;
pub use volatility::{AssetVolatility, Observation, SeriesLayout, VolatilityPage, VolatilitySeries};

use crate::error::Result;
use aversion_data::{CanonicalField, has_column};
use polars::prelude::*;

/// A page that can be shown on the terminal or serialized.
pub trait PageView {
    /// Page identifier, also used as the report name.
    fn name(&self) -> &'static str;

    /// Plain-text rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cell cannot be read.
    fn to_text(&self) -> Result<String>;

    /// Markdown rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cell cannot be read.
    fn to_markdown(&self) -> Result<String>;

    /// JSON model of the page.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cell cannot be read.
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Values of a column as f64, nulls preserved.
pub(crate) fn f64_values(frame: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(column.as_materialized_series().f64()?.into_iter().collect())
}

/// Values of a column as strings, nulls preserved.
pub(crate) fn str_values(frame: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = frame.column(name)?.cast(&DataType::String)?;
    Ok(column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Canonical gamma columns present in `frame`, in schema order.
pub(crate) fn present_gammas(frame: &DataFrame) -> Vec<CanonicalField> {
    CanonicalField::gammas()
        .into_iter()
        .filter(|f| has_column(frame, f.name()))
        .collect()
}

/// Canonical volatility columns present in `frame`, in schema order.
pub(crate) fn present_volatilities(frame: &DataFrame) -> Vec<CanonicalField> {
    CanonicalField::volatilities()
        .into_iter()
        .filter(|f| has_column(frame, f.name()))
        .collect()
}
