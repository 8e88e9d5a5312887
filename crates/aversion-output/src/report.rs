//! JSON page reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The builder was finished without a page name.
    #[error("Report has no page name")]
    MissingPage,
}

/// One rendered dashboard page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Page the report was produced for.
    pub page: String,

    /// Data directory the page was read from.
    pub data_dir: String,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Report contents (JSON format).
    pub contents: serde_json::Value,
}

impl Report {
    /// Create a new report.
    pub fn new(page: String, data_dir: String, contents: serde_json::Value) -> Self {
        Self {
            page,
            data_dir,
            timestamp: Utc::now(),
            contents,
        }
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    page: Option<String>,
    data_dir: Option<String>,
    contents: Option<serde_json::Value>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page name.
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, dir: &Path) -> Self {
        self.data_dir = Some(dir.display().to_string());
        self
    }

    /// Set the report contents from any serializable page model.
    pub fn contents<T: Serialize>(mut self, contents: &T) -> Result<Self, ReportError> {
        self.contents = Some(serde_json::to_value(contents)?);
        Ok(self)
    }

    /// Build the report.
    pub fn build(self) -> Result<Report, ReportError> {
        Ok(Report::new(
            self.page.ok_or(ReportError::MissingPage)?,
            self.data_dir.unwrap_or_default(),
            self.contents.unwrap_or(serde_json::Value::Null),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = Report::new(
            "summary".to_string(),
            "data".to_string(),
            serde_json::json!({"test": "data"}),
        );

        assert_eq!(report.page, "summary");
        assert_eq!(report.data_dir, "data");
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .page("gammas")
            .data_dir(Path::new("results"))
            .contents(&serde_json::json!({"key": "value"}))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(report.page, "gammas");
        assert_eq!(report.data_dir, "results");
        assert_eq!(report.contents["key"], "value");

        let json = report.to_json().unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back.page, "gammas");
    }

    #[test]
    fn test_builder_requires_page() {
        assert!(matches!(
            ReportBuilder::new().build(),
            Err(ReportError::MissingPage)
        ));
    }
}
