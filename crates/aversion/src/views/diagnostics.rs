//! GARCH diagnostics: assumption tests per asset.

use super::{PageView, f64_values};
use crate::assets::{AssetFilter, AssetSelection, ExclusionSet};
use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use aversion_data::{DiagnosticField, NamedFrame, has_column};
use aversion_output::{ExportFormat, Exporter, RecordsExport, TableExport, TableView};
use polars::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Default file name for the exported diagnostics table.
pub const EXPORT_FILE_NAME: &str = "garch_tests_export.csv";

const NO_TESTS: &str = "No diagnostics file found (garch_supuestos.csv). \
     Export the GARCH assumption tests from the estimation notebook to see them here.";

/// How many assets reject one test's null hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestRejections {
    /// Column holding the p-values
    pub test: String,
    /// Assets with p below the significance level
    pub rejected: usize,
    /// Assets with a p-value at all
    pub tested: usize,
}

/// Assets whose GARCH persistence stays below one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistenceCount {
    /// Assets with alpha + beta < 1
    pub stationary: usize,
    /// Assets with an alpha + beta value
    pub tested: usize,
}

/// The diagnostics page.
#[derive(Debug, Clone)]
pub struct DiagnosticsPage {
    source: Option<String>,
    table: Option<DataFrame>,
    significance: f64,
    rejections: Vec<TestRejections>,
    persistence: Option<PersistenceCount>,
}

impl DiagnosticsPage {
    /// Build the page from the dataset's diagnostics table.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn build(dataset: &Dataset, selection: &AssetSelection, significance: f64) -> Result<Self> {
        Self::from_table(dataset.tests(), dataset.exclusion(), selection, significance)
    }

    /// Build the page from a reconciled diagnostics table.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn from_table(
        tests: Option<&NamedFrame>,
        exclusion: &ExclusionSet,
        selection: &AssetSelection,
        significance: f64,
    ) -> Result<Self> {
        let Some(tests) = tests else {
            return Ok(Self {
                source: None,
                table: None,
                significance,
                rejections: Vec::new(),
                persistence: None,
            });
        };

        let table = selection.apply(&exclusion.apply(&tests.frame)?)?;

        let mut rejections = Vec::new();
        let mut persistence = None;
        for field in DiagnosticField::all() {
            if !has_column(&table, field.name()) {
                continue;
            }
            let values: Vec<f64> = f64_values(&table, field.name())?
                .into_iter()
                .flatten()
                .filter(|v| v.is_finite())
                .collect();

            if field.is_p_value() {
                rejections.push(TestRejections {
                    test: field.name().to_string(),
                    rejected: values.iter().filter(|p| **p < significance).count(),
                    tested: values.len(),
                });
            } else {
                persistence = Some(PersistenceCount {
                    stationary: values.iter().filter(|ab| **ab < 1.0).count(),
                    tested: values.len(),
                });
            }
        }

        Ok(Self {
            source: Some(tests.name.clone()),
            table: Some(table),
            significance,
            rejections,
            persistence,
        })
    }

    /// File the table came from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// The displayed table, exclusions applied.
    pub const fn table(&self) -> Option<&DataFrame> {
        self.table.as_ref()
    }

    /// Significance level used for rejections.
    pub const fn significance(&self) -> f64 {
        self.significance
    }

    /// Rejection counts per p-value column.
    pub fn rejections(&self) -> &[TestRejections] {
        &self.rejections
    }

    /// Persistence count, when an alpha + beta column exists.
    pub const fn persistence(&self) -> Option<PersistenceCount> {
        self.persistence
    }

    /// Write the displayed table; the format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error when there is no table, for an unknown extension, or on
    /// a failed write.
    pub fn export(&self, path: &Path, precision: usize) -> Result<()> {
        let table = self.table.as_ref().ok_or_else(|| {
            DashboardError::NoData("no diagnostics table to export".to_string())
        })?;
        let format = ExportFormat::from_path(path)?;
        TableExport::new(table)
            .with_precision(precision)
            .export_to_file(path, format)?;
        info!(file = %path.display(), rows = table.height(), "exported diagnostics table");
        Ok(())
    }

    /// Write the rejection counts; the format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown extension or a failed write.
    pub fn export_rejections(&self, path: &Path) -> Result<()> {
        let format = ExportFormat::from_path(path)?;
        RecordsExport::new(&self.rejections).export_to_file(path, format)?;
        info!(file = %path.display(), "exported rejection counts");
        Ok(())
    }

    fn counts_text(&self) -> String {
        let mut output = format!(
            "\nTests rejected at {:.0}% significance:\n",
            self.significance * 100.0
        );
        for r in &self.rejections {
            output.push_str(&format!("  {:<20} {:>4} of {:<4}\n", r.test, r.rejected, r.tested));
        }
        if let Some(p) = self.persistence {
            output.push_str(&format!(
                "  {:<20} {:>4} of {:<4} (alpha + beta < 1)\n",
                "alpha_beta", p.stationary, p.tested
            ));
        }
        output
    }
}

impl PageView for DiagnosticsPage {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn to_text(&self) -> Result<String> {
        let Some(table) = &self.table else {
            return Ok(format!("\n{NO_TESTS}\n"));
        };
        let title = format!("GARCH diagnostics ({})", self.source().unwrap_or_default());
        let mut output = TableView::new(title, table).to_ascii_table()?;
        output.push_str(&self.counts_text());
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let Some(table) = &self.table else {
            return Ok(format!("> {NO_TESTS}\n"));
        };
        let title = format!("GARCH diagnostics ({})", self.source().unwrap_or_default());
        let mut output = TableView::new(title, table).to_markdown()?;
        output.push('\n');
        output.push_str("| test | rejected | tested |\n|---|---|---|\n");
        for r in &self.rejections {
            output.push_str(&format!("| {} | {} | {} |\n", r.test, r.rejected, r.tested));
        }
        if let Some(p) = self.persistence {
            output.push_str(&format!(
                "\n**alpha + beta < 1:** {} of {}\n",
                p.stationary, p.tested
            ));
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        let rows = match &self.table {
            Some(t) => Some(TableExport::new(t).to_json_rows()?),
            None => None,
        };
        Ok(json!({
            "source": self.source,
            "significance": self.significance,
            "rejections": self.rejections,
            "persistence": self.persistence,
            "rows": rows,
            "message": self.table.is_none().then_some(NO_TESTS),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tests_table() -> NamedFrame {
        NamedFrame::new(
            "garch_supuestos.csv",
            df!(
                "entity_id" => ["ECOPETROL", "ISA", "NUTRESA", "TRM"],
                "adf_p" => [Some(0.01), Some(0.20), None, Some(0.0)],
                "arch_lm_p" => [0.03, 0.04, 0.5, 0.0],
                "alpha_beta" => [0.95, 1.02, 0.99, 0.5],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_counts_with_exclusion() {
        let table = tests_table();
        let page = DiagnosticsPage::from_table(
            Some(&table),
            &ExclusionSet::default(),
            &AssetSelection::all(),
            0.05,
        )
        .unwrap();

        assert_eq!(page.table().unwrap().height(), 3);
        assert_eq!(
            page.rejections(),
            [
                TestRejections {
                    test: "adf_p".to_string(),
                    rejected: 1,
                    tested: 2,
                },
                TestRejections {
                    test: "arch_lm_p".to_string(),
                    rejected: 2,
                    tested: 3,
                },
            ]
        );
        assert_eq!(
            page.persistence(),
            Some(PersistenceCount {
                stationary: 2,
                tested: 3
            })
        );
    }

    #[test]
    fn test_significance_level_changes_counts() {
        let table = tests_table();
        let page = DiagnosticsPage::from_table(
            Some(&table),
            &ExclusionSet::default(),
            &AssetSelection::all(),
            0.25,
        )
        .unwrap();
        assert_eq!(page.rejections()[0].rejected, 2);
        assert_eq!(page.rejections()[1].rejected, 2);
    }

    #[test]
    fn test_missing_table() {
        let page = DiagnosticsPage::from_table(
            None,
            &ExclusionSet::default(),
            &AssetSelection::all(),
            0.05,
        )
        .unwrap();
        assert!(page.table().is_none());
        assert!(page.to_text().unwrap().contains("No diagnostics file found"));
        assert_eq!(page.to_json().unwrap()["rows"], serde_json::Value::Null);

        let dir = tempfile::tempdir().unwrap();
        assert!(page.export(&dir.path().join("x.csv"), 6).is_err());
    }

    #[test]
    fn test_rendering_and_export() {
        let table = tests_table();
        let page = DiagnosticsPage::from_table(
            Some(&table),
            &ExclusionSet::empty(),
            &AssetSelection::parse_list("ISA"),
            0.05,
        )
        .unwrap();

        let text = page.to_text().unwrap();
        assert!(text.contains("GARCH diagnostics (garch_supuestos.csv)"));
        assert!(text.contains("Tests rejected at 5% significance"));

        let md = page.to_markdown().unwrap();
        assert!(md.contains("| test | rejected | tested |\n|---|---|---|\n"));
        assert!(md.contains("| arch_lm_p | 1 | 1 |"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_FILE_NAME);
        page.export(&path, 6).unwrap();
        let back = aversion_data::read_csv(&path).unwrap();
        assert_eq!(back.height(), 1);
        assert_eq!(back.width(), 4);

        let counts = dir.path().join("rejections.csv");
        page.export_rejections(&counts).unwrap();
        assert_eq!(
            std::fs::read_to_string(counts).unwrap(),
            "test,rejected,tested\nadf_p,0,1\narch_lm_p,1,1\n"
        );
    }
}
