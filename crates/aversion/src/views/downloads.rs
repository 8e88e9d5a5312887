//! Downloads: data directory listing and raw table exports.

use super::PageView;
use crate::dataset::Dataset;
use crate::error::{DashboardError, Result};
use aversion_data::CsvLoader;
use aversion_output::{ExportFormat, Exporter, TableExport};
use polars::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the exported master table.
pub const MASTER_EXPORT: &str = "resultados_completos_tablero.csv";

/// File name of the exported diagnostics table.
pub const TESTS_EXPORT: &str = "garch_tests.csv";

/// A table offered for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTarget {
    /// File name written on export
    pub file_name: String,
    /// Row count
    pub rows: usize,
    /// Column count
    pub columns: usize,
}

impl ExportTarget {
    fn of(file_name: &str, frame: &DataFrame) -> Self {
        Self {
            file_name: file_name.to_string(),
            rows: frame.height(),
            columns: frame.width(),
        }
    }
}

/// The downloads page.
///
/// Exports are raw views: the exclusion set and the selection do not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadsPage {
    /// Directory that was listed
    pub data_dir: String,
    /// Files in the data directory, sorted
    pub files: Vec<String>,
    /// Tables available for export
    pub targets: Vec<ExportTarget>,
    /// Set when the directory could not be listed
    pub message: Option<String>,
}

impl DownloadsPage {
    /// List the data directory and the exportable tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn build(dataset: &Dataset, loader: &CsvLoader) -> Result<Self> {
        let (files, message) = match loader.list_files() {
            Ok(files) => (files, None),
            Err(aversion_data::DataError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                warn!(data_dir = %loader.data_dir().display(), "data directory not found");
                (
                    Vec::new(),
                    Some(format!(
                        "Data directory {} does not exist.",
                        loader.data_dir().display()
                    )),
                )
            }
            Err(e) => return Err(e.into()),
        };

        let mut targets = vec![ExportTarget::of(MASTER_EXPORT, dataset.master())];
        if let Some(tests) = dataset.tests() {
            targets.push(ExportTarget::of(TESTS_EXPORT, &tests.frame));
        }

        Ok(Self {
            data_dir: loader.data_dir().display().to_string(),
            files,
            targets,
            message,
        })
    }

    /// Write every export target into `out_dir`, creating it if needed.
    ///
    /// Returns the written paths. The export names are also source candidates,
    /// so `out_dir` must not be the dataset's data directory.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::DataDirWrite`] when `out_dir` resolves to the
    /// data directory, or an error if the directory cannot be created or a
    /// write fails.
    pub fn write_exports(dataset: &Dataset, out_dir: &Path, precision: usize) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let target = out_dir.canonicalize()?;
        if dataset
            .data_dir()
            .canonicalize()
            .is_ok_and(|data_dir| data_dir == target)
        {
            return Err(DashboardError::DataDirWrite(target));
        }

        let mut tables = vec![(MASTER_EXPORT, dataset.master())];
        if let Some(tests) = dataset.tests() {
            tables.push((TESTS_EXPORT, &tests.frame));
        }

        let mut written = Vec::with_capacity(tables.len());
        for (name, frame) in tables {
            let path = out_dir.join(name);
            TableExport::new(frame)
                .with_precision(precision)
                .export_to_file(&path, ExportFormat::Csv)?;
            info!(file = %path.display(), rows = frame.height(), "exported table");
            written.push(path);
        }
        Ok(written)
    }
}

impl PageView for DownloadsPage {
    fn name(&self) -> &'static str {
        "downloads"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = format!("\nFiles in {}\n", self.data_dir);
        output.push_str(&"=".repeat(48));
        output.push('\n');
        if let Some(message) = &self.message {
            output.push_str(&format!("{message}\n"));
        }
        for file in &self.files {
            output.push_str(&format!("  - {file}\n"));
        }

        output.push_str("\nExports\n");
        output.push_str(&"-".repeat(48));
        output.push('\n');
        for t in &self.targets {
            output.push_str(&format!(
                "  {:<36} {:>5} rows\n",
                t.file_name, t.rows
            ));
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = format!("## Files in `{}`\n\n", self.data_dir);
        if let Some(message) = &self.message {
            output.push_str(&format!("> {message}\n\n"));
        }
        for file in &self.files {
            output.push_str(&format!("- {file}\n"));
        }
        output.push_str("\n## Exports\n\n| File | Rows | Columns |\n|------|------|---------|\n");
        for t in &self.targets {
            output.push_str(&format!("| {} | {} | {} |\n", t.file_name, t.rows, t.columns));
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(json!(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use aversion_data::LoadCache;
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn test_listing_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tablero_final.csv"),
            "Activo,CRRA\nTRM,0.123456789\nISA,2.0\n",
        )
        .unwrap();
        fs::write(dir.path().join("garch_tests.csv"), "Activo,ADF_p\nISA,0.01\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let loader = CsvLoader::new(dir.path(), Arc::new(LoadCache::new()));
        let dataset = Dataset::load(&DashboardConfig::default(), &loader).unwrap();
        let page = DownloadsPage::build(&dataset, &loader).unwrap();

        assert_eq!(page.files, vec!["garch_tests.csv", "notes.txt", "tablero_final.csv"]);
        assert_eq!(page.targets.len(), 2);
        // raw view keeps excluded entities
        assert_eq!(page.targets[0].rows, 2);

        let out = dir.path().join("out");
        let written = DownloadsPage::write_exports(&dataset, &out, 4).unwrap();
        assert_eq!(written.len(), 2);
        let master = fs::read_to_string(out.join(MASTER_EXPORT)).unwrap();
        assert_eq!(master, "entity_id,gamma_crra\nTRM,0.1235\nISA,2\n");
    }

    #[test]
    fn test_exports_refuse_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let partial = "Activo,CRRA\nISA,2.0\n";
        fs::write(dir.path().join("resultados_CRRA.csv"), partial).unwrap();

        let loader = CsvLoader::new(dir.path(), Arc::new(LoadCache::new()));
        let dataset = Dataset::load(&DashboardConfig::default(), &loader).unwrap();

        let result = DownloadsPage::write_exports(&dataset, dir.path(), 6);
        assert!(matches!(result, Err(DashboardError::DataDirWrite(_))));
        // same directory reached through a relative segment
        let dotted = dir.path().join("sub").join("..");
        fs::create_dir(dir.path().join("sub")).unwrap();
        let result = DownloadsPage::write_exports(&dataset, &dotted, 6);
        assert!(matches!(result, Err(DashboardError::DataDirWrite(_))));

        assert!(!dir.path().join(MASTER_EXPORT).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("resultados_CRRA.csv")).unwrap(),
            partial
        );
    }

    #[test]
    fn test_missing_directory_is_a_message() {
        let dir = tempfile::tempdir().unwrap();
        let loader = CsvLoader::new(dir.path().join("nope"), Arc::new(LoadCache::new()));
        let dataset = Dataset::load(&DashboardConfig::default(), &loader).unwrap();

        let page = DownloadsPage::build(&dataset, &loader).unwrap();
        assert!(page.files.is_empty());
        assert!(page.message.is_some());
        assert_eq!(page.targets.len(), 1);
        assert!(page.to_markdown().unwrap().contains("does not exist"));
    }
}
