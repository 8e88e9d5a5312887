//! Sources page: which files backed the dataset and what went wrong.

use super::PageView;
use crate::dataset::{Dataset, SourceStatus};
use crate::error::Result;
use aversion_data::{CacheStats, Diagnostic, MasterOrigin};
use serde::Serialize;
use serde_json::json;

/// Provenance of every source plus the reconciliation diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourcesPage {
    /// Data directory
    pub data_dir: String,
    /// Where the master table came from
    pub origin: MasterOrigin,
    /// Rows of the master table
    pub assets: usize,
    /// Identifiers kept out of risk views
    pub excluded: Vec<String>,
    /// One entry per source kind
    pub sources: Vec<SourceStatus>,
    /// Recoverable findings
    pub diagnostics: Vec<Diagnostic>,
    /// Load cache counters
    pub cache: CacheStats,
}

impl SourcesPage {
    /// Describe a loaded dataset.
    pub fn build(dataset: &Dataset, cache: CacheStats) -> Self {
        Self {
            data_dir: dataset.data_dir().display().to_string(),
            origin: dataset.master_origin().clone(),
            assets: dataset.master().height(),
            excluded: dataset.exclusion().ids().map(str::to_string).collect(),
            sources: dataset.sources().to_vec(),
            diagnostics: dataset.diagnostics().to_vec(),
            cache,
        }
    }

    fn origin_text(&self) -> String {
        match &self.origin {
            MasterOrigin::File(file) => format!("file {file}"),
            MasterOrigin::Merged(files) => format!("outer join of {}", files.join(", ")),
            MasterOrigin::Empty => "no result files, empty table".to_string(),
        }
    }
}

impl PageView for SourcesPage {
    fn name(&self) -> &'static str {
        "sources"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = format!("\nSources in {}\n", self.data_dir);
        output.push_str(&"=".repeat(72));
        output.push('\n');
        output.push_str(&format!("{:<14} {:<36} {:>8}\n", "Source", "File", "Rows"));
        output.push_str(&"-".repeat(72));
        output.push('\n');
        for s in &self.sources {
            output.push_str(&format!(
                "{:<14} {:<36} {:>8}\n",
                s.kind.to_string(),
                s.file.as_deref().unwrap_or("-"),
                s.rows
            ));
        }

        output.push_str(&format!(
            "\nMaster table: {} ({} assets)\n",
            self.origin_text(),
            self.assets
        ));
        output.push_str(&format!("Excluded from risk views: {}\n", self.excluded.join(", ")));

        if !self.diagnostics.is_empty() {
            output.push_str("\nDiagnostics:\n");
            for d in &self.diagnostics {
                output.push_str(&format!("  - {d}\n"));
            }
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = format!("## Sources in `{}`\n\n", self.data_dir);
        output.push_str("| Source | File | Rows |\n|--------|------|------|\n");
        for s in &self.sources {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                s.kind,
                s.file.as_deref().unwrap_or("-"),
                s.rows
            ));
        }
        output.push_str(&format!(
            "\n**Master table:** {} ({} assets)\n\n**Excluded:** {}\n",
            self.origin_text(),
            self.assets,
            self.excluded.join(", ")
        ));
        if !self.diagnostics.is_empty() {
            output.push_str("\n### Diagnostics\n\n");
            for d in &self.diagnostics {
                output.push_str(&format!("- {d}\n"));
            }
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
    use aversion_data::{CsvLoader, LoadCache, SourceKind};
    use std::fs;
    use std::sync::Arc;

    #[test]
    fn test_sources_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("gamma_CRRA.csv"), "Activo,CRRA\nISA,1.0\n").unwrap();
        fs::write(dir.path().join("gamma_FTP.csv"), "FTP\n2.0\n").unwrap();

        let cache = Arc::new(LoadCache::new());
        let loader = CsvLoader::new(dir.path(), Arc::clone(&cache));
        let dataset = Dataset::load(&DashboardConfig::default(), &loader).unwrap();
        let page = SourcesPage::build(&dataset, cache.stats());

        assert_eq!(page.sources.len(), SourceKind::all().len());
        assert_eq!(page.origin, MasterOrigin::Merged(vec!["gamma_CRRA.csv".to_string()]));
        assert_eq!(page.diagnostics.len(), 1);
        assert_eq!(page.cache.misses, 2);

        let text = page.to_text().unwrap();
        assert!(text.contains("outer join of gamma_CRRA.csv"));
        assert!(text.contains("gamma_FTP.csv: missing key column"));

        let json = page.to_json().unwrap();
        assert_eq!(json["origin"]["kind"], "merged");
    }
}
