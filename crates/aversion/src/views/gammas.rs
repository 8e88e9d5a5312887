//! Aversion by asset: gamma estimates side by side.

use super::{PageView, present_gammas, present_volatilities};
use crate::assets::{AssetFilter, AssetSelection};
use crate::dataset::Dataset;
use crate::error::Result;
use aversion_data::{CanonicalField, has_column};
use aversion_output::{ExportFormat, Exporter, TableExport, TableView};
use polars::prelude::*;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Default file name for the exported table.
pub const EXPORT_FILE_NAME: &str = "gamma_por_activo.csv";

const NO_GAMMAS: &str =
    "No gamma columns found in the result files. Check the files in the data directory.";

/// `entity_id`, the gamma columns and the volatility columns of the selection.
#[derive(Debug, Clone)]
pub struct GammaTable {
    frame: DataFrame,
    methods: Vec<String>,
}

impl GammaTable {
    /// Build the table from the dataset's risk view.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering or selecting.
    pub fn build(dataset: &Dataset, selection: &AssetSelection) -> Result<Self> {
        Self::from_frame(&dataset.risk_view()?, selection)
    }

    /// Build the table from an already filtered risk view.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering or selecting.
    pub fn from_frame(risk: &DataFrame, selection: &AssetSelection) -> Result<Self> {
        let selected = selection.apply(risk)?;
        let gammas = present_gammas(&selected);

        let key = CanonicalField::EntityId.name();
        let columns: Vec<&str> = has_column(&selected, key)
            .then_some(key)
            .into_iter()
            .chain(gammas.iter().map(CanonicalField::name))
            .chain(present_volatilities(&selected).iter().map(CanonicalField::name))
            .collect();

        Ok(Self {
            frame: selected.select(columns)?,
            methods: gammas
                .iter()
                .filter_map(CanonicalField::method_label)
                .map(str::to_string)
                .collect(),
        })
    }

    /// The displayed table.
    pub const fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Method labels with a gamma column, in display order.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Message shown when no gamma column exists.
    pub fn warning(&self) -> Option<&'static str> {
        self.methods.is_empty().then_some(NO_GAMMAS)
    }

    /// Write the displayed table; the format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown extension or a failed write.
    pub fn export(&self, path: &Path, precision: usize) -> Result<()> {
        let format = ExportFormat::from_path(path)?;
        TableExport::new(&self.frame)
            .with_precision(precision)
            .export_to_file(path, format)?;
        info!(file = %path.display(), rows = self.frame.height(), "exported gamma table");
        Ok(())
    }
}

impl PageView for GammaTable {
    fn name(&self) -> &'static str {
        "gammas"
    }

    fn to_text(&self) -> Result<String> {
        let mut output = TableView::new("Risk aversion by asset", &self.frame).to_ascii_table()?;
        if let Some(warning) = self.warning() {
            output.push_str(&format!("\nWarning: {warning}\n"));
        }
        Ok(output)
    }

    fn to_markdown(&self) -> Result<String> {
        let mut output = TableView::new("Risk aversion by asset", &self.frame).to_markdown()?;
        if let Some(warning) = self.warning() {
            output.push_str(&format!("\n> **Warning:** {warning}\n"));
        }
        Ok(output)
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(json!({
            "methods": self.methods,
            "warning": self.warning(),
            "rows": TableExport::new(&self.frame).to_json_rows()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(frame: &DataFrame) -> Vec<String> {
        frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    #[test]
    fn test_display_columns_in_canonical_order() {
        let risk = df!(
            "entity_id" => ["ECOPETROL", "ISA"],
            "vol_hist" => [0.2, 0.3],
            "gamma_garch" => [3.0, 4.0],
            "extra" => ["a", "b"],
            "gamma_crra" => [1.0, 2.0],
        )
        .unwrap();

        let table = GammaTable::from_frame(&risk, &AssetSelection::all()).unwrap();
        assert_eq!(
            columns(table.frame()),
            vec!["entity_id", "gamma_crra", "gamma_garch", "vol_hist"]
        );
        assert_eq!(table.methods(), ["CRRA", "GARCH"]);
        assert!(table.warning().is_none());
    }

    #[test]
    fn test_selection_restricts_rows() {
        let risk = df!(
            "entity_id" => ["ECOPETROL", "ISA"],
            "gamma_ftp" => [1.0, 2.0],
        )
        .unwrap();

        let table = GammaTable::from_frame(&risk, &AssetSelection::parse_list("ISA")).unwrap();
        assert_eq!(table.frame().height(), 1);
    }

    #[test]
    fn test_warning_without_gammas() {
        let risk = df!("entity_id" => ["ECOPETROL"], "vol_garch" => [0.1]).unwrap();
        let table = GammaTable::from_frame(&risk, &AssetSelection::all()).unwrap();

        assert!(table.warning().is_some());
        assert!(table.to_text().unwrap().contains("Warning:"));
        assert_eq!(table.to_json().unwrap()["methods"], json!([]));
    }

    #[test]
    fn test_export_round_trip() {
        let risk = df!(
            "entity_id" => ["ECOPETROL", "ISA"],
            "gamma_crra" => [Some(1.123_456_789), None],
        )
        .unwrap();
        let table = GammaTable::from_frame(&risk, &AssetSelection::all()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXPORT_FILE_NAME);
        table.export(&path, 6).unwrap();

        let back = aversion_data::read_csv(&path).unwrap();
        assert_eq!(columns(&back), columns(table.frame()));
        assert_eq!(back.height(), 2);
        let crra: Vec<Option<f64>> = back
            .column("gamma_crra")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(crra, vec![Some(1.123457), None]);
    }

    #[test]
    fn test_export_rejects_unknown_extension() {
        let risk = df!("entity_id" => ["ISA"], "gamma_crra" => [1.0]).unwrap();
        let table = GammaTable::from_frame(&risk, &AssetSelection::all()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(table.export(&dir.path().join("out.xlsx"), 6).is_err());
    }
}
