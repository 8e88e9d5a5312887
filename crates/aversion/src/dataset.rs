//! Dataset assembly.
//!
//! Resolves every source kind through the loader, reconciles what was found and
//! keeps the results together with a record of which file backed each source.

use crate::assets::{AssetFilter, ExclusionSet, entity_ids};
use crate::config::DashboardConfig;
use crate::error::Result;
use aversion_data::{
    CsvLoader, DataError, Diagnostic, DiagnosticKind, EntityCleaner, LoadedTable, MasterOrigin,
    MasterTable, NamedFrame, Reconciler, SourceKind, SynonymTable,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which file, if any, backed a source kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    /// Source kind
    pub kind: SourceKind,
    /// Candidate that was found
    pub file: Option<String>,
    /// Row count of the raw file
    pub rows: usize,
    /// Column names as found in the file
    pub columns: Vec<String>,
}

impl SourceStatus {
    fn from_table(kind: SourceKind, table: Option<&LoadedTable>) -> Self {
        match table {
            Some(t) => Self {
                kind,
                file: Some(t.file_name.clone()),
                rows: t.frame.height(),
                columns: t
                    .frame
                    .get_column_names()
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            },
            None => Self {
                kind,
                file: None,
                rows: 0,
                columns: Vec::new(),
            },
        }
    }
}

/// Everything the pages are built from.
#[derive(Debug, Clone)]
pub struct Dataset {
    data_dir: PathBuf,
    master: MasterTable,
    tests: Option<NamedFrame>,
    timeseries: Option<NamedFrame>,
    sigma_long: Option<NamedFrame>,
    sources: Vec<SourceStatus>,
    diagnostics: Vec<Diagnostic>,
    exclusion: ExclusionSet,
    cleaner: EntityCleaner,
}

impl Dataset {
    /// Load and reconcile every source under the loader's data directory.
    ///
    /// Missing and unreadable files leave their source empty. Tables that
    /// cannot be keyed are recorded as diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error only if polars fails while reconciling.
    pub fn load(config: &DashboardConfig, loader: &CsvLoader) -> Result<Self> {
        let catalog = config.catalog();
        let cleaner = config.cleaner();

        // The diagnostics table knows every column, so its unknown keys are
        // the ones that match nothing at all.
        let (synonyms, _) = config.synonym_table(SynonymTable::canonical());
        let (test_synonyms, unknown) = config.synonym_table(SynonymTable::with_diagnostics());
        let reconciler = Reconciler::new(synonyms, cleaner.clone());
        let test_reconciler = Reconciler::new(test_synonyms, cleaner.clone());

        let mut diagnostics: Vec<Diagnostic> = unknown
            .into_iter()
            .map(|key| {
                Diagnostic::new(
                    "config",
                    DiagnosticKind::UnknownSynonymField,
                    format!("synonyms given for unknown column {key}"),
                )
            })
            .collect();

        let mut sources = Vec::new();
        let mut load = |kind: SourceKind| {
            let table = loader.load_source(&catalog, kind);
            sources.push(SourceStatus::from_table(kind, table.as_ref()));
            table.map(NamedFrame::from)
        };

        let master_file = load(SourceKind::Master);
        let partials: Vec<NamedFrame> = SourceKind::partials()
            .into_iter()
            .filter_map(&mut load)
            .collect();
        let tests_file = load(SourceKind::Diagnostics);
        let timeseries_file = load(SourceKind::TimeSeries);
        let sigma_long_file = load(SourceKind::SigmaLong);

        let master = reconciler.build_master(master_file, partials)?;
        diagnostics.extend(master.diagnostics.iter().cloned());

        let tests = match tests_file {
            Some(table) => {
                let name = table.name.clone();
                match test_reconciler.normalize_entity_table(table) {
                    Ok(reconciled) => {
                        diagnostics.extend(reconciled.diagnostics);
                        Some(NamedFrame::new(name, reconciled.frame))
                    }
                    Err(DataError::MissingKey { table }) => {
                        warn!(table = %table, "diagnostics table has no entity key");
                        diagnostics.push(Diagnostic::new(
                            table,
                            DiagnosticKind::MissingKey,
                            "no column matches entity_id; diagnostics cannot be filtered",
                        ));
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None => None,
        };

        let normalize = |table: Option<NamedFrame>| -> Result<Option<NamedFrame>> {
            let Some(t) = table else {
                return Ok(None);
            };
            Ok(Some(NamedFrame::new(t.name, reconciler.normalize(t.frame)?)))
        };
        let timeseries = normalize(timeseries_file)?;
        let sigma_long = normalize(sigma_long_file)?;

        info!(
            data_dir = %loader.data_dir().display(),
            origin = ?master.origin,
            assets = master.frame.height(),
            diagnostics = diagnostics.len(),
            "dataset loaded"
        );

        Ok(Self {
            data_dir: loader.data_dir().to_path_buf(),
            master,
            tests,
            timeseries,
            sigma_long,
            sources,
            diagnostics,
            exclusion: config.exclusion_set(),
            cleaner,
        })
    }

    /// Replace the exclusion set.
    pub fn with_exclusion(mut self, exclusion: ExclusionSet) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Directory the sources were read from.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The master table with every entity, exclusions included.
    pub const fn master(&self) -> &DataFrame {
        &self.master.frame
    }

    /// Where the master table came from.
    pub const fn master_origin(&self) -> &MasterOrigin {
        &self.master.origin
    }

    /// The master table without excluded entities.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn risk_view(&self) -> Result<DataFrame> {
        Ok(self.exclusion.apply(&self.master.frame)?)
    }

    /// Entities of the risk view, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails while filtering.
    pub fn available_assets(&self) -> Result<Vec<String>> {
        Ok(entity_ids(&self.risk_view()?)?)
    }

    /// The reconciled diagnostics table, exclusions included.
    pub const fn tests(&self) -> Option<&NamedFrame> {
        self.tests.as_ref()
    }

    /// The normalized time-series table as found.
    pub const fn timeseries(&self) -> Option<&NamedFrame> {
        self.timeseries.as_ref()
    }

    /// The normalized long-form sigma table as found.
    pub const fn sigma_long(&self) -> Option<&NamedFrame> {
        self.sigma_long.as_ref()
    }

    /// Which file backed each source kind.
    pub fn sources(&self) -> &[SourceStatus] {
        &self.sources
    }

    /// Every diagnostic raised while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The exclusion set applied by [`Self::risk_view`].
    pub const fn exclusion(&self) -> &ExclusionSet {
        &self.exclusion
    }

    /// The cleaner used for entity names.
    pub const fn cleaner(&self) -> &EntityCleaner {
        &self.cleaner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aversion_data::LoadCache;
    use std::fs;
    use std::sync::Arc;

    fn loader(dir: &Path) -> CsvLoader {
        CsvLoader::new(dir, Arc::new(LoadCache::new()))
    }

    #[test]
    fn test_load_master_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tablero_final.csv"),
            "Activo,gamma_CRRA,Gamma FTP,GARCH,Volatilidad\n\
             Datos históricos de ECOPETROL (Bogota),1.5,2.0,3.0,0.2\n\
             TRM,0.1,0.2,0.3,0.05\n",
        )
        .unwrap();

        let dataset = Dataset::load(&DashboardConfig::default(), &loader(dir.path())).unwrap();

        assert_eq!(
            dataset.master_origin(),
            &MasterOrigin::File("tablero_final.csv".to_string())
        );
        assert_eq!(dataset.master().height(), 2);
        assert_eq!(dataset.risk_view().unwrap().height(), 1);
        assert_eq!(dataset.available_assets().unwrap(), vec!["ECOPETROL"]);

        let master_status = &dataset.sources()[0];
        assert_eq!(master_status.kind, SourceKind::Master);
        assert_eq!(master_status.file.as_deref(), Some("tablero_final.csv"));
        assert_eq!(master_status.rows, 2);
        assert!(dataset.sources()[1..].iter().all(|s| s.file.is_none()));
    }

    #[test]
    fn test_load_tests_and_series() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("garch_supuestos.csv"),
            "Activo,ADF_p,ARCH_LM_p,alpha+beta\nISA,0.01,0.20,0.97\nISA,0.5,0.5,0.5\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("sigma_long.csv"),
            "Fecha,Activo,sigma\n2024-01-02,ISA,0.02\n",
        )
        .unwrap();

        let dataset = Dataset::load(&DashboardConfig::default(), &loader(dir.path())).unwrap();

        let tests = dataset.tests().unwrap();
        assert_eq!(tests.name, "garch_supuestos.csv");
        assert_eq!(tests.frame.height(), 1);
        for column in ["entity_id", "adf_p", "arch_lm_p", "alpha_beta"] {
            assert!(tests.frame.column(column).is_ok(), "{column}");
        }
        assert!(
            dataset
                .diagnostics()
                .iter()
                .any(|d| d.kind == DiagnosticKind::DuplicateEntities)
        );

        let sigma = dataset.sigma_long().unwrap();
        for column in ["date", "entity_id", "sigma_t"] {
            assert!(sigma.frame.column(column).is_ok(), "{column}");
        }
        assert!(dataset.timeseries().is_none());
        assert_eq!(dataset.master_origin(), &MasterOrigin::Empty);
    }

    #[test]
    fn test_keyless_tests_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("garch_tests.csv"), "ADF_p\n0.1\n").unwrap();

        let dataset = Dataset::load(&DashboardConfig::default(), &loader(dir.path())).unwrap();
        assert!(dataset.tests().is_none());
        assert!(
            dataset
                .diagnostics()
                .iter()
                .any(|d| d.kind == DiagnosticKind::MissingKey && d.table == "garch_tests.csv")
        );
    }

    #[test]
    fn test_unknown_synonym_key_becomes_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            synonyms: [("not_a_column".to_string(), vec!["x".to_string()])]
                .into_iter()
                .collect(),
            ..Default::default()
        };

        let dataset = Dataset::load(&config, &loader(dir.path())).unwrap();
        assert_eq!(dataset.diagnostics().len(), 1);
        assert_eq!(
            dataset.diagnostics()[0].kind,
            DiagnosticKind::UnknownSynonymField
        );
    }

    #[test]
    fn test_custom_exclusion() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("resultados_completos.csv"),
            "asset,crra\nTRM,1.0\nISA,2.0\n",
        )
        .unwrap();

        let dataset = Dataset::load(&DashboardConfig::default(), &loader(dir.path()))
            .unwrap()
            .with_exclusion(ExclusionSet::parse_list("ISA"));
        assert_eq!(dataset.available_assets().unwrap(), vec!["TRM"]);
    }
}
