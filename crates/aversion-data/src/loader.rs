//! Dataset loader
//!
//! Every source kind has an ordered list of candidate file names. The loader
//! walks the list and returns the first file that exists and parses. A missing
//! file and a malformed file are both expected outcomes: they are logged and the
//! next candidate is tried.

use crate::cache::LoadCache;
use crate::error::Result;
use crate::schema::SourceKind;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed source file together with the candidate that produced it.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    /// Candidate file name that was found
    pub file_name: String,
    /// Full path of the file
    pub path: PathBuf,
    /// Parsed contents, columns as found in the file
    pub frame: DataFrame,
}

/// Candidate file names per source kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCatalog {
    candidates: BTreeMap<SourceKind, Vec<String>>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        let candidates = SourceKind::all()
            .into_iter()
            .map(|kind| {
                let names = kind
                    .default_candidates()
                    .iter()
                    .map(|n| (*n).to_string())
                    .collect();
                (kind, names)
            })
            .collect();
        Self { candidates }
    }
}

impl SourceCatalog {
    /// Candidate names for `kind`, highest priority first.
    pub fn candidates(&self, kind: SourceKind) -> &[String] {
        self.candidates.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Replace the candidate list for `kind`.
    pub fn set_candidates(&mut self, kind: SourceKind, names: Vec<String>) {
        self.candidates.insert(kind, names);
    }

    /// Merge overrides: kinds present in `other` replace ours.
    pub fn merge(&mut self, other: &Self) {
        for (kind, names) in &other.candidates {
            self.candidates.insert(*kind, names.clone());
        }
    }
}

/// Loads CSV files from a data directory through a shared [`LoadCache`].
#[derive(Debug, Clone)]
pub struct CsvLoader {
    data_dir: PathBuf,
    cache: Arc<LoadCache>,
}

impl CsvLoader {
    /// Create a loader rooted at `data_dir`.
    pub fn new<P: Into<PathBuf>>(data_dir: P, cache: Arc<LoadCache>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache,
        }
    }

    /// Directory candidate names are resolved against.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The cache backing this loader.
    pub fn cache(&self) -> &Arc<LoadCache> {
        &self.cache
    }

    /// Return the first candidate that exists and parses, or `None`.
    pub fn load_first<S: AsRef<str>>(&self, candidates: &[S]) -> Option<LoadedTable> {
        candidates
            .iter()
            .find_map(|name| self.try_load(name.as_ref()))
    }

    /// Resolve a source kind through the catalog.
    pub fn load_source(&self, catalog: &SourceCatalog, kind: SourceKind) -> Option<LoadedTable> {
        let loaded = self.load_first(catalog.candidates(kind));
        match &loaded {
            Some(table) => info!(
                source = %kind,
                file = %table.file_name,
                rows = table.frame.height(),
                "loaded source"
            ),
            None => debug!(source = %kind, "no candidate file found"),
        }
        loaded
    }

    fn try_load(&self, file_name: &str) -> Option<LoadedTable> {
        let path = self.data_dir.join(file_name);
        if !path.is_file() {
            debug!(file = %path.display(), "candidate missing");
            return None;
        }

        match self.cache.get_or_load(&path, read_csv) {
            Ok(frame) => Some(LoadedTable {
                file_name: file_name.to_string(),
                path,
                frame,
            }),
            Err(e) => {
                debug!(file = %path.display(), error = %e, "candidate unreadable, skipping");
                None
            }
        }
    }

    /// File names in the data directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut names = std::fs::read_dir(&self.data_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }
}

/// Parse a UTF-8 CSV file with a header row.
///
/// The schema is inferred from every row so that a late non-numeric cell does
/// not fail the parse.
pub fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    if frame.width() == 0 {
        return Err(PolarsError::NoData(
            format!("{} has no header row", path.display()).into(),
        ));
    }
    Ok(frame)
}
