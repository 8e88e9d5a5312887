//! Column reconciliation
//!
//! Turns raw result files into tables over the canonical schema: columns are
//! renamed through the [`SynonymTable`], entity names are cleaned, numeric
//! columns are coerced to f64, and when no complete results file exists the
//! per-method tables are outer-joined on `entity_id` into a master table.

use crate::clean::EntityCleaner;
use crate::error::{DataError, Result};
use crate::loader::LoadedTable;
use crate::schema::{CanonicalField, empty_canonical_frame};
use crate::synonyms::SynonymTable;
use derive_more::Display;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

const KEY: &str = CanonicalField::EntityId.name();

/// Category of a reconciliation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// No column could be identified as the entity key
    #[display("missing key column")]
    MissingKey,

    /// Several rows cleaned to the same entity name
    #[display("duplicate entities")]
    DuplicateEntities,

    /// Rows whose entity name is null or empty after cleaning
    #[display("unnamed rows")]
    UnnamedRows,

    /// A configured synonym refers to no known column
    #[display("unknown synonym field")]
    UnknownSynonymField,
}

/// A recoverable problem found while reconciling a table.
///
/// Diagnostics are informational: the dashboard keeps running and shows them
/// next to the affected view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Table or file the finding refers to
    pub table: String,
    /// What went wrong
    pub kind: DiagnosticKind,
    /// Human-readable detail
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    pub fn new(table: impl Into<String>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.table, self.kind, self.message)
    }
}

/// A raw table with the label used in diagnostics.
#[derive(Debug, Clone)]
pub struct NamedFrame {
    /// Label, usually the source file name
    pub name: String,
    /// Table contents
    pub frame: DataFrame,
}

impl NamedFrame {
    /// Create a named frame.
    pub fn new(name: impl Into<String>, frame: DataFrame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

impl From<LoadedTable> for NamedFrame {
    fn from(table: LoadedTable) -> Self {
        Self::new(table.file_name, table.frame)
    }
}

/// A reconciled table plus the diagnostics raised while building it.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Table over canonical column names
    pub frame: DataFrame,
    /// Recoverable findings
    pub diagnostics: Vec<Diagnostic>,
}

/// Where the master table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "files")]
pub enum MasterOrigin {
    /// A complete results file
    File(String),
    /// Outer join of per-method files, in join order
    Merged(Vec<String>),
    /// Nothing was available
    Empty,
}

/// The master asset table.
#[derive(Debug, Clone)]
pub struct MasterTable {
    /// One row per entity
    pub frame: DataFrame,
    /// Provenance
    pub origin: MasterOrigin,
    /// Recoverable findings
    pub diagnostics: Vec<Diagnostic>,
}

/// Maps raw tables onto the canonical schema.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    synonyms: SynonymTable,
    cleaner: EntityCleaner,
}

impl Reconciler {
    /// Create a reconciler from a synonym table and an entity cleaner.
    pub const fn new(synonyms: SynonymTable, cleaner: EntityCleaner) -> Self {
        Self { synonyms, cleaner }
    }

    /// The synonym table in use.
    pub const fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// The entity cleaner in use.
    pub const fn cleaner(&self) -> &EntityCleaner {
        &self.cleaner
    }

    /// Rename columns, clean entity names and coerce numeric columns.
    ///
    /// Columns without a canonical match are kept under their original name.
    /// A missing key is not an error here; see [`Self::normalize_entity_table`].
    ///
    /// # Errors
    ///
    /// Returns an error only if polars fails on a rename or cast.
    pub fn normalize(&self, mut frame: DataFrame) -> Result<DataFrame> {
        let columns: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();

        for rename in self.synonyms.resolve(&columns) {
            debug!(from = %rename.source, to = %rename.canonical, "renaming column");
            frame.rename(&rename.source, rename.canonical.as_str().into())?;
        }

        if has_column(&frame, KEY) {
            self.clean_entities(&mut frame)?;
        }

        let numeric: Vec<Expr> = frame
            .get_column_names()
            .iter()
            .filter(|c| self.synonyms.is_numeric(c.as_str()))
            .map(|c| col(c.as_str()).cast(DataType::Float64))
            .collect();

        if numeric.is_empty() {
            return Ok(frame);
        }
        Ok(frame.lazy().with_columns(numeric).collect()?)
    }

    fn clean_entities(&self, frame: &mut DataFrame) -> Result<()> {
        let raw = frame.column(KEY)?.cast(&DataType::String)?;
        let cleaned: StringChunked = raw
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.map(|s| self.cleaner.clean(s)))
            .collect();
        frame.with_column(cleaned.with_name(KEY.into()).into_series())?;
        Ok(())
    }

    /// Normalize a table whose rows are one per entity.
    ///
    /// Rows with no entity name are dropped, and only the first row of each
    /// entity is kept. Both are reported as diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MissingKey`] if no column maps to `entity_id`.
    pub fn normalize_entity_table(&self, table: NamedFrame) -> Result<Reconciled> {
        let frame = self.normalize(table.frame)?;
        if !has_column(&frame, KEY) {
            return Err(DataError::MissingKey { table: table.name });
        }

        let (frame, unnamed, duplicates) = keep_first_per_entity(frame)?;
        let mut diagnostics = Vec::new();
        if unnamed > 0 {
            diagnostics.push(Diagnostic::new(
                &table.name,
                DiagnosticKind::UnnamedRows,
                format!("dropped {unnamed} row(s) without an entity name"),
            ));
        }
        if duplicates > 0 {
            diagnostics.push(Diagnostic::new(
                &table.name,
                DiagnosticKind::DuplicateEntities,
                format!("dropped {duplicates} duplicate row(s), kept the first of each"),
            ));
        }

        Ok(Reconciled { frame, diagnostics })
    }

    /// Outer-join partial tables on `entity_id`, in the order supplied.
    ///
    /// Tables without an identifiable key are skipped with a
    /// [`DiagnosticKind::MissingKey`] diagnostic. Returns `None` when no table
    /// could take part in the join. The result is sorted by entity.
    ///
    /// # Errors
    ///
    /// Returns an error if polars fails during normalization or the join.
    pub fn merge_partials(
        &self,
        tables: Vec<NamedFrame>,
    ) -> Result<Option<(Reconciled, Vec<String>)>> {
        let mut merged: Option<DataFrame> = None;
        let mut joined = Vec::new();
        let mut diagnostics = Vec::new();

        for table in tables {
            let name = table.name.clone();
            let reconciled = match self.normalize_entity_table(table) {
                Ok(r) => r,
                Err(DataError::MissingKey { table }) => {
                    warn!(table = %table, "skipping table without entity key");
                    diagnostics.push(missing_key(&table));
                    continue;
                }
                Err(e) => return Err(e),
            };

            diagnostics.extend(reconciled.diagnostics);
            merged = Some(match merged {
                None => reconciled.frame,
                Some(acc) => outer_join(acc, reconciled.frame, &name)?,
            });
            joined.push(name);
        }

        let Some(frame) = merged else {
            return Ok(None);
        };
        let frame = frame
            .lazy()
            .sort([KEY], Default::default())
            .collect()?;

        Ok(Some((Reconciled { frame, diagnostics }, joined)))
    }

    /// Build the master asset table.
    ///
    /// A complete results file is used when present and keyed. Otherwise the
    /// partial tables are merged. With nothing usable the result is an empty
    /// table carrying the full canonical column set.
    ///
    /// # Errors
    ///
    /// Returns an error only on polars failures.
    pub fn build_master(
        &self,
        master: Option<NamedFrame>,
        partials: Vec<NamedFrame>,
    ) -> Result<MasterTable> {
        let mut diagnostics = Vec::new();

        if let Some(table) = master {
            let name = table.name.clone();
            match self.normalize_entity_table(table) {
                Ok(reconciled) => {
                    diagnostics.extend(reconciled.diagnostics);
                    return Ok(MasterTable {
                        frame: reconciled.frame,
                        origin: MasterOrigin::File(name),
                        diagnostics,
                    });
                }
                Err(DataError::MissingKey { table }) => {
                    warn!(table = %table, "master table has no entity key, trying partial tables");
                    diagnostics.push(missing_key(&table));
                }
                Err(e) => return Err(e),
            }
        }

        if let Some((reconciled, joined)) = self.merge_partials(partials)? {
            diagnostics.extend(reconciled.diagnostics);
            return Ok(MasterTable {
                frame: reconciled.frame,
                origin: MasterOrigin::Merged(joined),
                diagnostics,
            });
        }

        Ok(MasterTable {
            frame: empty_canonical_frame()?,
            origin: MasterOrigin::Empty,
            diagnostics,
        })
    }
}

fn missing_key(table: &str) -> Diagnostic {
    Diagnostic::new(
        table,
        DiagnosticKind::MissingKey,
        "no column matches entity_id; table cannot be joined or filtered",
    )
}

/// Whether `frame` has a column named `name`.
pub fn has_column(frame: &DataFrame, name: &str) -> bool {
    frame.get_column_index(name).is_some()
}

/// Full outer join on `entity_id` with the key columns coalesced.
///
/// Non-key columns of `right` that already exist in `left` are renamed to
/// `<column>_<source stem>` (with a numeric suffix if that is taken too), so
/// any number of successive joins keeps column names unique.
pub fn outer_join(left: DataFrame, mut right: DataFrame, source: &str) -> PolarsResult<DataFrame> {
    let stem = Path::new(source)
        .file_stem()
        .map_or_else(|| source.to_string(), |s| s.to_string_lossy().into_owned());

    let clashes: Vec<String> = right
        .get_column_names()
        .iter()
        .filter(|c| c.as_str() != KEY && has_column(&left, c.as_str()))
        .map(|c| c.to_string())
        .collect();

    for name in clashes {
        let mut renamed = format!("{name}_{stem}");
        let mut n = 2;
        while has_column(&left, &renamed) || has_column(&right, &renamed) {
            renamed = format!("{name}_{stem}_{n}");
            n += 1;
        }
        debug!(column = %name, to = %renamed, source, "renaming clashing column before join");
        right.rename(&name, renamed.into())?;
    }

    left.lazy()
        .join(
            right.lazy(),
            [col(KEY)],
            [col(KEY)],
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        )
        .collect()
}

/// Drop unnamed rows and repeated entities. Returns (frame, unnamed, duplicates).
fn keep_first_per_entity(frame: DataFrame) -> Result<(DataFrame, usize, usize)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unnamed = 0;
    let mut duplicates = 0;

    let keep: Vec<bool> = frame
        .column(KEY)?
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| match v {
            None | Some("") => {
                unnamed += 1;
                false
            }
            Some(name) => {
                let first = seen.insert(name.to_string());
                if !first {
                    duplicates += 1;
                }
                first
            }
        })
        .collect();

    if unnamed == 0 && duplicates == 0 {
        return Ok((frame, 0, 0));
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok((frame.filter(&mask)?, unnamed, duplicates))
}
