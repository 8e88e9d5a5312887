//! Column synonym table
//!
//! Result files come from notebooks written in Spanish and English, with
//! inconsistent casing and separators. The synonym table maps every accepted
//! spelling onto a canonical column name. Resolution is a pure function of the
//! header row, so it is tested without touching the filesystem.

use crate::schema::{CanonicalField, DiagnosticField};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Accepted spellings for one canonical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSynonyms {
    /// Canonical column name written to reconciled tables
    pub canonical: String,
    /// Alternative spellings, highest priority first
    pub synonyms: Vec<String>,
    /// Whether values are coerced to f64 after renaming
    pub numeric: bool,
}

impl FieldSynonyms {
    /// Create an entry for a canonical name.
    pub fn new(canonical: &str, synonyms: &[&str], numeric: bool) -> Self {
        Self {
            canonical: canonical.to_string(),
            synonyms: synonyms.iter().map(|s| (*s).to_string()).collect(),
            numeric,
        }
    }

    /// Normalized match keys: the canonical name first, then each synonym.
    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.canonical.as_str())
            .chain(self.synonyms.iter().map(String::as_str))
            .map(normalize_key)
    }
}

/// One column rename decided by [`SynonymTable::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    /// Column name as found in the source file
    pub source: String,
    /// Canonical column name
    pub canonical: String,
}

/// Ordered table of canonical fields and their synonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymTable {
    entries: Vec<FieldSynonyms>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::canonical()
    }
}

impl SynonymTable {
    /// Synonyms for the nine canonical asset fields.
    pub fn canonical() -> Self {
        let entry = |field: CanonicalField, synonyms: &[&str]| {
            FieldSynonyms::new(field.name(), synonyms, field.is_numeric())
        };

        Self {
            entries: vec![
                entry(CanonicalField::EntityId, &["activo", "asset", "name"]),
                entry(CanonicalField::GammaCrra, &["gamma crra", "crra"]),
                entry(CanonicalField::GammaFtp, &["gamma ftp", "ftp"]),
                entry(CanonicalField::GammaGarch, &["gamma garch", "garch"]),
                entry(CanonicalField::VolHist, &["volatilidad"]),
                entry(CanonicalField::VolGarch, &["sigma_garch", "sigma_last"]),
                entry(CanonicalField::Date, &["fecha"]),
                entry(
                    CanonicalField::SigmaT,
                    &["sigma", "volatilidad_condicional"],
                ),
                entry(
                    CanonicalField::Return,
                    &["retorno", "rend", "rendimiento", "returns"],
                ),
            ],
        }
    }

    /// Canonical fields plus the GARCH diagnostic columns.
    pub fn with_diagnostics() -> Self {
        let mut table = Self::canonical();
        let entry = |field: DiagnosticField, synonyms: &[&str]| {
            FieldSynonyms::new(field.name(), synonyms, true)
        };
        table.entries.extend([
            entry(DiagnosticField::Adf, &["adf", "adf_pvalue"]),
            entry(DiagnosticField::ArchLm, &["arch_lm", "arch"]),
            entry(DiagnosticField::LjungResid, &["ljung_resid", "ljung_box_p"]),
            entry(
                DiagnosticField::LjungResidSquared,
                &["ljung_resid2", "ljung_box2_p"],
            ),
            entry(
                DiagnosticField::JarqueBera,
                &["jarquebera_p", "jb_p", "jarque_bera"],
            ),
            entry(DiagnosticField::AlphaBeta, &["alpha+beta", "persistence"]),
        ]);
        table
    }

    /// Append user-supplied synonyms to existing entries.
    ///
    /// Keys that name no known canonical column are ignored and returned so the
    /// caller can report them.
    pub fn extend_synonyms(&mut self, extra: &BTreeMap<String, Vec<String>>) -> Vec<String> {
        let mut unknown = Vec::new();
        for (canonical, synonyms) in extra {
            match self.entries.iter_mut().find(|e| &e.canonical == canonical) {
                Some(entry) => entry.synonyms.extend(synonyms.iter().cloned()),
                None => unknown.push(canonical.clone()),
            }
        }
        unknown
    }

    /// Entries in priority order.
    pub fn entries(&self) -> &[FieldSynonyms] {
        &self.entries
    }

    /// Canonical name for a single column header, ignoring claims by other columns.
    pub fn canonical_for(&self, column: &str) -> Option<&str> {
        let key = normalize_key(column);
        self.entries
            .iter()
            .find(|e| e.keys().any(|k| k == key))
            .map(|e| e.canonical.as_str())
    }

    /// Whether a canonical column is declared numeric.
    pub fn is_numeric(&self, canonical: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.canonical == canonical && e.numeric)
    }

    /// Decide which source columns become which canonical columns.
    ///
    /// Each source column is claimed by at most one field and each field claims
    /// at most one column. Fields are visited in table order. Within a field, a
    /// column already carrying the canonical name wins; otherwise synonyms are
    /// tried in priority order and the first unclaimed column that matches is
    /// taken. Columns that are already canonical produce no rename entry.
    pub fn resolve(&self, columns: &[String]) -> Vec<ColumnMatch> {
        let normalized: Vec<String> = columns.iter().map(|c| normalize_key(c)).collect();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut matches = Vec::new();

        for entry in &self.entries {
            let exact = columns
                .iter()
                .position(|c| c == &entry.canonical)
                .filter(|idx| !claimed.contains(idx));

            let found = exact.or_else(|| {
                entry.keys().find_map(|key| {
                    normalized
                        .iter()
                        .enumerate()
                        .find(|(idx, n)| **n == key && !claimed.contains(idx))
                        .map(|(idx, _)| idx)
                })
            });

            if let Some(idx) = found {
                claimed.insert(idx);
                if columns[idx] != entry.canonical {
                    matches.push(ColumnMatch {
                        source: columns[idx].clone(),
                        canonical: entry.canonical.clone(),
                    });
                }
            }
        }

        matches
    }
}

/// Case-, accent- and separator-insensitive key for column matching.
///
/// Lowercases, strips Latin diacritics, trims, and folds runs of spaces,
/// hyphens and underscores into a single underscore.
pub fn normalize_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut pending_sep = false;

    for ch in name.trim().trim_matches('\u{feff}').chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_sep = true;
            continue;
        }
        if pending_sep && !key.is_empty() {
            key.push('_');
        }
        pending_sep = false;
        for lower in ch.to_lowercase() {
            key.push(fold_accent(lower));
        }
    }

    key
}

const fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}
