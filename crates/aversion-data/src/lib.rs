#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aversion/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod clean;
pub mod error;
pub mod loader;
pub mod reconcile;
pub mod schema;
pub mod synonyms;

pub use cache::{CacheStats, LoadCache};
pub use clean::EntityCleaner;
pub use error::{DataError, Result};
pub use loader::{CsvLoader, LoadedTable, SourceCatalog, read_csv};
pub use reconcile::{
    Diagnostic, DiagnosticKind, MasterOrigin, MasterTable, NamedFrame, Reconciled, Reconciler,
    has_column, outer_join,
};
pub use schema::{CanonicalField, DiagnosticField, SourceKind, empty_canonical_frame};
pub use synonyms::{ColumnMatch, FieldSynonyms, SynonymTable, normalize_key};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
