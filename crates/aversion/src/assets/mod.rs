//! Asset filters.
//!
//! Two filters act on entity tables: the [`ExclusionSet`] removes macro and
//! benchmark series from risk comparisons, and the [`AssetSelection`] narrows a
//! page to the assets the user asked for.

pub mod exclusion;
pub mod selection;

pub use exclusion::{DEFAULT_EXCLUDED, ExclusionSet};
pub use selection::AssetSelection;

use aversion_data::{CanonicalField, has_column};
use polars::prelude::*;

/// A row filter keyed on `entity_id`.
pub trait AssetFilter {
    /// Whether rows for `entity` pass the filter.
    fn keeps(&self, entity: &str) -> bool;

    /// Keep the rows of `frame` whose entity passes.
    ///
    /// Rows with a null entity never pass. A frame without an `entity_id`
    /// column is returned unchanged.
    fn apply(&self, frame: &DataFrame) -> PolarsResult<DataFrame> {
        let key = CanonicalField::EntityId.name();
        if !has_column(frame, key) {
            return Ok(frame.clone());
        }

        let ids = frame.column(key)?.cast(&DataType::String)?;
        let mask: BooleanChunked = ids
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.is_some_and(|id| self.keeps(id)))
            .collect();
        frame.filter(&mask)
    }
}

/// Distinct entity names of `frame`, sorted.
pub fn entity_ids(frame: &DataFrame) -> PolarsResult<Vec<String>> {
    let key = CanonicalField::EntityId.name();
    if !has_column(frame, key) {
        return Ok(Vec::new());
    }

    let ids = frame.column(key)?.cast(&DataType::String)?;
    let mut out: Vec<String> = ids
        .as_materialized_series()
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StartsWithI;

    impl AssetFilter for StartsWithI {
        fn keeps(&self, entity: &str) -> bool {
            entity.starts_with('I')
        }
    }

    #[test]
    fn test_apply_drops_failing_and_null_rows() {
        let frame = df!(
            "entity_id" => [Some("ISA"), Some("ECOPETROL"), None, Some("IBR")],
            "gamma_crra" => [1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();

        let out = StartsWithI.apply(&frame).unwrap();
        assert_eq!(entity_ids(&out).unwrap(), vec!["IBR", "ISA"]);
    }

    #[test]
    fn test_apply_without_key_is_identity() {
        let frame = df!("gamma_crra" => [1.0, 2.0]).unwrap();
        let out = StartsWithI.apply(&frame).unwrap();
        assert!(out.equals(&frame));
        assert!(entity_ids(&frame).unwrap().is_empty());
    }
}
