//! Macro and benchmark identifiers kept out of risk comparisons.

use super::AssetFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifiers excluded by default: exchange rate, policy rate, interbank rate
/// and the US three-month bill.
pub const DEFAULT_EXCLUDED: &[&str] = &["TRM", "TPM", "IBR", "DTB3"];

/// Entity identifiers removed from risk-comparison views.
///
/// Matching is exact on the cleaned entity name. Raw and export views never
/// apply this set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet {
    ids: BTreeSet<String>,
}

impl Default for ExclusionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED.iter().copied())
    }
}

impl ExclusionSet {
    /// Create a set from identifiers. Surrounding whitespace is ignored.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ids: ids
                .into_iter()
                .map(|id| id.as_ref().trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    /// An exclusion set that excludes nothing.
    pub const fn empty() -> Self {
        Self {
            ids: BTreeSet::new(),
        }
    }

    /// Parse a comma-separated list such as `"TRM,TPM"`.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Excluded identifiers, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Whether `entity` is excluded.
    pub fn contains(&self, entity: &str) -> bool {
        self.ids.contains(entity)
    }

    /// Number of excluded identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl AssetFilter for ExclusionSet {
    fn keeps(&self, entity: &str) -> bool {
        !self.contains(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::entity_ids;
    use polars::prelude::*;

    #[test]
    fn test_default_set() {
        let set = ExclusionSet::default();
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["DTB3", "IBR", "TPM", "TRM"]);
        assert!(set.contains("TRM"));
        assert!(!set.contains("ECOPETROL"));
    }

    #[test]
    fn test_parse_list() {
        let set = ExclusionSet::parse_list(" TRM , IBR,,");
        assert_eq!(set.len(), 2);
        assert!(set.contains("IBR"));
        assert!(ExclusionSet::parse_list("").is_empty());
    }

    #[test]
    fn test_apply_removes_excluded() {
        let frame = df!(
            "entity_id" => ["ECOPETROL", "TRM", "ISA", "DTB3", "TPM", "IBR"],
            "gamma_crra" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();

        let view = ExclusionSet::default().apply(&frame).unwrap();
        assert_eq!(entity_ids(&view).unwrap(), vec!["ECOPETROL", "ISA"]);
        // the input is untouched
        assert_eq!(frame.height(), 6);

        let all = ExclusionSet::empty().apply(&frame).unwrap();
        assert_eq!(all.height(), 6);
    }
}
