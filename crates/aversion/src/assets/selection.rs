//! User selection of assets.

use super::AssetFilter;
use std::collections::BTreeSet;

/// The assets a page is restricted to. Empty means every asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSelection {
    ids: BTreeSet<String>,
}

impl AssetSelection {
    /// Select every asset.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select the given identifiers. Blank entries are ignored.
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

    /// Parse a comma-separated list. An empty list selects everything.
    pub fn parse_list(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Whether every asset is selected.
    pub fn is_all(&self) -> bool {
        self.ids.is_empty()
    }

    /// Explicitly selected identifiers, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Selected identifiers that are not in `available`.
    pub fn unknown<'a>(&'a self, available: &[String]) -> Vec<&'a str> {
        self.ids()
            .filter(|id| !available.iter().any(|a| a == id))
            .collect()
    }
}

impl AssetFilter for AssetSelection {
    fn keeps(&self, entity: &str) -> bool {
        self.is_all() || self.ids.contains(entity)
    }
}
