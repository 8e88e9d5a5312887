#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/aversion/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod assets;
pub mod config;
pub mod dataset;
pub mod error;
pub mod views;

// Re-export main types from sub-crates
pub use aversion_data as data;
pub use aversion_output as output;

pub use assets::{AssetFilter, AssetSelection, ExclusionSet};
pub use config::{ConfigError, DashboardConfig};
pub use dataset::{Dataset, SourceStatus};
pub use error::{DashboardError, Result};
pub use views::PageView;

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
