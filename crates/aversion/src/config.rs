//! Dashboard configuration.
//!
//! Every field has a default, so an empty JSON object is a valid file. The
//! configuration is looked up in this order and the first hit wins:
//!
//! 1. an explicit path (the CLI `--config` flag)
//! 2. `aversion.json` in the working directory
//! 3. `aversion/config.json` under the platform config directory
//!    (`~/.config` on Linux, `~/Library/Application Support` on macOS)
//! 4. built-in defaults

use crate::assets::ExclusionSet;
use aversion_data::{EntityCleaner, SourceCatalog, SynonymTable};
use aversion_output::DEFAULT_FLOAT_PRECISION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "aversion.json";

/// Default significance level for diagnostic tests.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Cannot read config {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one dashboard session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Directory holding the result CSV files
    pub data_dir: PathBuf,

    /// Candidate file names per source; listed kinds replace the defaults
    pub sources: SourceCatalog,

    /// Identifiers removed from risk-comparison views
    pub exclude: Vec<String>,

    /// Prefixes stripped from entity names
    pub entity_prefixes: Vec<String>,

    /// Extra synonyms per canonical column
    pub synonyms: BTreeMap<String, Vec<String>>,

    /// Decimals kept on export
    pub float_precision: usize,

    /// Significance level for diagnostic test rejections
    pub significance: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sources: SourceCatalog::default(),
            exclude: ExclusionSet::default().ids().map(str::to_string).collect(),
            entity_prefixes: EntityCleaner::default().prefixes().to_vec(),
            synonyms: BTreeMap::new(),
            float_precision: DEFAULT_FLOAT_PRECISION,
            significance: DEFAULT_SIGNIFICANCE,
        }
    }
}

impl DashboardConfig {
    /// Read a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed or out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Find and load the configuration.
    ///
    /// Returns the configuration and the file it came from, if any. An explicit
    /// path must exist; the implicit locations are skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be loaded.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }

        for path in Self::search_paths() {
            if path.is_file() {
                info!(config = %path.display(), "loading configuration");
                return Ok((Self::from_file(&path)?, Some(path)));
            }
            debug!(config = %path.display(), "no configuration here");
        }

        Ok((Self::default(), None))
    }

    /// Implicit configuration locations, highest priority first.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = default_config_dir() {
            paths.push(dir.join("config.json"));
        }
        paths
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "significance must lie in (0, 1), got {}",
                self.significance
            )));
        }
        if self.float_precision > 15 {
            return Err(ConfigError::Invalid(format!(
                "float_precision must be at most 15, got {}",
                self.float_precision
            )));
        }
        Ok(())
    }

    /// Default catalog with this configuration's overrides applied.
    pub fn catalog(&self) -> SourceCatalog {
        let mut catalog = SourceCatalog::default();
        catalog.merge(&self.sources);
        catalog
    }

    /// The configured exclusion set.
    pub fn exclusion_set(&self) -> ExclusionSet {
        ExclusionSet::new(self.exclude.iter().cloned())
    }

    /// Entity-name cleaner with the configured prefixes.
    pub fn cleaner(&self) -> EntityCleaner {
        EntityCleaner::new(self.entity_prefixes.clone())
    }

    /// `base` with the configured extra synonyms appended.
    ///
    /// Also returns the configured keys that name no column of `base`.
    pub fn synonym_table(&self, mut base: SynonymTable) -> (SynonymTable, Vec<String>) {
        let unknown = base.extend_synonyms(&self.synonyms);
        (base, unknown)
    }
}

/// Platform configuration directory for the dashboard.
///
/// - Linux: `~/.config/aversion/`
/// - macOS: `~/Library/Application Support/aversion/`
/// - Windows: `%APPDATA%\aversion\`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("aversion"))
}
