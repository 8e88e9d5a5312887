//! In-memory load cache keyed by file path.

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    modified: SystemTime,
    frame: DataFrame,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cached files
    pub entries: usize,
    /// Loads served from the cache
    pub hits: u64,
    /// Loads that had to parse the file
    pub misses: u64,
}

/// Process-lifetime cache of parsed CSV files.
///
/// An entry is valid for as long as the file's modification time equals the
/// one recorded when it was parsed. A changed mtime replaces the entry on the
/// next load. Frames are immutable once stored, so two callers racing on the
/// same unchanged file store identical results.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LoadCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached frame for `path`, parsing it with `load` when the
    /// entry is missing or stale.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read or `load` fails.
    /// Failed loads are not cached.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<DataFrame>
    where
        F: FnOnce(&Path) -> PolarsResult<DataFrame>,
    {
        let key = cache_key(path);
        let modified = std::fs::metadata(path)?.modified()?;

        if let Some(frame) = self.lookup(&key, modified) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key.display(), "load cache hit");
            return Ok(frame);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(path = %key.display(), "load cache miss");
        let frame = load(path)?;

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key,
                CacheEntry {
                    modified,
                    frame: frame.clone(),
                },
            );

        Ok(frame)
    }

    fn lookup(&self, key: &Path, modified: SystemTime) -> Option<DataFrame> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.modified == modified)
            .map(|entry| entry.frame.clone())
    }

    /// Whether `path` has an entry matching its current modification time.
    pub fn is_fresh(&self, path: &Path) -> bool {
        let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) else {
            return false;
        };
        self.lookup(&cache_key(path), modified).is_some()
    }

    /// Drop the entry for `path`. Returns whether an entry existed.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&cache_key(path))
            .is_some()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self
                .entries
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Canonical path when it resolves, the given path otherwise.
fn cache_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use std::fs::{self, File};
    use std::time::Duration;

    fn frame_with(n: i64) -> PolarsResult<DataFrame> {
        df!("n" => [n])
    }

    #[test]
    fn test_hit_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "n\n1\n").unwrap();

        let cache = LoadCache::new();
        let first = cache.get_or_load(&path, |_| frame_with(1)).unwrap();
        let second = cache
            .get_or_load(&path, |_| panic!("should be served from cache"))
            .unwrap();

        assert!(first.equals(&second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
        assert!(cache.is_fresh(&path));
    }

    #[test]
    fn test_mtime_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "n\n1\n").unwrap();

        let cache = LoadCache::new();
        cache.get_or_load(&path, |_| frame_with(1)).unwrap();

        let later = fs::metadata(&path).unwrap().modified().unwrap() + Duration::from_secs(60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        assert!(!cache.is_fresh(&path));

        let reloaded = cache.get_or_load(&path, |_| frame_with(2)).unwrap();
        assert!(reloaded.equals(&frame_with(2).unwrap()));
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LoadCache::new();
        let result = cache.get_or_load(&dir.path().join("nope.csv"), |_| frame_with(1));
        assert!(matches!(result, Err(DataError::Io(_))));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_failed_load_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "x").unwrap();

        let cache = LoadCache::new();
        let result = cache.get_or_load(&path, |_| {
            Err(PolarsError::ComputeError("malformed".into()))
        });
        assert!(result.is_err());
        assert!(!cache.is_fresh(&path));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        fs::write(&path, "n\n1\n").unwrap();

        let cache = LoadCache::new();
        cache.get_or_load(&path, |_| frame_with(1)).unwrap();
        assert!(cache.invalidate(&path));
        assert!(!cache.invalidate(&path));

        cache.get_or_load(&path, |_| frame_with(1)).unwrap();
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
