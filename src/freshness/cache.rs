//! Process-wide cache of output file hashes.
//!
//! Entries are validated against the file's length and mtime, so a file
//! rewritten by another process is hashed again.

use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use super::hash::ContentHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl Stamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}

pub struct FreshnessCache {
    hashes: DashMap<PathBuf, (ContentHash, Stamp)>,
}

impl FreshnessCache {
    pub fn new() -> Self {
        Self {
            hashes: DashMap::new(),
        }
    }

    pub fn get(&self, path: &Path) -> Option<ContentHash> {
        let stamp = Stamp::of(path)?;
        let entry = self.hashes.get(path)?;
        let (hash, cached) = *entry;
        (cached == stamp).then_some(hash)
    }

    pub fn set(&self, path: &Path, hash: ContentHash) {
        if let Some(stamp) = Stamp::of(path) {
            self.hashes.insert(path.to_path_buf(), (hash, stamp));
        }
    }

    pub fn invalidate(&self, path: &Path) {
        self.hashes.remove(path);
    }

    pub fn clear(&self) {
        self.hashes.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }
}

impl Default for FreshnessCache {
    fn default() -> Self {
        Self::new()
    }
}

pub static FRESHNESS_CACHE: LazyLock<FreshnessCache> = LazyLock::new(FreshnessCache::new);

/// Forget the hash of a file that was deleted.
#[inline]
pub fn invalidate(path: &Path) {
    FRESHNESS_CACHE.invalidate(path);
}

/// Drop every cached hash, e.g. after the output root was wiped.
#[inline]
pub fn clear_cache() {
    FRESHNESS_CACHE.clear();
}
