//! blake3 content hashes and change-aware atomic writes.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::cache::FRESHNESS_CACHE;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The hash of a missing file.
    #[inline]
    pub const fn empty() -> Self {
        Self([0; 32])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; 32]
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 16 hex chars
        write!(f, "{}", &self.to_hex()[..16])
    }
}

pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(*blake3::hash(bytes).as_bytes())
}

/// Hash of a file's contents, cached until the file changes.
pub fn compute_file_hash(path: &Path) -> ContentHash {
    if let Some(cached) = FRESHNESS_CACHE.get(path) {
        return cached;
    }

    let hash = compute_file_hash_uncached(path);
    if !hash.is_empty() {
        FRESHNESS_CACHE.set(path, hash);
    }
    hash
}

fn compute_file_hash_uncached(path: &Path) -> ContentHash {
    let Ok(file) = File::open(path) else {
        return ContentHash::empty();
    };

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return ContentHash::empty(),
        }
    }

    ContentHash::new(*hasher.finalize().as_bytes())
}

/// Atomically replace `path` with `bytes` unless it already holds them.
///
/// The content is staged in a temporary file in the same directory and
/// renamed into place, so readers see either the old or the new file.
/// Returns whether the file was written.
pub fn persist_if_changed(path: &Path, bytes: &[u8]) -> io::Result<bool> {
    let new_hash = hash_bytes(bytes);
    if path.is_file() && compute_file_hash(path) == new_hash {
        return Ok(false);
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;

    FRESHNESS_CACHE.set(path, new_hash);
    Ok(true)
}
