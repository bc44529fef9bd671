//! Blob storage boundary.
//!
//! Everything the engine persists (originals, upload records, derived
//! variants and their metadata sidecars) goes through [`BlobStorage`]: a
//! flat key → bytes map with `/`-separated keys and directory-style prefixes.
//!
//! Two implementations ship with the crate:
//!
//! - [`FsBlobStorage`] maps keys to files under a root directory. Writes are
//!   atomic create-or-replace: bytes go to a temporary file in the target
//!   directory, which is then renamed over the destination. Readers observe
//!   either the previous file or the complete new one, never a torn write,
//!   and concurrent writers to one key resolve to the last rename.
//! - [`MemoryBlobStorage`] keeps blobs in a locked map, for tests and
//!   embedding.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use walkdir::WalkDir;

/// Prefix of in-flight temporary files; never listed as keys.
const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

impl StorageError {
    fn io(key: &str, source: io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Key → bytes persistence used by the variant store and the upload boundary.
pub trait BlobStorage: Send + Sync {
    /// Read a blob. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically create or replace a blob.
    fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove one blob. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// All keys under a directory prefix (e.g. `variants/<id>`), sorted.
    fn list_dir(&self, dir: &str) -> Result<Vec<String>>;

    /// Remove every blob under a directory prefix. Returns how many were removed.
    fn remove_dir(&self, dir: &str) -> Result<usize>;
}

/// Reject keys that could escape the storage root or are otherwise malformed.
fn validate_key(key: &str) -> Result<()> {
    let bad_part = |part: &str| {
        part.is_empty() || part == "." || part == ".." || part.starts_with(PARTIAL_PREFIX)
    };
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(bad_part);
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn dir_prefix(dir: &str) -> Result<String> {
    let trimmed = dir.trim_end_matches('/');
    validate_key(trimmed)?;
    Ok(format!("{trimmed}/"))
}

// ============================================================================
// Filesystem backend
// ============================================================================

/// Blob storage rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStorage {
    root: PathBuf,
}

impl FsBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, part| path.join(part)))
    }

    /// Convert a path below the root back into a `/`-separated key.
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

impl BlobStorage for FsBlobStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::io(key, err)),
        }
    }

    fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        std::fs::create_dir_all(parent).map_err(|e| StorageError::io(key, e))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(parent)
            .map_err(|e| StorageError::io(key, e))?;
        tmp.write_all(bytes).map_err(|e| StorageError::io(key, e))?;
        tmp.as_file().sync_all().map_err(|e| StorageError::io(key, e))?;
        tmp.persist(&path)
            .map_err(|e| StorageError::io(key, e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StorageError::io(key, err)),
        }
    }

    fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = dir_prefix(dir)?;
        let path = self.resolve(prefix.trim_end_matches('/'))?;
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&path) {
            let entry = match entry {
                Ok(entry) => entry,
                // A concurrent remove_dir may delete entries mid-walk
                Err(err)
                    if err
                        .io_error()
                        .is_some_and(|e| e.kind() == io::ErrorKind::NotFound) =>
                {
                    continue;
                }
                Err(err) => return Err(StorageError::io(dir, err.into())),
            };
            if !entry.file_type().is_file()
                || entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX)
            {
                continue;
            }
            if let Some(key) = self.key_for(entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn remove_dir(&self, dir: &str) -> Result<usize> {
        let removed = self.list_dir(dir)?.len();
        let path = self.resolve(dir.trim_end_matches('/'))?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(removed),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(StorageError::io(dir, err)),
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Blob storage held in memory. Cloning shares nothing; wrap in an `Arc`
/// to share one store between components.
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStorage for MemoryBlobStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn put_atomic(&self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.remove(key).is_some())
    }

    fn list_dir(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = dir_prefix(dir)?;
        let blobs = self.blobs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn remove_dir(&self, dir: &str) -> Result<usize> {
        let prefix = dir_prefix(dir)?;
        let mut blobs = self.blobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = blobs.len();
        blobs.retain(|key, _| !key.starts_with(&prefix));
        Ok(before - blobs.len())
    }
}
