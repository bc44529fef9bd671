//! Variant store: persistence of derived variants keyed by `(image id, spec)`.
//!
//! # Layout
//!
//! ```text
//! variants/
//! └── <image id>/
//!     ├── <spec fingerprint>.jpg     # encoded variant
//!     └── <spec fingerprint>.json    # metadata sidecar
//! ```
//!
//! The sidecar records the spec, the content hash, the output dimensions and
//! the creation time. Both files are written with
//! [`BlobStorage::put_atomic`], content first; if the sidecar write fails
//! the content blob is removed again. A lookup is a hit only when
//! the sidecar parses, describes the requested key, and the content blob is
//! present with a matching hash. Anything else is a miss, and the processor
//! re-derives and overwrites the entry.
//!
//! # Concurrency
//!
//! There is no lock. Concurrent `put`s for one key race, and each file ends
//! up holding the last writer's bytes. Derivations are deterministic, so the
//! racing writers carry identical content and hashes, and the key resolves to
//! a single authoritative variant. Keys for different images or specs touch
//! disjoint files.

use crate::cache::hash_bytes;
use crate::imaging::Dimensions;
use crate::storage::{BlobStorage, StorageError};
use crate::types::{ImageId, Variant, VariantKey, VariantSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Top-level storage directory for variants.
const VARIANTS_DIR: &str = "variants";

/// Version of the sidecar format. Bump to orphan every stored variant.
const SIDECAR_VERSION: u32 = 1;

const SIDECAR_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid metadata '{key}': {source}")]
    Metadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Whether the failure came from the storage medium, where a retry
    /// might succeed.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Io { .. }))
    }
}

/// Metadata sidecar stored next to each variant.
#[derive(Debug, Serialize, Deserialize)]
struct VariantMeta {
    version: u32,
    image_id: ImageId,
    spec: VariantSpec,
    content_hash: String,
    width: u32,
    height: u32,
    created_at: DateTime<Utc>,
}

/// Storage directory holding every variant of one image.
pub fn variants_dir(image_id: ImageId) -> String {
    format!("{VARIANTS_DIR}/{image_id}")
}

fn content_key(key: &VariantKey) -> String {
    format!(
        "{}/{}.{}",
        variants_dir(key.image_id),
        key.spec.fingerprint(),
        key.spec.format.extension()
    )
}

fn meta_key(key: &VariantKey) -> String {
    format!(
        "{}/{}.{SIDECAR_EXTENSION}",
        variants_dir(key.image_id),
        key.spec.fingerprint()
    )
}

/// Key-value persistence for derived variants.
#[derive(Clone)]
pub struct VariantStore {
    storage: Arc<dyn BlobStorage>,
}

impl VariantStore {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    /// Fetch a stored variant. Pure read: misses and corrupt entries are `Ok(None)`.
    pub fn lookup(&self, key: &VariantKey) -> Result<Option<Variant>, StoreError> {
        let meta_key = meta_key(key);
        let Some(raw) = self.storage.get(&meta_key)? else {
            return Ok(None);
        };

        let meta: VariantMeta = match serde_json::from_slice(&raw) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(key = %meta_key, error = %err, "ignoring unreadable variant metadata");
                return Ok(None);
            }
        };
        if meta.version != SIDECAR_VERSION || meta.image_id != key.image_id || meta.spec != key.spec
        {
            debug!(key = %meta_key, "variant metadata does not describe the requested key");
            return Ok(None);
        }

        let content_key = content_key(key);
        let Some(content) = self.storage.get(&content_key)? else {
            debug!(key = %content_key, "variant metadata present but content missing");
            return Ok(None);
        };
        if hash_bytes(&content) != meta.content_hash {
            warn!(key = %content_key, "ignoring variant whose content does not match its hash");
            return Ok(None);
        }

        Ok(Some(Variant {
            image_id: meta.image_id,
            spec: meta.spec,
            content,
            content_hash: meta.content_hash,
            width: meta.width,
            height: meta.height,
            created_at: meta.created_at,
        }))
    }

    /// Store a variant, atomically replacing whatever the key held.
    ///
    /// Idempotent: if the key already holds identical content, the existing
    /// variant (with its original creation time) is returned untouched.
    pub fn put(
        &self,
        key: &VariantKey,
        content: Vec<u8>,
        dimensions: Dimensions,
    ) -> Result<Variant, StoreError> {
        let content_hash = hash_bytes(&content);
        if let Some(existing) = self.lookup(key)?
            && existing.content_hash == content_hash
        {
            return Ok(existing);
        }

        let meta = VariantMeta {
            version: SIDECAR_VERSION,
            image_id: key.image_id,
            spec: key.spec.clone(),
            content_hash,
            width: dimensions.width,
            height: dimensions.height,
            created_at: Utc::now(),
        };
        let meta_key = meta_key(key);
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|source| StoreError::Metadata {
            key: meta_key.clone(),
            source,
        })?;

        let content_key = content_key(key);
        self.storage.put_atomic(&content_key, &content)?;
        if let Err(err) = self.storage.put_atomic(&meta_key, &meta_json) {
            // The sidecar commits the entry; content without one is unreachable
            if let Err(cleanup) = self.storage.remove(&content_key) {
                warn!(key = %content_key, error = %cleanup, "failed to remove orphaned variant content");
            }
            return Err(err.into());
        }

        Ok(Variant {
            image_id: meta.image_id,
            spec: meta.spec,
            content,
            content_hash: meta.content_hash,
            width: meta.width,
            height: meta.height,
            created_at: meta.created_at,
        })
    }

    /// Remove every variant of an image. Returns how many variants were removed.
    pub fn invalidate(&self, image_id: ImageId) -> Result<usize, StoreError> {
        let dir = variants_dir(image_id);
        let variants = self.list(image_id)?.len();
        self.storage.remove_dir(&dir)?;
        info!(image = %image_id, variants, "invalidated variants");
        Ok(variants)
    }

    /// Spec fingerprints of every variant stored for an image, sorted.
    pub fn list(&self, image_id: ImageId) -> Result<Vec<String>, StoreError> {
        let suffix = format!(".{SIDECAR_EXTENSION}");
        Ok(self
            .storage
            .list_dir(&variants_dir(image_id))?
            .into_iter()
            .filter_map(|key| {
                let name = key.rsplit('/').next()?;
                name.strip_suffix(&suffix).map(str::to_string)
            })
            .collect())
    }
}
