//! Variant derivation.
//!
//! [`ImageProcessor::get_or_create_variant`] is the single entry point for
//! turning an [`ImageRecord`] plus a [`VariantSpec`] into bytes:
//!
//! ```text
//! spec.is_original? ──yes──▶ OriginalSizeCannotBeGenerated
//!        │no
//! spec valid? ──no──▶ InvalidSpec
//!        │yes
//! VariantStore::lookup ──hit──▶ stored variant
//!        │miss
//! read original ─▶ verify hash ─▶ plan ─▶ backend ─▶ VariantStore::put
//! ```
//!
//! The original is the source of truth and is never derived from itself.
//! Callers that want "the original size" must serve the record's bytes
//! directly (see [`ImageLibrary::original_bytes`](crate::library::ImageLibrary::original_bytes)).
//!
//! ## Concurrency
//!
//! The processor is `Sync` and holds no locks. Concurrent requests for the
//! same missing variant each derive it and race to store it; since the
//! backend is deterministic every caller gets equivalent content.
//! [`ImageProcessor::get_or_create_variants`] derives several specs of one
//! record in parallel on the rayon pool.

use crate::cache::{CacheCounters, CacheStats};
use crate::imaging::{BackendError, ImageBackend, plan_variant, render_variant};
use crate::library::read_original;
use crate::storage::{BlobStorage, StorageError};
use crate::store::{StoreError, VariantStore};
use crate::types::{ImageId, ImageRecord, SpecError, Variant, VariantKey, VariantSpec};
use rayon::prelude::*;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(
        "the original size of image {image_id} cannot be generated; serve the original instead"
    )]
    OriginalSizeCannotBeGenerated { image_id: ImageId },
    #[error("source of image {image_id} is unreadable: {reason}")]
    SourceUnreadable { image_id: ImageId, reason: String },
    #[error("deriving '{spec}' from image {image_id} failed: {source}")]
    TransformationFailed {
        image_id: ImageId,
        spec: VariantSpec,
        #[source]
        source: BackendError,
    },
    #[error("invalid variant spec: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error("unknown image {0}")]
    UnknownImage(ImageId),
    #[error("variant store error: {0}")]
    Store(#[from] StoreError),
}

impl From<StorageError> for ProcessError {
    fn from(err: StorageError) -> Self {
        Self::Store(StoreError::Storage(err))
    }
}

impl ProcessError {
    /// Only storage I/O failures are worth retrying; every other error is
    /// deterministic for the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_io())
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;

/// Produces derived variants of uploaded originals, backed by a
/// [`VariantStore`].
pub struct ImageProcessor<B> {
    backend: B,
    storage: Arc<dyn BlobStorage>,
    store: VariantStore,
    counters: CacheCounters,
}

impl<B: ImageBackend> ImageProcessor<B> {
    /// `storage` holds the originals; variants are kept in the same storage
    /// under their own prefix.
    pub fn new(backend: B, storage: Arc<dyn BlobStorage>) -> Self {
        let store = VariantStore::new(Arc::clone(&storage));
        Self {
            backend,
            storage,
            store,
            counters: CacheCounters::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &VariantStore {
        &self.store
    }

    /// Hits and misses since construction.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Return the variant of `record` described by `spec`, deriving and
    /// storing it on a cache miss.
    pub fn get_or_create_variant(&self, record: &ImageRecord, spec: &VariantSpec) -> Result<Variant> {
        let image_id = record.id();
        if spec.is_original {
            return Err(ProcessError::OriginalSizeCannotBeGenerated { image_id });
        }
        spec.validate()?;

        let key = VariantKey::new(image_id, spec.clone());
        if let Some(variant) = self.store.lookup(&key)? {
            debug!(image = %image_id, spec = %spec, "variant cache hit");
            self.counters.hit();
            return Ok(variant);
        }
        debug!(image = %image_id, spec = %spec, "variant cache miss");

        let source = read_original(self.storage.as_ref(), record)?;
        let plan = plan_variant(spec, record.dimensions());
        let rendered = render_variant(&self.backend, &source, &plan).map_err(|source| {
            ProcessError::TransformationFailed {
                image_id,
                spec: spec.clone(),
                source,
            }
        })?;

        let variant = self.store.put(&key, rendered.bytes, rendered.dimensions)?;
        self.counters.miss();
        info!(
            image = %image_id,
            spec = %spec,
            width = variant.width,
            height = variant.height,
            bytes = variant.content.len(),
            "derived variant"
        );
        Ok(variant)
    }

    /// Derive several variants of one record in parallel. Results are in
    /// the same order as `specs`; each spec succeeds or fails on its own.
    pub fn get_or_create_variants(
        &self,
        record: &ImageRecord,
        specs: &[VariantSpec],
    ) -> Vec<Result<Variant>> {
        specs
            .par_iter()
            .map(|spec| self.get_or_create_variant(record, spec))
            .collect()
    }
}
