//! Upload boundary: originals and their records.
//!
//! ```text
//! originals/
//! └── <image id>/
//!     ├── <filename>      # uploaded bytes, never modified
//!     └── record.json     # serialized ImageRecord
//! ```
//!
//! The record is written after the original, so a readable `record.json`
//! always refers to bytes that were fully stored. Removing an image deletes
//! both files and cascades to the variant store.

use crate::cache::hash_bytes;
use crate::imaging::ImageBackend;
use crate::processor::{ProcessError, Result};
use crate::storage::BlobStorage;
use crate::store::{StoreError, VariantStore};
use crate::types::{ImageId, ImageRecord};
use std::sync::Arc;
use tracing::info;

const ORIGINALS_DIR: &str = "originals";
const RECORD_FILE: &str = "record.json";

fn originals_dir(id: ImageId) -> String {
    format!("{ORIGINALS_DIR}/{id}")
}

fn record_key(id: ImageId) -> String {
    format!("{}/{RECORD_FILE}", originals_dir(id))
}

/// Reduce an uploaded filename to a single safe storage key component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `-`, and leading dots are stripped so the name can never be hidden or
/// collide with in-flight temp files.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    match cleaned {
        "" => "original".to_string(),
        RECORD_FILE => format!("original-{RECORD_FILE}"),
        name => name.to_string(),
    }
}

/// Read a record's original bytes and check them against the hash taken at
/// upload.
pub(crate) fn read_original(storage: &dyn BlobStorage, record: &ImageRecord) -> Result<Vec<u8>> {
    let image_id = record.id();
    let bytes =
        storage
            .get(record.source_key())?
            .ok_or_else(|| ProcessError::SourceUnreadable {
                image_id,
                reason: format!("original '{}' is missing from storage", record.source_key()),
            })?;

    let actual = hash_bytes(&bytes);
    if actual != record.content_hash() {
        return Err(ProcessError::SourceUnreadable {
            image_id,
            reason: format!(
                "original '{}' is corrupt: expected sha256 {}, found {}",
                record.source_key(),
                record.content_hash(),
                actual
            ),
        });
    }
    Ok(bytes)
}

/// Stores uploaded originals and hands out their records.
#[derive(Clone)]
pub struct ImageLibrary {
    storage: Arc<dyn BlobStorage>,
    store: VariantStore,
}

impl ImageLibrary {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        let store = VariantStore::new(Arc::clone(&storage));
        Self { storage, store }
    }

    /// Identify and store a new original.
    ///
    /// Data the backend cannot identify is rejected with
    /// [`ProcessError::SourceUnreadable`] before anything is written.
    pub fn upload(
        &self,
        backend: &impl ImageBackend,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImageRecord> {
        let id = ImageId::new();
        if bytes.is_empty() {
            return Err(ProcessError::SourceUnreadable {
                image_id: id,
                reason: format!("upload '{filename}' is empty"),
            });
        }
        let info = backend
            .identify(bytes)
            .map_err(|err| ProcessError::SourceUnreadable {
                image_id: id,
                reason: format!("upload '{filename}' is not a supported image: {err}"),
            })?;

        let source_key = format!("{}/{}", originals_dir(id), sanitize_filename(filename));
        let record = ImageRecord::new(id, filename.to_string(), source_key, &info, bytes);

        let key = record_key(id);
        let json = serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Metadata {
            key: key.clone(),
            source,
        })?;
        self.storage.put_atomic(record.source_key(), bytes)?;
        self.storage.put_atomic(&key, &json)?;

        info!(
            image = %id,
            filename,
            width = info.dimensions.width,
            height = info.dimensions.height,
            content_type = %info.content_type,
            "stored original"
        );
        Ok(record)
    }

    /// Load the record of an uploaded image.
    pub fn record(&self, id: ImageId) -> Result<ImageRecord> {
        let key = record_key(id);
        let raw = self
            .storage
            .get(&key)?
            .ok_or(ProcessError::UnknownImage(id))?;
        let record = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::Metadata { key, source })?;
        Ok(record)
    }

    /// The verified original bytes. This is what callers serve when the
    /// original size is requested.
    pub fn original_bytes(&self, record: &ImageRecord) -> Result<Vec<u8>> {
        read_original(self.storage.as_ref(), record)
    }

    pub fn variant_store(&self) -> &VariantStore {
        &self.store
    }

    /// Delete an image: its variants, its record and its original. Returns
    /// how many variants were removed.
    pub fn remove(&self, id: ImageId) -> Result<usize> {
        if self.storage.get(&record_key(id))?.is_none() {
            return Err(ProcessError::UnknownImage(id));
        }
        let variants = self.store.invalidate(id)?;
        self.storage.remove(&record_key(id))?;
        self.storage.remove_dir(&originals_dir(id))?;
        info!(image = %id, variants, "removed image");
        Ok(variants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Dimensions;
    use crate::imaging::backend::tests::MockBackend;
    use crate::storage::MemoryBlobStorage;
    use crate::types::{VariantKey, VariantSpec};

    fn library() -> (Arc<MemoryBlobStorage>, ImageLibrary) {
        let storage = Arc::new(MemoryBlobStorage::new());
        let library = ImageLibrary::new(storage.clone());
        (storage, library)
    }

    // =========================================================================
    // Filename sanitizing
    // =========================================================================

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_filename("cover-photo_01.jpg"), "cover-photo_01.jpg");
    }

    #[test]
    fn sanitize_drops_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\me\pic.png"), "pic.png");
    }

    #[test]
    fn sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my-photo--1-.jpg");
        assert_eq!(sanitize_filename("žluťoučký.jpg"), "-lu-ou-k-.jpg");
    }

    #[test]
    fn sanitize_strips_leading_dots() {
        assert_eq!(sanitize_filename(".partial-abc"), "partial-abc");
        assert_eq!(sanitize_filename("..."), "original");
        assert_eq!(sanitize_filename(""), "original");
    }

    #[test]
    fn sanitize_avoids_record_file() {
        assert_eq!(sanitize_filename("record.json"), "original-record.json");
    }

    // =========================================================================
    // upload / record
    // =========================================================================

    #[test]
    fn upload_stores_original_and_record() {
        let (storage, library) = library();
        let backend = MockBackend::with_source(1200, 800);

        let record = library.upload(&backend, "cover.jpg", b"jpeg bytes").unwrap();

        assert_eq!(record.filename(), "cover.jpg");
        assert_eq!(record.dimensions(), Dimensions { width: 1200, height: 800 });
        assert_eq!(record.content_type(), "image/jpeg");
        assert_eq!(
            storage.list_dir(&originals_dir(record.id())).unwrap(),
            vec![
                format!("originals/{}/cover.jpg", record.id()),
                format!("originals/{}/record.json", record.id()),
            ]
        );
        assert_eq!(library.record(record.id()).unwrap(), record);
    }

    #[test]
    fn upload_rejects_unidentifiable_data() {
        let (storage, library) = library();
        let backend = MockBackend::new();

        let err = library.upload(&backend, "notes.txt", b"hello").unwrap_err();

        assert!(matches!(err, ProcessError::SourceUnreadable { .. }));
        assert!(err.to_string().contains("notes.txt"));
        assert!(storage.is_empty());
    }

    #[test]
    fn upload_rejects_empty_data() {
        let (_, library) = library();
        let backend = MockBackend::with_source(1, 1);
        let err = library.upload(&backend, "empty.jpg", b"").unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn record_of_unknown_image() {
        let (_, library) = library();
        let id = ImageId::new();
        assert!(matches!(
            library.record(id),
            Err(ProcessError::UnknownImage(unknown)) if unknown == id
        ));
    }

    #[test]
    fn original_bytes_are_verified() {
        let (storage, library) = library();
        let record = library
            .upload(&MockBackend::with_source(10, 10), "a.jpg", b"abc")
            .unwrap();
        assert_eq!(library.original_bytes(&record).unwrap(), b"abc");

        storage.put_atomic(record.source_key(), b"abd").unwrap();
        assert!(matches!(
            library.original_bytes(&record),
            Err(ProcessError::SourceUnreadable { .. })
        ));
    }

    // =========================================================================
    // remove
    // =========================================================================

    #[test]
    fn remove_cascades_to_variants() {
        let (storage, library) = library();
        let record = library
            .upload(&MockBackend::with_source(10, 10), "a.jpg", b"abc")
            .unwrap();
        let key = VariantKey::new(record.id(), VariantSpec::resize(5, 5));
        library
            .variant_store()
            .put(&key, b"small".to_vec(), Dimensions { width: 5, height: 5 })
            .unwrap();

        assert_eq!(library.remove(record.id()).unwrap(), 1);
        assert!(storage.is_empty());
        assert!(matches!(
            library.record(record.id()),
            Err(ProcessError::UnknownImage(_))
        ));
    }

    #[test]
    fn remove_unknown_image_fails() {
        let (_, library) = library();
        assert!(matches!(
            library.remove(ImageId::new()),
            Err(ProcessError::UnknownImage(_))
        ));
    }
}
