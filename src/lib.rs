//! # Newsandmedia Images
//!
//! Image variant derivation and caching for the Newsandmedia CMS. Editors
//! upload an original once; templates then ask for named variants
//! (thumbnail, article, hero) which are derived on first request and served
//! from the variant store afterwards.
//!
//! # Architecture
//!
//! ```text
//! upload ──▶ ImageLibrary ──▶ originals/<id>/{file, record.json}
//!
//! request(record, spec) ──▶ ImageProcessor
//!                              │  original marker? ──▶ error
//!                              │  VariantStore::lookup ──hit──▶ variant
//!                              ▼  miss
//!                           ImageBackend (resize / crop)
//!                              │
//!                              ▼
//!                           VariantStore::put ──▶ variants/<id>/<fingerprint>.*
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | `ImageRecord`, `VariantSpec`, `VariantKey`, `Variant` |
//! | [`imaging`] | Backend trait, geometry, and the pure-Rust `image` backend |
//! | [`cache`] | Content hashes, spec fingerprints, hit/miss accounting |
//! | [`storage`] | Blob storage trait with filesystem and in-memory backends |
//! | [`store`] | Variant store: content blob + JSON sidecar per variant |
//! | [`processor`] | `get_or_create_variant` and the error taxonomy |
//! | [`library`] | Upload boundary: originals and their records |
//! | [`locale`] | Startup check that all required locales are installed |
//! | [`config`] | `config.toml` loading, merging, validation, presets |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Original Is Never Derived
//!
//! The uploaded file is the source of truth. Asking the processor for the
//! original-size marker is a caller error
//! ([`processor::ProcessError::OriginalSizeCannotBeGenerated`]); callers serve
//! [`library::ImageLibrary::original_bytes`] instead. Re-encoding the original
//! would lose quality on every request.
//!
//! ## Content-Addressed Variants
//!
//! A variant is stored under the SHA-256 fingerprint of its full spec, so any
//! change to size, format, quality or sharpening addresses a different file.
//! Sidecars carry the content hash, and a lookup only hits when the stored
//! bytes still match it.
//!
//! ## Lock-Free Concurrency
//!
//! Concurrent requests for the same missing variant may each derive it. Every
//! blob is written to a temp file and renamed into place, so readers never see
//! a torn file, and since derivation is deterministic the last writer stores
//! the same bytes as everyone else.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod library;
pub mod locale;
pub mod logging;
pub mod output;
pub mod processor;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
