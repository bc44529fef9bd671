//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, resize, and crop. Backends work on in-memory bytes:
//! the caller reads the original through blob storage and hands the encoded
//! result back to the variant store.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, everything
//! statically linked into the binary.

use super::params::{CropParams, ResizeParams};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unsupported or unrecognized image format: {0}")]
    UnsupportedFormat(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// What a backend learns about an uploaded original without decoding pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub dimensions: Dimensions,
    /// MIME type of the detected container format, e.g. `image/jpeg`.
    pub content_type: String,
}

/// Encoded output of a backend operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
}

/// Trait for image processing backends.
///
/// Implementations must be deterministic: the same source bytes and params
/// always produce the same output bytes. Concurrent derivations of one
/// variant rely on this to converge on equivalent content.
pub trait ImageBackend: Sync {
    /// Detect format and dimensions.
    fn identify(&self, source: &[u8]) -> Result<SourceInfo, BackendError>;

    /// Execute a fit-inside resize.
    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<Rendered, BackendError>;

    /// Execute a crop operation (fill-resize + center crop).
    fn crop(&self, source: &[u8], params: &CropParams) -> Result<Rendered, BackendError>;
}
