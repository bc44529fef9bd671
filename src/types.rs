//! Data model shared by the store, the processor, and the upload boundary.
//!
//! - [`ImageRecord`]: one uploaded original. Immutable; the only source of variants.
//! - [`VariantSpec`]: a requested transformation, or the original marker.
//! - [`VariantKey`]: `(image id, spec)`, the cache key of a derived variant.
//! - [`Variant`]: a derived image as stored in the variant store.

use crate::cache::{hash_bytes, hash_variant_spec};
use crate::imaging::{Dimensions, OutputFormat, Quality, Sharpening, SourceInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Largest width or height a variant may request.
pub const MAX_VARIANT_DIMENSION: u32 = 16_384;

/// Unique identifier of an uploaded original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// An uploaded original image.
///
/// Records are created once by the upload boundary and never mutated, so
/// there are no setters. Removing a record removes all of its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    id: ImageId,
    filename: String,
    /// Blob storage key of the original bytes.
    source_key: String,
    width: u32,
    height: u32,
    content_type: String,
    /// SHA-256 of the original bytes, checked before every derivation.
    content_hash: String,
    byte_size: u64,
    uploaded_at: DateTime<Utc>,
}

impl ImageRecord {
    pub(crate) fn new(
        id: ImageId,
        filename: String,
        source_key: String,
        info: &SourceInfo,
        content: &[u8],
    ) -> Self {
        Self {
            id,
            filename,
            source_key,
            width: info.dimensions.width,
            height: info.dimensions.height,
            content_type: info.content_type.clone(),
            content_hash: hash_bytes(content),
            byte_size: content.len() as u64,
            uploaded_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
}

/// How a variant is derived from the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Fit inside `width` x `height`, preserving aspect ratio. Never upscales.
    Resize,
    /// Cover `width` x `height`, then center-crop to exactly that box.
    Crop,
}

impl TransformKind {
    /// Stable tag used when fingerprinting specs. Never reorder.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Resize => 1,
            Self::Crop => 2,
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resize => f.write_str("resize"),
            Self::Crop => f.write_str("crop"),
        }
    }
}

/// Invalid variant request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("variant dimensions must be non-zero, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("variant dimensions {width}x{height} exceed the {max}px limit")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// A requested transformation of an original.
///
/// Two specs address the same cached variant iff every field matches.
/// [`VariantSpec::original`] is the marker for "the original itself"; it is
/// never derived, and the processor rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariantSpec {
    pub kind: TransformKind,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpening: Option<Sharpening>,
    #[serde(default)]
    pub is_original: bool,
}

impl VariantSpec {
    fn new(kind: TransformKind, width: u32, height: u32) -> Self {
        Self {
            kind,
            width,
            height,
            format: OutputFormat::default(),
            quality: Quality::default(),
            sharpening: None,
            is_original: false,
        }
    }

    /// Fit inside `width` x `height`.
    pub fn resize(width: u32, height: u32) -> Self {
        Self::new(TransformKind::Resize, width, height)
    }

    /// Fill and center-crop to exactly `width` x `height`.
    pub fn crop(width: u32, height: u32) -> Self {
        Self::new(TransformKind::Crop, width, height)
    }

    /// The original-size marker.
    pub fn original() -> Self {
        Self {
            is_original: true,
            ..Self::new(TransformKind::Resize, 0, 0)
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_sharpening(mut self, sharpening: Sharpening) -> Self {
        self.sharpening = Some(sharpening);
        self
    }

    /// Check that a derivable spec requests a sane box. The original marker
    /// is always valid.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.is_original {
            return Ok(());
        }
        if self.width == 0 || self.height == 0 {
            return Err(SpecError::ZeroDimension {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_VARIANT_DIMENSION || self.height > MAX_VARIANT_DIMENSION {
            return Err(SpecError::TooLarge {
                width: self.width,
                height: self.height,
                max: MAX_VARIANT_DIMENSION,
            });
        }
        Ok(())
    }

    /// Stable SHA-256 hex digest of every field, used in storage keys.
    pub fn fingerprint(&self) -> String {
        hash_variant_spec(self)
    }
}

impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_original {
            return f.write_str("original");
        }
        write!(
            f,
            "{} {}x{} {} q{}",
            self.kind,
            self.width,
            self.height,
            self.format,
            self.quality.value()
        )?;
        if self.sharpening.is_some() {
            f.write_str(" sharpened")?;
        }
        Ok(())
    }
}

/// Cache key of a derived variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub image_id: ImageId,
    pub spec: VariantSpec,
}

impl VariantKey {
    pub fn new(image_id: ImageId, spec: VariantSpec) -> Self {
        Self { image_id, spec }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.image_id, self.spec)
    }
}

/// A derived image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub image_id: ImageId,
    pub spec: VariantSpec,
    pub content: Vec<u8>,
    /// SHA-256 of `content`.
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
}

impl Variant {
    pub fn key(&self) -> VariantKey {
        VariantKey::new(self.image_id, self.spec.clone())
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.spec.format.mime_type()
    }
}
