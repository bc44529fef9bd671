//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which turns a [`VariantSpec`](crate::types::VariantSpec) into a concrete
//! plan) and the [`backend`](super::backend) (which does the actual pixel
//! work). This separation allows swapping backends (e.g. for testing with a
//! mock) without changing planning logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Sharpening`]: Unsharp-mask parameters (sigma + threshold) for small crops.
//! - [`OutputFormat`]: Encoded format of a derived variant.
//! - [`ResizeParams`]: Fit-inside resize: exact output dimensions, format, quality, sharpening.
//! - [`CropParams`]: Fill-then-centre-crop: fill dimensions, crop box, format, quality, sharpening.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Sharpening parameters for unsharp mask.
///
/// - `sigma`: Standard deviation of the Gaussian blur (higher = more sharpening)
/// - `threshold`: Minimum brightness difference to sharpen (0 = sharpen all pixels)
///
/// Equality and hashing compare the bit pattern of `sigma`, so a sharpening
/// setting can take part in variant cache keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for thumbnails.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

impl PartialEq for Sharpening {
    fn eq(&self, other: &Self) -> bool {
        self.sigma.to_bits() == other.sigma.to_bits() && self.threshold == other.threshold
    }
}

impl Eq for Sharpening {}

impl Hash for Sharpening {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sigma.to_bits().hash(state);
        self.threshold.hash(state);
    }
}

/// Encoded format of a derived variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    /// Lossless WebP; quality is ignored.
    WebP,
    Avif,
}

impl OutputFormat {
    /// File extension used for stored variants.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
        }
    }

    /// Stable tag used when fingerprinting specs. Never reorder.
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Jpeg => 1,
            Self::Png => 2,
            Self::WebP => 3,
            Self::Avif => 4,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        };
        f.write_str(name)
    }
}

/// Parameters for a fit-inside resize. `width`/`height` are the exact
/// output dimensions, already computed from the source aspect ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Applied after resampling.
    pub sharpening: Option<Sharpening>,
}

/// Parameters for a crop operation (fill-resize + center crop).
#[derive(Debug, Clone, PartialEq)]
pub struct CropParams {
    /// Intermediate dimensions that cover the crop box.
    pub fill_width: u32,
    pub fill_height: u32,
    /// Final crop dimensions.
    pub crop_width: u32,
    pub crop_height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn quality_deserialization_clamps() {
        let q: Quality = serde_json::from_str("250").unwrap();
        assert_eq!(q.value(), 100);
    }

    #[test]
    fn sharpening_light_values() {
        let s = Sharpening::light();
        assert_eq!(s.sigma, 0.5);
        assert_eq!(s.threshold, 0);
    }

    #[test]
    fn sharpening_equality_is_bitwise() {
        assert_eq!(Sharpening::light(), Sharpening::light());
        assert_ne!(
            Sharpening::light(),
            Sharpening {
                sigma: 0.75,
                threshold: 0
            }
        );
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::WebP.extension(), "webp");
        assert_eq!(OutputFormat::Avif.mime_type(), "image/avif");
    }

    #[test]
    fn output_format_parses_lowercase() {
        let f: OutputFormat = serde_json::from_str("\"webp\"").unwrap();
        assert_eq!(f, OutputFormat::WebP);
    }
}
