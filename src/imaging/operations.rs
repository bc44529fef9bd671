//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take a
//! [`VariantSpec`], compute concrete parameters from the original's
//! dimensions, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend, Rendered};
use super::calculations::{calculate_fill_dimensions, calculate_fit_dimensions};
use super::params::{CropParams, ResizeParams};
use crate::types::{TransformKind, VariantSpec};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// A fully-resolved transformation, ready for a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformPlan {
    Resize(ResizeParams),
    Crop(CropParams),
}

impl TransformPlan {
    /// Dimensions the backend will produce.
    pub fn output_dimensions(&self) -> Dimensions {
        match self {
            Self::Resize(p) => Dimensions {
                width: p.width,
                height: p.height,
            },
            Self::Crop(p) => Dimensions {
                width: p.crop_width,
                height: p.crop_height,
            },
        }
    }
}

/// Plan a variant without executing it.
///
/// `spec` must be a derivable (non-original, validated) spec.
pub fn plan_variant(spec: &VariantSpec, original: Dimensions) -> TransformPlan {
    match spec.kind {
        TransformKind::Resize => {
            let (width, height) =
                calculate_fit_dimensions(original.as_tuple(), (spec.width, spec.height));
            TransformPlan::Resize(ResizeParams {
                width,
                height,
                format: spec.format,
                quality: spec.quality,
                sharpening: spec.sharpening,
            })
        }
        TransformKind::Crop => {
            let (fill_width, fill_height) =
                calculate_fill_dimensions(original.as_tuple(), (spec.width, spec.height));
            TransformPlan::Crop(CropParams {
                fill_width,
                fill_height,
                crop_width: spec.width,
                crop_height: spec.height,
                format: spec.format,
                quality: spec.quality,
                sharpening: spec.sharpening,
            })
        }
    }
}

/// Execute a plan against encoded source bytes.
pub fn render_variant(
    backend: &impl ImageBackend,
    source: &[u8],
    plan: &TransformPlan,
) -> Result<Rendered> {
    match plan {
        TransformPlan::Resize(params) => backend.resize(source, params),
        TransformPlan::Crop(params) => backend.crop(source, params),
    }
}
