//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::with_guessed_format` + `into_dimensions` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Crop | `resize_exact` to the fill size, then `crop_imm` at the center |
//! | Sharpening | `image::DynamicImage::unsharpen`, after resize or crop |
//! | Encode | JPEG (quality), PNG, lossless WebP, AVIF (rav1e, speed 6) |

use super::backend::{BackendError, Dimensions, ImageBackend, Rendered, SourceInfo};
use super::calculations::calculate_crop_offset;
use super::params::{CropParams, OutputFormat, Quality, ResizeParams, Sharpening};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Input formats whose decoders are compiled in.
///
/// AVIF is deliberately excluded: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e), so AVIF is an output-only format here.
const DECODABLE_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::WebP,
];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn guess_format(source: &[u8]) -> Result<ImageFormat, BackendError> {
    let format = image::guess_format(source)
        .map_err(|e| BackendError::UnsupportedFormat(e.to_string()))?;
    if !DECODABLE_FORMATS.contains(&format) {
        return Err(BackendError::UnsupportedFormat(format!("{format:?}")));
    }
    Ok(format)
}

/// Decode an in-memory image.
fn load_image(source: &[u8]) -> Result<DynamicImage, BackendError> {
    let format = guess_format(source)?;
    image::load_from_memory_with_format(source, format)
        .map_err(|e| BackendError::Decode(e.to_string()))
}

/// Encode a DynamicImage in the requested format.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(
                &mut buf,
                quality.value() as u8,
            ))
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut buf)),
        OutputFormat::WebP => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut buf))
        }
        OutputFormat::Avif => img.write_with_encoder(AvifEncoder::new_with_speed_quality(
            &mut buf,
            6,
            quality.value() as u8,
        )),
    };
    result.map_err(|e| BackendError::Encode(format!("{format}: {e}")))?;
    Ok(buf)
}

fn sharpen(img: DynamicImage, sharpening: Option<Sharpening>) -> DynamicImage {
    match sharpening {
        Some(sharpening) => img.unsharpen(sharpening.sigma, sharpening.threshold),
        None => img,
    }
}

fn rendered(img: &DynamicImage, bytes: Vec<u8>) -> Rendered {
    Rendered {
        bytes,
        dimensions: Dimensions {
            width: img.width(),
            height: img.height(),
        },
    }
}

impl ImageBackend for RustBackend {
    fn identify(&self, source: &[u8]) -> Result<SourceInfo, BackendError> {
        let format = guess_format(source)?;
        let (width, height) = ImageReader::with_format(Cursor::new(source), format)
            .into_dimensions()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(SourceInfo {
            dimensions: Dimensions { width, height },
            content_type: format.to_mime_type().to_string(),
        })
    }

    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<Rendered, BackendError> {
        let img = load_image(source)?;
        let resized = if (img.width(), img.height()) == (params.width, params.height) {
            img
        } else {
            img.resize_exact(params.width, params.height, FilterType::Lanczos3)
        };
        let final_img = sharpen(resized, params.sharpening);
        let bytes = encode_image(&final_img, params.format, params.quality)?;
        Ok(rendered(&final_img, bytes))
    }

    fn crop(&self, source: &[u8], params: &CropParams) -> Result<Rendered, BackendError> {
        let img = load_image(source)?;

        // Fill-resize then center-crop to exact dimensions
        let filled = img.resize_exact(params.fill_width, params.fill_height, FilterType::Lanczos3);
        let (x, y) = calculate_crop_offset(
            (params.fill_width, params.fill_height),
            (params.crop_width, params.crop_height),
        );
        let cropped = filled.crop_imm(x, y, params.crop_width, params.crop_height);

        let final_img = sharpen(cropped, params.sharpening);

        let bytes = encode_image(&final_img, params.format, params.quality)?;
        Ok(rendered(&final_img, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_jpeg;

    #[test]
    fn identify_synthetic_jpeg() {
        let backend = RustBackend::new();
        let info = backend.identify(&sample_jpeg(200, 150)).unwrap();
        assert_eq!(info.dimensions, Dimensions { width: 200, height: 150 });
        assert_eq!(info.content_type, "image/jpeg");
    }

    #[test]
    fn identify_garbage_errors() {
        let backend = RustBackend::new();
        let result = backend.identify(b"definitely not an image");
        assert!(matches!(result, Err(BackendError::UnsupportedFormat(_))));
    }

    #[test]
    fn resize_synthetic_to_jpeg() {
        let backend = RustBackend::new();
        let rendered = backend
            .resize(
                &sample_jpeg(400, 300),
                &ResizeParams {
                    width: 200,
                    height: 150,
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(85),
                    sharpening: None,
                },
            )
            .unwrap();

        assert_eq!(rendered.dimensions, Dimensions { width: 200, height: 150 });
        let info = backend.identify(&rendered.bytes).unwrap();
        assert_eq!(info.dimensions, Dimensions { width: 200, height: 150 });
    }

    #[test]
    fn resize_to_png_and_webp() {
        let backend = RustBackend::new();
        let source = sample_jpeg(120, 80);
        for (format, mime) in [
            (OutputFormat::Png, "image/png"),
            (OutputFormat::WebP, "image/webp"),
        ] {
            let rendered = backend
                .resize(
                    &source,
                    &ResizeParams {
                        width: 60,
                        height: 40,
                        format,
                        quality: Quality::default(),
                        sharpening: None,
                    },
                )
                .unwrap();
            assert_eq!(backend.identify(&rendered.bytes).unwrap().content_type, mime);
        }
    }

    #[test]
    fn resize_to_avif_produces_bytes() {
        let backend = RustBackend::new();
        let rendered = backend
            .resize(
                &sample_jpeg(64, 48),
                &ResizeParams {
                    width: 32,
                    height: 24,
                    format: OutputFormat::Avif,
                    quality: Quality::new(80),
                    sharpening: None,
                },
            )
            .unwrap();
        assert!(!rendered.bytes.is_empty());
    }

    #[test]
    fn resize_is_deterministic() {
        let backend = RustBackend::new();
        let source = sample_jpeg(300, 200);
        let params = ResizeParams {
            width: 150,
            height: 100,
            format: OutputFormat::Jpeg,
            quality: Quality::new(80),
            sharpening: None,
        };
        let a = backend.resize(&source, &params).unwrap();
        let b = backend.resize(&source, &params).unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn resize_applies_sharpening() {
        let backend = RustBackend::new();
        let source = sample_jpeg(300, 200);
        let plain = ResizeParams {
            width: 150,
            height: 100,
            format: OutputFormat::Png,
            quality: Quality::default(),
            sharpening: None,
        };
        let sharp = ResizeParams {
            sharpening: Some(Sharpening::light()),
            ..plain.clone()
        };

        let plain = backend.resize(&source, &plain).unwrap();
        let sharp = backend.resize(&source, &sharp).unwrap();

        assert_eq!(sharp.dimensions, plain.dimensions);
        assert_ne!(sharp.bytes, plain.bytes);
    }

    #[test]
    fn resize_truncated_source_errors() {
        let backend = RustBackend::new();
        let mut source = sample_jpeg(100, 100);
        source.truncate(40);
        let result = backend.resize(
            &source,
            &ResizeParams {
                width: 50,
                height: 50,
                format: OutputFormat::Jpeg,
                quality: Quality::default(),
                sharpening: None,
            },
        );
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn crop_synthetic_exact_dimensions() {
        let backend = RustBackend::new();
        let rendered = backend
            .crop(
                &sample_jpeg(800, 600),
                &CropParams {
                    fill_width: 667,
                    fill_height: 500,
                    crop_width: 400,
                    crop_height: 500,
                    format: OutputFormat::Jpeg,
                    quality: Quality::new(85),
                    sharpening: Some(Sharpening::light()),
                },
            )
            .unwrap();

        assert_eq!(rendered.dimensions, Dimensions { width: 400, height: 500 });
        let info = backend.identify(&rendered.bytes).unwrap();
        assert_eq!(info.dimensions, Dimensions { width: 400, height: 500 });
    }

    #[test]
    fn crop_synthetic_without_sharpening() {
        let backend = RustBackend::new();
        let rendered = backend
            .crop(
                &sample_jpeg(400, 300),
                &CropParams {
                    fill_width: 267,
                    fill_height: 200,
                    crop_width: 200,
                    crop_height: 200,
                    format: OutputFormat::Png,
                    quality: Quality::default(),
                    sharpening: None,
                },
            )
            .unwrap();
        assert_eq!(rendered.dimensions, Dimensions { width: 200, height: 200 });
    }
}
