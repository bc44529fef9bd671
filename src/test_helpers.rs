//! Shared test utilities.
//!
//! Synthetic images are generated in memory so tests need no fixture files:
//!
//! ```rust
//! use crate::test_helpers::sample_jpeg;
//!
//! let bytes = sample_jpeg(200, 150);
//! let info = RustBackend::new().identify(&bytes).unwrap();
//! assert_eq!(info.dimensions.as_tuple(), (200, 150));
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};

/// Encode a gradient JPEG of the given size.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}
