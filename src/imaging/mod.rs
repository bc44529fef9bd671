//! Image processing in pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize** | Lanczos3, fit inside a box, never upscaling |
//! | **Crop** | fill-resize + center crop + optional `unsharpen` |
//! | **Encode** | JPEG, PNG, WebP (lossless), AVIF (rav1e) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Rendered, SourceInfo};
pub use operations::{TransformPlan, plan_variant, render_variant};
pub use params::{CropParams, OutputFormat, Quality, ResizeParams, Sharpening};
pub use rust_backend::RustBackend;
