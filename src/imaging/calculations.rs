//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions for a fit-inside resize.
///
/// The result preserves the source aspect ratio and fits within `bounds`.
/// Sources that already fit are returned unchanged: variants never upscale.
///
/// # Arguments
/// * `original` - Original image dimensions (width, height)
/// * `bounds` - Bounding box (max width, max height)
///
/// # Returns
/// * `(width, height)` - Output dimensions, each at least 1
pub fn calculate_fit_dimensions(original: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (orig_w, orig_h) = original;
    let (max_w, max_h) = bounds;

    if orig_w <= max_w && orig_h <= max_h {
        return original;
    }

    let ratio = (max_w as f64 / orig_w as f64).min(max_h as f64 / orig_h as f64);
    let w = ((orig_w as f64 * ratio).round() as u32).clamp(1, max_w);
    let h = ((orig_h as f64 * ratio).round() as u32).clamp(1, max_h);
    (w, h)
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Top-left offset of a centered crop box inside the filled image.
pub fn calculate_crop_offset(fill: (u32, u32), crop: (u32, u32)) -> (u32, u32) {
    (
        fill.0.saturating_sub(crop.0) / 2,
        fill.1.saturating_sub(crop.1) / 2,
    )
}
