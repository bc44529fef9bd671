//! CLI output formatting.
//!
//! Output is **information-centric**: each command leads with the entity it
//! acted on (image id + filename, or preset name) and shows details as
//! indented context lines.
//!
//! ```text
//! 5d0c9f5e-8a3b-4f65-9d57-2f1a7c3e9b10 cover.jpg
//!     Original: 4000x3000 image/jpeg, 2.4 MB
//!     SHA-256: 9f86d081884c7d65...
//!
//! thumbnail: derived
//!     Spec: crop 400x500 jpeg q90 sharpened
//!     Output: 400x500 image/jpeg, 38.2 KB
//!     Written: thumb.jpg
//! ```
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::cache::CacheStats;
use crate::locale::MissingLocalesError;
use crate::types::{ImageId, ImageRecord, Variant};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte size.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Originals
// ============================================================================

/// Format an uploaded original.
pub fn format_record(record: &ImageRecord) -> Vec<String> {
    let (width, height) = record.dimensions().as_tuple();
    vec![
        format!("{} {}", record.id(), record.filename()),
        format!(
            "{}Original: {}x{} {}, {}",
            indent(1),
            width,
            height,
            record.content_type(),
            format_size(record.byte_size())
        ),
        format!("{}SHA-256: {}", indent(1), record.content_hash()),
        format!(
            "{}Uploaded: {}",
            indent(1),
            record.uploaded_at().format("%Y-%m-%d %H:%M:%S UTC")
        ),
    ]
}

pub fn print_record(record: &ImageRecord) {
    print_lines(format_record(record));
}

/// Format a record followed by how many variants are cached for it.
pub fn format_info(record: &ImageRecord, cached_variants: usize) -> Vec<String> {
    let mut lines = format_record(record);
    lines.push(format!("{}Cached variants: {}", indent(1), cached_variants));
    lines
}

pub fn print_info(record: &ImageRecord, cached_variants: usize) {
    print_lines(format_info(record, cached_variants));
}

/// Format the `original` preset, which serves the upload unchanged.
pub fn format_original(record: &ImageRecord, out: Option<&Path>) -> Vec<String> {
    let (width, height) = record.dimensions().as_tuple();
    let mut lines = vec![
        "original: served as uploaded".to_string(),
        format!(
            "{}Output: {}x{} {}, {}",
            indent(1),
            width,
            height,
            record.content_type(),
            format_size(record.byte_size())
        ),
    ];
    if let Some(path) = out {
        lines.push(format!("{}Written: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_original(record: &ImageRecord, out: Option<&Path>) {
    print_lines(format_original(record, out));
}

// ============================================================================
// Variants
// ============================================================================

/// Format one derived variant. `cached` tells whether it came from the
/// variant store or was derived just now.
pub fn format_variant(preset: &str, variant: &Variant, cached: bool, out: Option<&Path>) -> Vec<String> {
    let status = if cached { "cached" } else { "derived" };
    let mut lines = vec![
        format!("{preset}: {status}"),
        format!("{}Spec: {}", indent(1), variant.spec),
        format!(
            "{}Output: {}x{} {}, {}",
            indent(1),
            variant.width,
            variant.height,
            variant.mime_type(),
            format_size(variant.content.len() as u64)
        ),
    ];
    if let Some(path) = out {
        lines.push(format!("{}Written: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_variant(preset: &str, variant: &Variant, cached: bool, out: Option<&Path>) {
    print_lines(format_variant(preset, variant, cached, out));
}

/// Format a summary of cache activity.
pub fn format_stats(stats: &CacheStats) -> Vec<String> {
    vec![format!("Variants: {}", stats)]
}

pub fn print_stats(stats: &CacheStats) {
    print_lines(format_stats(stats));
}

// ============================================================================
// Invalidation and removal
// ============================================================================

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

pub fn format_invalidation(id: ImageId, removed: usize) -> Vec<String> {
    vec![format!(
        "Invalidated {} variant{} of {}",
        removed,
        plural(removed),
        id
    )]
}

pub fn print_invalidation(id: ImageId, removed: usize) {
    print_lines(format_invalidation(id, removed));
}

pub fn format_removal(id: ImageId, removed: usize) -> Vec<String> {
    vec![
        format!("Removed {}", id),
        format!("{}Variants removed: {}", indent(1), removed),
    ]
}

pub fn print_removal(id: ImageId, removed: usize) {
    print_lines(format_removal(id, removed));
}

// ============================================================================
// Locales
// ============================================================================

/// Format the result of a locale check, one line per required locale.
pub fn format_locale_report(
    required: &[String],
    result: &Result<(), MissingLocalesError>,
) -> Vec<String> {
    let missing: &[String] = match result {
        Ok(()) => &[],
        Err(err) => &err.locales,
    };
    let mut lines = vec!["Locales".to_string()];
    if required.is_empty() {
        lines.push(format!("{}(none required)", indent(1)));
    }
    for locale in required {
        let status = if missing.contains(locale) {
            "missing"
        } else {
            "ok"
        };
        lines.push(format!("{}{}: {}", indent(1), locale, status));
    }
    if let Err(err) = result {
        lines.push(String::new());
        lines.push(format!("See {}", err.documentation_url));
    }
    lines
}

pub fn print_locale_report(required: &[String], result: &Result<(), MissingLocalesError>) {
    print_lines(format_locale_report(required, result));
}
