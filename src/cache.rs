//! Content hashing and cache accounting for derived variants.
//!
//! The variant cache is **content-addressed** on two hashes:
//!
//! - **content hash**: SHA-256 of an original's (or variant's) bytes. Recorded
//!   on upload and re-checked before every derivation, so a corrupted or
//!   swapped original is reported instead of silently producing variants.
//!
//! - **spec fingerprint**: SHA-256 of every [`VariantSpec`] field. Any change
//!   to kind, box, format, quality, or sharpening yields a new fingerprint, and
//!   therefore a different stored variant. Fingerprints name the files in the
//!   variant store, so they must stay stable across releases: bump
//!   [`FINGERPRINT_VERSION`] when the encoding changes.
//!
//! [`CacheCounters`] tracks hits and misses across threads; [`CacheStats`] is
//! the snapshot handed to callers and the CLI.

use crate::types::VariantSpec;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Version tag mixed into every spec fingerprint.
pub const FINGERPRINT_VERSION: u32 = 1;

/// SHA-256 hash of a byte buffer, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of every field of a variant spec.
pub fn hash_variant_spec(spec: &VariantSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"variant\0");
    hasher.update(FINGERPRINT_VERSION.to_le_bytes());
    hasher.update([spec.is_original as u8, spec.kind.tag(), spec.format.tag()]);
    hasher.update(spec.width.to_le_bytes());
    hasher.update(spec.height.to_le_bytes());
    hasher.update(spec.quality.value().to_le_bytes());
    match spec.sharpening {
        Some(sharpening) => {
            hasher.update(b"\x01");
            hasher.update(sharpening.sigma.to_le_bytes());
            hasher.update(sharpening.threshold.to_le_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Thread-safe hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU32,
    misses: AtomicU32,
}

impl CacheCounters {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Summary of cache performance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} derived ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} derived", self.misses)
        }
    }
}
