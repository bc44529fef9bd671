//! Service configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a `config.toml` in the config directory overrides any
//! subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "var/images"        # Blob storage root, relative to the config dir
//!
//! [images]
//! format = "jpeg"            # Default output format for presets
//! quality = 90               # Default encoding quality (1-100)
//!
//! [variants.thumbnail]
//! kind = "crop"              # "crop" fills the box exactly, "resize" fits inside it
//! width = 400
//! height = 500
//! sharpen = true
//!
//! [variants.article]
//! kind = "resize"
//! width = 1400
//! height = 1400
//!
//! [variants.hero]
//! kind = "crop"
//! width = 2080
//! height = 1170
//! format = "webp"            # Per-preset override of [images] format
//! quality = 85               # Per-preset override of [images] quality
//!
//! [locales]
//! required = []              # e.g. ["en_US.UTF-8", "cs_CZ.UTF-8"]
//! documentation_url = "docs/troubleshooting.md#missing-locales"
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"             # tracing filter directive; RUST_LOG wins
//! format = "text"            # "text" or "json"
//! ```
//!
//! The preset name `original` is reserved: it always means the uploaded file
//! itself and is never derived.
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, Quality, Sharpening};
use crate::locale::DEFAULT_DOCUMENTATION_URL;
use crate::types::{SpecError, TransformKind, VariantSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Reserved preset name for the uploaded original.
pub const ORIGINAL_PRESET: &str = "original";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("unknown variant preset '{name}' (available: {available})")]
    UnknownPreset { name: String, available: String },
}

/// Service configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Where originals and variants are stored.
    pub storage: StorageConfig,
    /// Encoding defaults for presets.
    pub images: ImagesConfig,
    /// Named variant presets.
    pub variants: BTreeMap<String, PresetConfig>,
    /// Locales the host must provide.
    pub locales: LocalesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            images: ImagesConfig::default(),
            variants: default_presets(),
            locales: LocalesConfig::default(),
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_presets() -> BTreeMap<String, PresetConfig> {
    BTreeMap::from([
        (
            "thumbnail".to_string(),
            PresetConfig {
                sharpen: true,
                ..PresetConfig::new(TransformKind::Crop, 400, 500)
            },
        ),
        (
            "article".to_string(),
            PresetConfig::new(TransformKind::Resize, 1400, 1400),
        ),
        (
            "hero".to_string(),
            PresetConfig::new(TransformKind::Crop, 2080, 1170),
        ),
    ])
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storage.root must not be empty".into(),
            ));
        }
        validate_quality("images.quality", self.images.quality)?;

        for (name, preset) in &self.variants {
            if name == ORIGINAL_PRESET {
                return Err(ConfigError::Validation(format!(
                    "variants.{ORIGINAL_PRESET} is reserved for the uploaded original"
                )));
            }
            if let Some(quality) = preset.quality {
                validate_quality(&format!("variants.{name}.quality"), quality)?;
            }
            self.spec_for(preset)
                .validate()
                .map_err(|err: SpecError| ConfigError::Validation(format!("variants.{name}: {err}")))?;
        }

        if self.locales.required.iter().any(|l| l.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "locales.required must not contain empty names".into(),
            ));
        }
        if let Err(err) = EnvFilter::try_new(&self.logging.level) {
            return Err(ConfigError::Validation(format!(
                "logging.level '{}' is not a valid filter: {err}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Resolve a preset name to the spec it requests.
    ///
    /// `original` resolves to [`VariantSpec::original`].
    pub fn preset(&self, name: &str) -> Result<VariantSpec, ConfigError> {
        if name == ORIGINAL_PRESET {
            return Ok(VariantSpec::original());
        }
        self.variants
            .get(name)
            .map(|preset| self.spec_for(preset))
            .ok_or_else(|| ConfigError::UnknownPreset {
                name: name.to_string(),
                available: self.preset_names().join(", "),
            })
    }

    /// Every preset name, including `original`, sorted.
    pub fn preset_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variants.keys().map(String::as_str).collect();
        names.push(ORIGINAL_PRESET);
        names.sort_unstable();
        names
    }

    /// Storage root, with relative paths taken from `config_dir`.
    pub fn storage_root(&self, config_dir: &Path) -> PathBuf {
        let root = Path::new(&self.storage.root);
        if root.is_absolute() {
            root.to_path_buf()
        } else {
            config_dir.join(root)
        }
    }

    fn spec_for(&self, preset: &PresetConfig) -> VariantSpec {
        let spec = match preset.kind {
            TransformKind::Resize => VariantSpec::resize(preset.width, preset.height),
            TransformKind::Crop => VariantSpec::crop(preset.width, preset.height),
        }
        .with_format(preset.format.unwrap_or(self.images.format))
        .with_quality(Quality::new(preset.quality.unwrap_or(self.images.quality)));
        if preset.sharpen {
            spec.with_sharpening(Sharpening::light())
        } else {
            spec
        }
    }
}

fn validate_quality(key: &str, quality: u32) -> Result<(), ConfigError> {
    if quality == 0 || quality > 100 {
        return Err(ConfigError::Validation(format!("{key} must be 1-100")));
    }
    Ok(())
}

/// Blob storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "var/images".to_string(),
        }
    }
}

/// Encoding defaults applied to presets that don't set their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub format: OutputFormat,
    /// Encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 90,
        }
    }
}

/// One named variant preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    pub kind: TransformKind,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u32>,
    /// Apply light unsharp masking after the crop.
    #[serde(default)]
    pub sharpen: bool,
}

impl PresetConfig {
    pub fn new(kind: TransformKind, width: u32, height: u32) -> Self {
        Self {
            kind,
            width,
            height,
            format: None,
            quality: None,
            sharpen: false,
        }
    }
}

/// Locales checked at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalesConfig {
    pub required: Vec<String>,
    /// Linked from the missing-locales error.
    pub documentation_url: String,
}

impl Default for LocalesConfig {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            documentation_url: DEFAULT_DOCUMENTATION_URL.to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `newsandmedia_images=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Newsandmedia Images Configuration
# =================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding originals/ and variants/.
# Relative paths are resolved against the directory containing this file.
root = "var/images"

# ---------------------------------------------------------------------------
# Encoding defaults
# ---------------------------------------------------------------------------
[images]
# Output format for presets without their own: jpeg, png, webp or avif.
format = "jpeg"

# Encoding quality (1 = worst, 100 = best). Ignored by lossless formats.
quality = 90

# ---------------------------------------------------------------------------
# Variant presets
# ---------------------------------------------------------------------------
# Each preset names one derived size. "original" is reserved and always
# serves the uploaded file unchanged.
#
#   kind    = "crop" fills the box and center-crops to exactly width x height
#             "resize" fits inside width x height, never upscaling
#   format  = optional, overrides [images] format
#   quality = optional, overrides [images] quality
#   sharpen = light unsharp mask after resampling (default false)

[variants.article]
kind = "resize"
width = 1400
height = 1400
sharpen = false

[variants.hero]
kind = "crop"
width = 2080
height = 1170
sharpen = false

[variants.thumbnail]
kind = "crop"
width = 400
height = 500
sharpen = true

# ---------------------------------------------------------------------------
# Locales
# ---------------------------------------------------------------------------
[locales]
# Locales that must be installed on the host, checked by `check-locales`.
# Example: required = ["en_US.UTF-8", "cs_CZ.UTF-8"]
required = []

# Troubleshooting link included in the missing-locales error.
documentation_url = "docs/troubleshooting.md#missing-locales"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive, e.g. "debug" or "newsandmedia_images=debug".
# The RUST_LOG environment variable takes precedence.
level = "info"

# "text" for humans, "json" for log shippers. Logs always go to stderr.
format = "text"
"##
}
