//! Logging initialization.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats. Library code only emits
//! events; the binary calls [`init_from_config`] once at startup.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging subsystem.
///
/// - `level` is a filter directive such as `info` or `newsandmedia_images=debug`
/// - log output goes to stderr (stdout is reserved for data output)
/// - the `RUST_LOG` environment variable overrides `level`
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section, with CLI flags
/// taking precedence.
pub fn init_from_config(config: &LoggingConfig, verbose_override: bool, json_logs_override: bool) {
    let level = effective_level(config, verbose_override);
    let json_format = json_logs_override || config.format == LogFormat::Json;
    init(level, json_format);
}

fn effective_level(config: &LoggingConfig, verbose: bool) -> &str {
    if verbose { "debug" } else { &config.level }
}
