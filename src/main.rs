use clap::{Parser, Subcommand};
use newsandmedia_images::config::{self, ServiceConfig};
use newsandmedia_images::imaging::RustBackend;
use newsandmedia_images::library::ImageLibrary;
use newsandmedia_images::locale::{LocaleAvailabilityChecker, SystemLocaleProbe};
use newsandmedia_images::processor::ImageProcessor;
use newsandmedia_images::storage::{BlobStorage, FsBlobStorage};
use newsandmedia_images::types::{ImageId, VariantKey};
use newsandmedia_images::{logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "nm-images")]
#[command(about = "Image variant derivation and caching for the Newsandmedia CMS")]
#[command(long_about = "\
Image variant derivation and caching for the Newsandmedia CMS

Uploaded originals are immutable. Variants (thumbnails, article and hero
sizes) are derived on first request from named presets and cached until the
image is invalidated or removed. The preset 'original' always serves the
uploaded file unchanged.

Storage layout:

  <storage root>/
  ├── originals/<image id>/
  │   ├── <filename>               # Uploaded bytes
  │   └── record.json              # Dimensions, content type, SHA-256
  └── variants/<image id>/
      ├── <fingerprint>.jpg        # Derived variant
      └── <fingerprint>.json       # Spec, hash, dimensions, creation time

Run 'nm-images gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a new original image and print its record
    Upload {
        /// Image file to upload
        file: PathBuf,
    },
    /// Print the record of an uploaded image
    Info {
        /// Image id
        id: ImageId,
    },
    /// Get (or derive) one variant of an image by preset name
    Variant {
        /// Image id
        id: ImageId,
        /// Preset name from [variants], or "original"
        preset: String,
        /// Write the image bytes to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Derive every configured preset of an image in parallel
    Warm {
        /// Image id
        id: ImageId,
    },
    /// Drop every cached variant of an image
    Invalidate {
        /// Image id
        id: ImageId,
    },
    /// Delete an image, its record and all of its variants
    Remove {
        /// Image id
        id: ImageId,
    },
    /// Verify that every required locale is installed
    CheckLocales,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    logging::init_from_config(&config.logging, cli.verbose, cli.json_logs);
    init_thread_pool(&config.processing);

    let checker = LocaleAvailabilityChecker::new(SystemLocaleProbe::new())
        .with_documentation_url(config.locales.documentation_url.clone());
    if matches!(cli.command, Command::CheckLocales) {
        let result = checker.check_all(&config.locales.required);
        output::print_locale_report(&config.locales.required, &result);
        return result.map_err(Into::into);
    }
    checker.check_all(&config.locales.required)?;

    let root = config.storage_root(&cli.config);
    debug!(root = %root.display(), "using storage root");
    let storage: Arc<dyn BlobStorage> = Arc::new(FsBlobStorage::new(root));
    let library = ImageLibrary::new(Arc::clone(&storage));
    let processor = ImageProcessor::new(RustBackend::new(), storage);

    match cli.command {
        Command::Upload { file } => {
            let bytes = std::fs::read(&file)?;
            let filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let record = library.upload(processor.backend(), &filename, &bytes)?;
            output::print_record(&record);
        }
        Command::Info { id } => {
            let record = library.record(id)?;
            let cached = processor.store().list(id)?.len();
            output::print_info(&record, cached);
        }
        Command::Variant { id, preset, out } => {
            let record = library.record(id)?;
            let spec = config.preset(&preset)?;
            if spec.is_original {
                let bytes = library.original_bytes(&record)?;
                write_out(out.as_deref(), &bytes)?;
                output::print_original(&record, out.as_deref());
            } else {
                let before = processor.stats();
                let variant = processor.get_or_create_variant(&record, &spec)?;
                let cached = processor.stats().hits > before.hits;
                write_out(out.as_deref(), &variant.content)?;
                output::print_variant(&preset, &variant, cached, out.as_deref());
            }
        }
        Command::Warm { id } => {
            warm(&config, &library, &processor, id)?;
        }
        Command::Invalidate { id } => {
            library.record(id)?;
            let removed = processor.store().invalidate(id)?;
            output::print_invalidation(id, removed);
        }
        Command::Remove { id } => {
            let removed = library.remove(id)?;
            output::print_removal(id, removed);
        }
        Command::CheckLocales | Command::GenConfig => {}
    }

    Ok(())
}

/// Derive every configured preset, reporting each one. Fails after
/// reporting if any preset failed.
fn warm(
    config: &ServiceConfig,
    library: &ImageLibrary,
    processor: &ImageProcessor<RustBackend>,
    id: ImageId,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = library.record(id)?;
    let names: Vec<&String> = config.variants.keys().collect();
    let specs = names
        .iter()
        .map(|name| config.preset(name))
        .collect::<Result<Vec<_>, _>>()?;

    let was_cached = specs
        .iter()
        .map(|spec| {
            let key = VariantKey::new(id, spec.clone());
            processor.store().lookup(&key).map(|found| found.is_some())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let results = processor.get_or_create_variants(&record, &specs);
    let mut first_error = None;
    for ((name, result), cached) in names.iter().zip(results).zip(was_cached) {
        match result {
            Ok(variant) => output::print_variant(name, &variant, cached, None),
            Err(err) => {
                eprintln!("{name}: {err}");
                first_error.get_or_insert(err);
            }
        }
    }
    output::print_stats(&processor.stats());

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn write_out(out: Option<&Path>, bytes: &[u8]) -> std::io::Result<()> {
    match out {
        Some(path) => std::fs::write(path, bytes),
        None => Ok(()),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
