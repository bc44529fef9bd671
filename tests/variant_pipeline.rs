//! End-to-end tests of upload → derive → cache → invalidate on the real
//! `image` backend and filesystem storage.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use newsandmedia_images::imaging::{
    BackendError, CropParams, ImageBackend, OutputFormat, Rendered, ResizeParams, RustBackend,
    SourceInfo,
};
use newsandmedia_images::library::ImageLibrary;
use newsandmedia_images::processor::{ImageProcessor, ProcessError};
use newsandmedia_images::storage::{BlobStorage, FsBlobStorage};
use newsandmedia_images::types::{ImageRecord, VariantSpec};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Real backend that counts transformations.
#[derive(Default)]
struct CountingBackend {
    inner: RustBackend,
    transforms: AtomicUsize,
}

impl CountingBackend {
    fn transforms(&self) -> usize {
        self.transforms.load(Ordering::SeqCst)
    }
}

impl ImageBackend for CountingBackend {
    fn identify(&self, source: &[u8]) -> Result<SourceInfo, BackendError> {
        self.inner.identify(source)
    }

    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<Rendered, BackendError> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        self.inner.resize(source, params)
    }

    fn crop(&self, source: &[u8], params: &CropParams) -> Result<Rendered, BackendError> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        self.inner.crop(source, params)
    }
}

fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new(&mut bytes)
        .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

struct Fixture {
    tmp: TempDir,
    library: ImageLibrary,
    processor: ImageProcessor<CountingBackend>,
    record: ImageRecord,
    original: Vec<u8>,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let storage: Arc<dyn BlobStorage> = Arc::new(FsBlobStorage::new(tmp.path()));
    let library = ImageLibrary::new(Arc::clone(&storage));
    let processor = ImageProcessor::new(CountingBackend::default(), storage);
    let original = sample_jpeg(640, 480);
    let record = library
        .upload(processor.backend(), "newsroom.jpg", &original)
        .unwrap();
    Fixture {
        tmp,
        library,
        processor,
        record,
        original,
    }
}

/// Every file under `dir`, relative to it, sorted.
fn files_under(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            entry
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    files.sort();
    files
}

// =========================================================================
// Upload
// =========================================================================

#[test]
fn upload_records_dimensions_and_type() {
    let fx = fixture();
    assert_eq!(fx.record.dimensions().as_tuple(), (640, 480));
    assert_eq!(fx.record.content_type(), "image/jpeg");
    assert_eq!(fx.library.record(fx.record.id()).unwrap(), fx.record);
    assert_eq!(fx.library.original_bytes(&fx.record).unwrap(), fx.original);
}

#[test]
fn upload_rejects_non_images() {
    let fx = fixture();
    let result = fx
        .library
        .upload(fx.processor.backend(), "notes.txt", b"plain text");
    assert!(matches!(result, Err(ProcessError::SourceUnreadable { .. })));
}

// =========================================================================
// Derivation and caching
// =========================================================================

#[test]
fn crop_produces_exact_box_and_is_cached() {
    let fx = fixture();
    let spec = VariantSpec::crop(400, 500);

    let first = fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();
    let second = fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();

    assert_eq!(first.dimensions().as_tuple(), (400, 500));
    assert_eq!(first.content, second.content);
    assert_eq!(fx.processor.backend().transforms(), 1);

    let decoded = RustBackend::new().identify(&first.content).unwrap();
    assert_eq!(decoded.dimensions.as_tuple(), (400, 500));
}

#[test]
fn resize_fits_inside_box_without_upscaling() {
    let fx = fixture();

    let smaller = fx
        .processor
        .get_or_create_variant(&fx.record, &VariantSpec::resize(320, 320))
        .unwrap();
    assert_eq!(smaller.dimensions().as_tuple(), (320, 240));

    let larger = fx
        .processor
        .get_or_create_variant(&fx.record, &VariantSpec::resize(2000, 2000))
        .unwrap();
    assert_eq!(larger.dimensions().as_tuple(), (640, 480));
}

#[test]
fn output_format_follows_spec() {
    let fx = fixture();
    let spec = VariantSpec::resize(200, 200).with_format(OutputFormat::WebP);

    let variant = fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();

    assert_eq!(variant.mime_type(), "image/webp");
    let decoded = RustBackend::new().identify(&variant.content).unwrap();
    assert_eq!(decoded.content_type, "image/webp");
}

#[test]
fn cache_survives_a_new_processor() {
    let fx = fixture();
    let spec = VariantSpec::crop(100, 100);
    let first = fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();

    let storage: Arc<dyn BlobStorage> = Arc::new(FsBlobStorage::new(fx.tmp.path()));
    let fresh = ImageProcessor::new(CountingBackend::default(), storage);
    let again = fresh.get_or_create_variant(&fx.record, &spec).unwrap();

    assert_eq!(again.content, first.content);
    assert_eq!(fresh.backend().transforms(), 0);
}

#[test]
fn original_is_never_derived() {
    let fx = fixture();
    fx.processor
        .get_or_create_variant(&fx.record, &VariantSpec::resize(100, 100))
        .unwrap();

    let result = fx
        .processor
        .get_or_create_variant(&fx.record, &VariantSpec::original());

    assert!(matches!(
        result,
        Err(ProcessError::OriginalSizeCannotBeGenerated { .. })
    ));
    assert_eq!(fx.processor.backend().transforms(), 1);
}

#[test]
fn corrupted_original_is_reported() {
    let fx = fixture();
    std::fs::write(fx.tmp.path().join(fx.record.source_key()), b"truncated").unwrap();

    let err = fx
        .processor
        .get_or_create_variant(&fx.record, &VariantSpec::crop(10, 10))
        .unwrap_err();

    assert!(matches!(err, ProcessError::SourceUnreadable { .. }));
    assert!(!err.is_retryable());
    assert!(err.to_string().contains(&fx.record.id().to_string()));
}

// =========================================================================
// Concurrency
// =========================================================================

#[test]
fn concurrent_requests_leave_one_entry() {
    let fx = fixture();
    let spec = VariantSpec::crop(300, 200).with_format(OutputFormat::Png);
    let callers = 8;
    let barrier = Barrier::new(callers);

    let contents: Vec<Vec<u8>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..callers)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    fx.processor
                        .get_or_create_variant(&fx.record, &spec)
                        .unwrap()
                        .content
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(contents.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        fx.processor.store().list(fx.record.id()).unwrap(),
        vec![spec.fingerprint()]
    );

    let variants_dir = fx.tmp.path().join("variants").join(fx.record.id().to_string());
    let fp = spec.fingerprint();
    assert_eq!(
        files_under(&variants_dir),
        vec![format!("{fp}.json"), format!("{fp}.png")]
    );
}

#[test]
fn parallel_batch_derives_each_spec_once() {
    let fx = fixture();
    let specs = vec![
        VariantSpec::crop(400, 500),
        VariantSpec::resize(320, 320),
        VariantSpec::crop(200, 100).with_format(OutputFormat::WebP),
    ];

    let results = fx.processor.get_or_create_variants(&fx.record, &specs);

    for (spec, result) in specs.iter().zip(&results) {
        assert_eq!(&result.as_ref().unwrap().spec, spec);
    }
    assert_eq!(fx.processor.backend().transforms(), 3);
    assert_eq!(fx.processor.store().list(fx.record.id()).unwrap().len(), 3);
}

// =========================================================================
// Invalidation and removal
// =========================================================================

#[test]
fn invalidate_then_recompute() {
    let fx = fixture();
    let spec = VariantSpec::crop(400, 500);
    fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();
    fx.processor
        .get_or_create_variant(&fx.record, &VariantSpec::resize(100, 100))
        .unwrap();

    assert_eq!(fx.processor.store().invalidate(fx.record.id()).unwrap(), 2);
    assert!(fx.processor.store().list(fx.record.id()).unwrap().is_empty());

    fx.processor.get_or_create_variant(&fx.record, &spec).unwrap();
    assert_eq!(fx.processor.backend().transforms(), 3);
}

#[test]
fn remove_deletes_everything() {
    let fx = fixture();
    fx.processor
        .get_or_create_variant(&fx.record, &VariantSpec::crop(50, 50))
        .unwrap();

    assert_eq!(fx.library.remove(fx.record.id()).unwrap(), 1);
    assert!(files_under(fx.tmp.path()).is_empty());
}
