use std::io::Cursor;
use std::time::{Duration, UNIX_EPOCH};

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use super::*;
use crate::foundation::error::DerivaError;
use crate::store::fs::MemoryFs;
use crate::store::kv::{ManualClock, MemoryCache};

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 120, 200, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn dims(bytes: &[u8]) -> (u32, u32) {
    image::load_from_memory(bytes).unwrap().dimensions()
}

fn disk_engine(fs: Arc<MemoryFs>) -> DerivativeEngine {
    DerivativeEngine::new(
        fs,
        Arc::new(RasterCodec::new()),
        CacheBackend::Disk,
        EngineOpts {
            fallbacks: FallbackTable::default(),
            invalidation_interval: 1,
        },
    )
    .unwrap()
}

struct DownCache;

impl KeyValueCache for DownCache {
    fn get(&self, _key: &str) -> DerivaResult<Option<Vec<u8>>> {
        Err(DerivaError::store_unavailable("down"))
    }
    fn set(&self, _key: &str, _value: &[u8]) -> DerivaResult<()> {
        Err(DerivaError::store_unavailable("down"))
    }
    fn expire(&self, _key: &str, _ttl: Duration) -> DerivaResult<()> {
        Err(DerivaError::store_unavailable("down"))
    }
}

#[test]
fn existing_files_pass_through() {
    let fs = Arc::new(MemoryFs::new());
    let bytes = png(8, 8);
    fs.insert_at("a/cat.png", bytes.clone(), UNIX_EPOCH + Duration::from_secs(10));
    let engine = disk_engine(fs);

    let served = engine.serve("/a/cat.png").unwrap();
    assert_eq!(served.body, bytes);
    assert_eq!(served.origin, Origin::File);
    assert_eq!(served.content_type, "image/png");
    assert_eq!(
        served.last_modified,
        Some(UNIX_EPOCH + Duration::from_secs(10))
    );
    assert_eq!(served.etag, etag_for(&bytes));
}

#[test]
fn derivatives_are_materialized_then_served_from_disk() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("cat.png", png(40, 20), UNIX_EPOCH);
    let engine = disk_engine(fs.clone());

    let first = engine.serve("cat_r10x5.png").unwrap();
    assert_eq!(first.origin, Origin::Derived);
    assert_eq!(dims(&first.body), (5, 10));
    assert!(fs.contains("cat_r10x5.png"));

    let second = engine.serve("cat_r10x5.png").unwrap();
    assert_eq!(second.origin, Origin::File);
    assert_eq!(second.body, first.body);
}

#[test]
fn derivatives_report_the_source_modification_time() {
    let fs = Arc::new(MemoryFs::new());
    let source_time = UNIX_EPOCH + Duration::from_secs(5);
    fs.insert_at("cat.png", png(40, 20), source_time);
    let engine = disk_engine(fs.clone());

    let derived = engine.serve("cat_r10.png").unwrap();
    assert_eq!(derived.last_modified, Some(source_time));

    let hit = engine.serve("cat_r10.png").unwrap();
    assert_eq!(hit.origin, Origin::File);
    assert_eq!(hit.last_modified, Some(source_time));

    let from_prefix = engine.serve("cat_r10_q50.png").unwrap();
    assert_eq!(from_prefix.origin, Origin::Derived);
    assert_eq!(from_prefix.last_modified, Some(source_time));
}

#[test]
fn newer_source_forces_recomputation() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("cat.png", png(40, 20), UNIX_EPOCH);
    let engine = disk_engine(fs.clone());
    engine.serve("cat_r10.png").unwrap();

    fs.insert_at(
        "cat.png",
        png(20, 20),
        SystemTime::now() + Duration::from_secs(3600),
    );
    let again = engine.serve("cat_r10.png").unwrap();
    assert_eq!(again.origin, Origin::Derived);
    assert_eq!(dims(&again.body), (10, 10));
}

#[test]
fn store_mode_caches_derivatives_only() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("cat.png", png(16, 16), UNIX_EPOCH);
    let cache = Arc::new(MemoryCache::with_clock(ManualClock::new()));
    let engine = DerivativeEngine::new(
        fs.clone(),
        Arc::new(RasterCodec::new()),
        CacheBackend::Store {
            cache: cache.clone(),
            ttl: Duration::from_secs(60),
        },
        EngineOpts::default(),
    )
    .unwrap();

    assert_eq!(engine.serve("cat.png").unwrap().origin, Origin::File);
    assert!(cache.is_empty());

    let first = engine.serve("cat_r4.png").unwrap();
    assert_eq!(first.origin, Origin::Derived);
    assert!(!fs.contains("cat_r4.png"));

    let hit = engine.serve("cat_r4.png").unwrap();
    assert_eq!(hit.origin, Origin::Cached);
    assert_eq!(hit.body, first.body);
    assert_eq!(hit.last_modified, None);

    cache.clock().advance(Duration::from_secs(60));
    assert_eq!(engine.serve("cat_r4.png").unwrap().origin, Origin::Derived);
}

#[test]
fn unreachable_store_still_serves() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("cat.png", png(16, 16), UNIX_EPOCH);
    let engine = DerivativeEngine::new(
        fs,
        Arc::new(RasterCodec::new()),
        CacheBackend::Store {
            cache: Arc::new(DownCache),
            ttl: Duration::from_secs(60),
        },
        EngineOpts::default(),
    )
    .unwrap();

    let served = engine.serve("cat_r4.png").unwrap();
    assert_eq!(served.origin, Origin::Derived);
    assert_eq!(dims(&served.body), (4, 4));
}

#[test]
fn request_errors_are_classified() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("junk.png", b"not an image".to_vec(), UNIX_EPOCH);
    let engine = disk_engine(fs);

    assert!(matches!(
        engine.serve("../etc/passwd"),
        Err(DerivaError::BadPath(_))
    ));
    assert!(matches!(
        engine.serve("missing_r10.png"),
        Err(DerivaError::NotFound(_))
    ));
    assert!(matches!(
        engine.serve("junk_r10.png"),
        Err(DerivaError::Codec(_))
    ));
}

#[test]
fn oversized_resize_is_refused_and_not_persisted() {
    let fs = Arc::new(MemoryFs::new());
    fs.insert_at("cat.png", png(8, 8), UNIX_EPOCH);
    let engine = disk_engine(fs.clone());

    let err = engine.serve("cat_r4294967295x4294967295.png").unwrap_err();
    assert!(matches!(err, DerivaError::Codec(_)));
    assert!(err.is_not_found());
    assert!(!fs.contains("cat_r4294967295x4294967295.png"));
    assert!(engine.serve("cat_r4.png").is_ok());
}

#[test]
fn interval_must_be_a_power_of_two() {
    let err = DerivativeEngine::new(
        Arc::new(MemoryFs::new()),
        Arc::new(RasterCodec::new()),
        CacheBackend::Disk,
        EngineOpts {
            fallbacks: FallbackTable::empty(),
            invalidation_interval: 6,
        },
    )
    .err()
    .unwrap();
    assert!(matches!(err, DerivaError::ConfigFatal(_)));
}
