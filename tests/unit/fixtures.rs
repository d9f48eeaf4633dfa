// Shared test images and wiring helpers

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kagami::cache::{CacheConfig, DerivativeCache};
use kagami::coordinator::{CoordinatorOptions, ImageResponse, RequestCoordinator};
use kagami::store::MemoryObjectStore;
use kagami::transform::{
    ImageTransformEngine, TransformConfig, TransformEngine, TransformError, TransformSpec,
    TransformedImage,
};

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut buffer = Cursor::new(Vec::new());
    let img = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img).to_rgb8())
    } else {
        DynamicImage::ImageRgba8(img)
    };
    img.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

/// Body of a derivative response
pub fn bytes(response: &ImageResponse) -> &[u8] {
    response
        .body
        .as_bytes()
        .expect("derivative responses carry a full body")
}

pub fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Real engine wrapped with an invocation counter
pub struct CountingEngine {
    inner: ImageTransformEngine,
    calls: AtomicUsize,
}

impl CountingEngine {
    pub fn new(config: TransformConfig) -> Self {
        Self {
            inner: ImageTransformEngine::new(config),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TransformEngine for CountingEngine {
    fn transform(
        &self,
        data: &[u8],
        spec: &TransformSpec,
    ) -> Result<TransformedImage, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.transform(data, spec)
    }
}

pub struct Harness {
    pub store: Arc<MemoryObjectStore>,
    pub engine: Arc<CountingEngine>,
    pub coordinator: RequestCoordinator,
}

pub fn harness(cache: CacheConfig) -> Harness {
    harness_with(cache, CoordinatorOptions::default())
}

pub fn harness_with(cache: CacheConfig, options: CoordinatorOptions) -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(CountingEngine::new(options.transform.clone()));
    let coordinator = RequestCoordinator::new(
        store.clone(),
        engine.clone(),
        DerivativeCache::new(&cache),
        options,
    );
    Harness {
        store,
        engine,
        coordinator,
    }
}
