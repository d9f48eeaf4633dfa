//! Request coordinator
//!
//! Ties the object store, transform engine and derivative cache together for
//! a single image request. The HTTP layer only parses the route and writes
//! whatever [`ImageResponse`] or [`ProxyError`] comes back.
//!
//! Flow for a transformed request:
//!
//! ```text
//! validate spec -> HEAD (version, size) -> derive key -> cache get
//!     hit  -> respond
//!     miss -> put_if_absent(GET if-match -> permit -> transform -> entry)
//! ```
//!
//! Identity requests skip all of that and stream the original through.

use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use crate::cache::{CacheEntry, CacheKey, DerivativeCache};
use crate::config::Config;
use crate::error::ProxyError;
use crate::store::{ByteChunks, ObjectRef, ObjectStore};
use crate::transform::{TransformConfig, TransformEngine, TransformError, TransformSpec};

/// Where a response body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Identity request served straight from the store
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request lifecycle, logged when a request fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Validated,
    CacheLookup,
    Hit,
    Fetching,
    Transforming,
    Storing,
    Completed,
    Failed,
}

impl RequestPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestPhase::Received => "received",
            RequestPhase::Validated => "validated",
            RequestPhase::CacheLookup => "cache_lookup",
            RequestPhase::Hit => "hit",
            RequestPhase::Fetching => "fetching",
            RequestPhase::Transforming => "transforming",
            RequestPhase::Storing => "storing",
            RequestPhase::Completed => "completed",
            RequestPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response payload: a cached derivative or the original still in flight
pub enum ResponseBody {
    Full(Bytes),
    Stream(ByteChunks),
}

impl ResponseBody {
    /// The bytes of a derivative; `None` for a streamed original
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Full(bytes) => Some(bytes),
            ResponseBody::Stream(_) => None,
        }
    }

    /// Next piece of the body, `None` once it is exhausted
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, ProxyError>> {
        match self {
            ResponseBody::Full(bytes) if bytes.is_empty() => None,
            ResponseBody::Full(bytes) => Some(Ok(std::mem::take(bytes))),
            ResponseBody::Stream(chunks) => chunks
                .next()
                .await
                .map(|chunk| chunk.map_err(ProxyError::from)),
        }
    }

    /// Read the whole body into memory
    pub async fn collect(mut self) -> Result<Bytes, ProxyError> {
        if let ResponseBody::Full(bytes) = self {
            return Ok(bytes);
        }
        let mut buffer = Vec::new();
        while let Some(chunk) = self.next_chunk().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buffer))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(bytes) => write!(f, "Full({} bytes)", bytes.len()),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// Everything the HTTP layer needs to answer a successful request
#[derive(Debug)]
pub struct ImageResponse {
    pub body: ResponseBody,
    pub content_length: u64,
    pub content_type: String,
    pub cache_control: String,
    /// Quoted strong ETag
    pub etag: String,
    pub cache_status: CacheStatus,
}

/// Runtime knobs for the coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub transform: TransformConfig,
    pub store_timeout: Duration,
    /// Used when the original carries no Cache-Control
    pub default_cache_control: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            transform: TransformConfig::default(),
            store_timeout: Duration::from_millis(crate::constants::DEFAULT_STORE_TIMEOUT_MS),
            default_cache_control: crate::constants::DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            transform: config.transform.clone(),
            store_timeout: Duration::from_millis(config.store.timeout_ms),
            default_cache_control: config.server.default_cache_control.clone(),
        }
    }
}

/// Orchestrates store, engine and cache for each request
#[derive(Clone)]
pub struct RequestCoordinator {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn TransformEngine>,
    cache: DerivativeCache,
    options: Arc<CoordinatorOptions>,
    transform_permits: Arc<Semaphore>,
}

impl RequestCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn TransformEngine>,
        cache: DerivativeCache,
        options: CoordinatorOptions,
    ) -> Self {
        let permits = options.transform.max_concurrent.max(1);
        Self {
            store,
            engine,
            cache,
            options: Arc::new(options),
            transform_permits: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn cache(&self) -> &DerivativeCache {
        &self.cache
    }

    /// Serve `object_key` with the transform described by `query`
    pub async fn handle(
        &self,
        object_key: &str,
        query: &HashMap<String, String>,
    ) -> Result<ImageResponse, ProxyError> {
        let mut phase = RequestPhase::Received;
        let result = self.run(object_key, query, &mut phase).await;

        if let Err(e) = &result {
            tracing::warn!(
                object_key = %object_key,
                phase = %RequestPhase::Failed,
                failed_at = %phase,
                status = e.to_http_status(),
                error = %e,
                "Image request failed"
            );
        }
        result
    }

    async fn run(
        &self,
        object_key: &str,
        query: &HashMap<String, String>,
        phase: &mut RequestPhase,
    ) -> Result<ImageResponse, ProxyError> {
        let spec = TransformSpec::from_query(query, &self.options.transform)?;
        *phase = RequestPhase::Validated;

        if spec.is_identity() {
            return self.passthrough(object_key, phase).await;
        }

        let metadata = with_timeout("store head", self.options.store_timeout, async {
            self.store.head(object_key).await.map_err(ProxyError::from)
        })
        .await?;
        let cache_control = self.cache_control_for(metadata.cache_control.as_deref());

        // Refuse before downloading anything the engine would reject anyway
        let max_source_bytes = self.options.transform.max_source_bytes;
        if metadata.size > max_source_bytes {
            return Err(TransformError::FileTooLarge {
                size: metadata.size,
                max_size: max_source_bytes,
            }
            .into());
        }

        *phase = RequestPhase::CacheLookup;
        let key = CacheKey::derive(&metadata.object_ref, &spec);

        if let Some(entry) = self.cache.get(&key) {
            *phase = RequestPhase::Hit;
            tracing::debug!(object_key = %object_key, key = %key, "Derivative cache hit");
            return Ok(derivative_response(&entry, cache_control, CacheStatus::Hit));
        }

        *phase = RequestPhase::Fetching;
        let producer = DerivativeProducer {
            coordinator: self.clone(),
            object_ref: metadata.object_ref,
            spec,
            key,
        };
        let entry = self
            .cache
            .put_if_absent(key, move || producer.produce())
            .await?;

        *phase = RequestPhase::Completed;
        Ok(derivative_response(&entry, cache_control, CacheStatus::Miss))
    }

    /// Identity request: one store GET, body streamed, no cache involvement
    async fn passthrough(
        &self,
        object_key: &str,
        phase: &mut RequestPhase,
    ) -> Result<ImageResponse, ProxyError> {
        *phase = RequestPhase::Fetching;
        let object = with_timeout("store get", self.options.store_timeout, async {
            self.store.get(object_key).await.map_err(ProxyError::from)
        })
        .await?;

        *phase = RequestPhase::Completed;
        Ok(ImageResponse {
            etag: format!("\"{}\"", object.metadata.object_ref.version),
            cache_control: self.cache_control_for(object.metadata.cache_control.as_deref()),
            content_type: object.metadata.content_type,
            content_length: object.metadata.size,
            body: ResponseBody::Stream(object.body),
            cache_status: CacheStatus::Bypass,
        })
    }

    fn cache_control_for(&self, source: Option<&str>) -> String {
        match source {
            Some(value) if !value.trim().is_empty() => value.to_string(),
            _ => self.options.default_cache_control.clone(),
        }
    }
}

/// Work unit handed to the derivative cache on a miss
///
/// Runs on a detached task, so it owns everything it touches.
struct DerivativeProducer {
    coordinator: RequestCoordinator,
    object_ref: ObjectRef,
    spec: TransformSpec,
    key: CacheKey,
}

impl DerivativeProducer {
    async fn produce(self) -> Result<CacheEntry, ProxyError> {
        let started = Instant::now();
        let options = &self.coordinator.options;

        let object = with_timeout("store get", options.store_timeout, async {
            self.coordinator
                .store
                .get_version(&self.object_ref)
                .await
                .map_err(ProxyError::from)
        })
        .await?;

        tracing::debug!(
            key = %self.key,
            phase = %RequestPhase::Transforming,
            source_bytes = object.body.len(),
            "Transforming original"
        );

        let timeout = Duration::from_millis(options.transform.timeout_ms);
        let permits = Arc::clone(&self.coordinator.transform_permits);
        let engine = Arc::clone(&self.coordinator.engine);
        let spec = self.spec;
        let body = object.body;

        // Waiting for a slot has its own deadline; the transform clock starts
        // once the engine can actually run
        let permit = with_timeout("transform queue", timeout, async move {
            permits
                .acquire_owned()
                .await
                .map_err(|_| ProxyError::Internal("transform pool closed".to_string()))
        })
        .await?;

        let transformed = with_timeout("transform", timeout, async move {
            // Permit moves into the blocking closure so it stays held
            // until the CPU work actually ends, even after a timeout
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                engine.transform(&body, &spec)
            })
            .await
            .map_err(|e| ProxyError::Internal(format!("transform worker failed: {}", e)))?
            .map_err(ProxyError::from)
        })
        .await?;

        tracing::info!(
            key = %self.key,
            object_key = %self.object_ref.key,
            phase = %RequestPhase::Storing,
            source_size = ?transformed.source_size,
            output_size = ?transformed.output_size,
            output_bytes = transformed.data.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Derivative generated"
        );

        Ok(CacheEntry::new(
            self.key,
            Bytes::from(transformed.data),
            transformed.content_type,
        ))
    }
}

fn derivative_response(
    entry: &CacheEntry,
    cache_control: String,
    cache_status: CacheStatus,
) -> ImageResponse {
    ImageResponse {
        body: ResponseBody::Full(entry.data.clone()),
        content_length: entry.size_bytes,
        content_type: entry.content_type.clone(),
        cache_control,
        etag: entry.etag(),
        cache_status,
    }
}

async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<T, ProxyError>
where
    F: std::future::Future<Output = Result<T, ProxyError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ProxyError::Timeout {
            operation,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
