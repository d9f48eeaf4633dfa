//! In-memory object store
//!
//! Versions are content hashes, so replacing an object changes its version
//! just like an S3 ETag would. Call counters, injectable latency and an
//! outage switch make it the test double for coordinator tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::{ObjectMetadata, ObjectRef, ObjectStore, ObjectStream, StoreError, StoredObject};

/// Bodies are handed out in slices of this size, like a network read would
const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
    latency_ms: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object, replacing any previous version
    pub fn put(
        &self,
        key: impl Into<String>,
        body: impl Into<Bytes>,
        content_type: impl Into<String>,
        cache_control: Option<&str>,
    ) -> ObjectRef {
        let key = key.into();
        let body = body.into();
        let version = hex::encode(&Sha256::digest(&body)[..8]);
        let object_ref = ObjectRef {
            key: key.clone(),
            version,
        };

        let object = StoredObject {
            metadata: ObjectMetadata {
                object_ref: object_ref.clone(),
                content_type: content_type.into(),
                cache_control: cache_control.map(str::to_string),
                size: body.len() as u64,
            },
            body,
        };
        self.objects.write().insert(key, object);
        object_ref
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make every call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Total store round trips
    pub fn total_calls(&self) -> usize {
        self.head_calls() + self.get_calls()
    }

    async fn simulate_io(&self) -> Result<(), StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        self.lookup(key).map(|object| object.metadata)
    }

    async fn get(&self, key: &str) -> Result<ObjectStream, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let StoredObject { metadata, body } = self.lookup(key)?;
        let chunks: Vec<Result<Bytes, StoreError>> = (0..body.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(body.slice(start..(start + CHUNK_SIZE).min(body.len()))))
            .collect();
        Ok(ObjectStream {
            metadata,
            body: stream::iter(chunks).boxed(),
        })
    }

    async fn get_version(&self, object: &ObjectRef) -> Result<StoredObject, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;
        let stored = self.lookup(&object.key)?;
        if stored.metadata.object_ref.version != object.version {
            return Err(StoreError::VersionMismatch {
                key: object.key.clone(),
                expected: object.version.clone(),
            });
        }
        Ok(stored)
    }
}
