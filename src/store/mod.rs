//! Object store client boundary
//!
//! The coordinator only sees the [`ObjectStore`] trait:
//! - `S3ObjectStore`: production backend built on aws-sdk-s3
//! - `MemoryObjectStore`: in-process backend with call counters for tests

pub mod config;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use std::fmt;

use crate::error::ProxyError;

pub use config::StoreConfig;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Identifies exactly one immutable byte sequence in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub key: String,
    /// Store-assigned version (ETag without quotes)
    pub version: String,
}

/// Object metadata returned by HEAD and GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub object_ref: ObjectRef,
    pub content_type: String,
    pub cache_control: Option<String>,
    pub size: u64,
}

/// Object bytes plus metadata
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub metadata: ObjectMetadata,
    pub body: Bytes,
}

/// Body chunks as they arrive from the store
pub type ByteChunks = BoxStream<'static, Result<Bytes, StoreError>>;

/// An opened object whose body has not been read yet
pub struct ObjectStream {
    pub metadata: ObjectMetadata,
    pub body: ByteChunks,
}

impl ObjectStream {
    /// Drain the body into one buffer
    pub async fn collect(mut self) -> Result<StoredObject, StoreError> {
        let mut buffer = BytesMut::with_capacity(self.metadata.size as usize);
        while let Some(chunk) = self.body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        let body = buffer.freeze();
        let mut metadata = self.metadata;
        metadata.size = body.len() as u64;
        Ok(StoredObject { metadata, body })
    }
}

impl fmt::Debug for ObjectStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStream")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Object store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// Object was replaced between resolving its version and reading it
    #[error("object {key} no longer matches version {expected}")]
    VersionMismatch { key: String, expected: String },

    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for ProxyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ProxyError::ObjectNotFound(key),
            other => ProxyError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Read access to original objects
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Resolve metadata (including the current version) without the body
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StoreError>;

    /// Open the current version of an object; the body is read lazily
    async fn get(&self, key: &str) -> Result<ObjectStream, StoreError>;

    /// Fetch an object only if it still has the given version
    async fn get_version(&self, object: &ObjectRef) -> Result<StoredObject, StoreError>;
}

/// Strip the quotes S3 puts around ETag values
pub(crate) fn normalize_etag(etag: &str) -> String {
    etag.trim_start_matches("W/").trim_matches('"').to_string()
}
