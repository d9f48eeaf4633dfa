//! Cached derivative

use bytes::Bytes;
use std::time::SystemTime;

use super::key::CacheKey;

/// One stored derivative; immutable once built and shared as `Arc<CacheEntry>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Bytes,
    pub content_type: String,
    pub created_at: SystemTime,
    pub size_bytes: u64,
}

impl CacheEntry {
    pub fn new(key: CacheKey, data: Bytes, content_type: impl Into<String>) -> Self {
        let size_bytes = data.len() as u64;
        Self {
            key,
            data,
            content_type: content_type.into(),
            created_at: SystemTime::now(),
            size_bytes,
        }
    }

    /// Strong ETag for this derivative
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.key.to_hex())
    }
}
