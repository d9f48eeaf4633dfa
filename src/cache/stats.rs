//! Cache statistics
//!
//! Counters are lock-free atomics so the hot path never contends on them;
//! `snapshot` produces the serializable view exposed on `/health`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to stay within the byte budget
    pub evictions: u64,
    pub insertions: u64,
    /// Requests that waited on another request's computation
    pub coalesced: u64,
    /// Derivatives served but not stored because they exceed the entry limit
    pub oversized: u64,
    pub current_size_bytes: u64,
    pub current_item_count: u64,
    pub max_size_bytes: u64,
    pub in_flight: u64,
}

impl CacheStats {
    /// hits / (hits + misses), 0.0 with no traffic
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Running counters owned by the cache
#[derive(Debug, Default)]
pub struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    insertions: AtomicU64,
    coalesced: AtomicU64,
    oversized: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversized(&self) {
        self.oversized.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine counters with the size figures only the cache knows
    pub fn snapshot(
        &self,
        current_size_bytes: u64,
        current_item_count: u64,
        max_size_bytes: u64,
        in_flight: u64,
    ) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
            max_size_bytes,
            in_flight,
        }
    }
}
