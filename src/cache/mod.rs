//! Derivative cache
//!
//! In-process, write-once store for transformed images:
//! - `key`: SHA-256 cache key over (object key, version, normalized spec)
//! - `lru`: strict LRU index with a total byte budget
//! - `inflight`: at most one computation per key (singleflight)
//! - `stats`: hit/miss/eviction counters
//!
//! Entries are never mutated; a changed original produces a new version and
//! therefore a new key, and the stale derivative ages out through LRU.

pub mod config;
pub mod entry;
pub mod inflight;
pub mod key;
pub mod lru;
pub mod stats;

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::error::ProxyError;

pub use config::CacheConfig;
pub use entry::CacheEntry;
pub use inflight::{InFlightRegistry, SharedResult, Slot};
pub use key::CacheKey;
pub use lru::{Admission, LruStore};
pub use stats::{CacheStats, CacheStatsTracker};

/// Byte-budgeted LRU cache with per-key computation coalescing
#[derive(Clone)]
pub struct DerivativeCache {
    entries: Arc<Mutex<LruStore>>,
    in_flight: Arc<InFlightRegistry>,
    stats: Arc<CacheStatsTracker>,
}

impl DerivativeCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruStore::new(
                config.max_bytes,
                config.max_entry_bytes,
            ))),
            in_flight: Arc::new(InFlightRegistry::new()),
            stats: Arc::new(CacheStatsTracker::new()),
        }
    }

    /// Look up a derivative; a hit becomes the most recently used entry
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let found = self.entries.lock().get(key);
        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Return the entry for `key`, computing it with `producer` if needed
    ///
    /// Concurrent callers for the same key share one run of `producer`,
    /// which executes on a detached task so that a caller going away never
    /// cancels work other callers are waiting on. Failures are delivered to
    /// every waiter and are not remembered.
    pub async fn put_if_absent<F, Fut>(&self, key: CacheKey, producer: F) -> SharedResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CacheEntry, ProxyError>> + Send + 'static,
    {
        let existing = self.entries.lock().peek(&key);
        if let Some(entry) = existing {
            return Ok(entry);
        }

        let guard = match self.in_flight.acquire(key) {
            Slot::Follower(waiter) => {
                self.stats.record_coalesced();
                tracing::debug!(key = %key, "Waiting on in-flight derivative");
                return waiter.wait().await;
            }
            Slot::Leader(guard) => guard,
        };

        // A previous leader may have stored and released between the peek
        // and the acquire above
        let stored = self.entries.lock().peek(&key);
        if let Some(entry) = stored {
            guard.publish(Ok(entry.clone()));
            return Ok(entry);
        }

        let waiter = guard.waiter();
        let cache = self.clone();
        tokio::spawn(async move {
            let result = producer().await.map(|entry| cache.admit(entry));
            guard.publish(result);
        });

        waiter.wait().await
    }

    /// Insert a freshly computed entry; oversized entries are returned but
    /// not kept
    fn admit(&self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        let admission = self.entries.lock().insert(Arc::clone(&entry));
        match admission {
            Admission::Stored { evicted } => {
                self.stats.record_insertion();
                self.stats.record_evictions(evicted);
            }
            Admission::Rejected => {
                self.stats.record_oversized();
                tracing::debug!(
                    key = %entry.key,
                    size = entry.size_bytes,
                    "Derivative too large to cache"
                );
            }
            Admission::Existing => {}
        }
        entry
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        let (bytes, count, budget) = {
            let entries = self.entries.lock();
            (
                entries.total_bytes(),
                entries.len() as u64,
                entries.max_bytes(),
            )
        };
        self.stats
            .snapshot(bytes, count, budget, self.in_flight.len() as u64)
    }
}
