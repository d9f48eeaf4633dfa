//! Byte-budgeted strict LRU index
//!
//! Not synchronized; the owning cache wraps it in a mutex. Recency is a
//! monotonically increasing tick per access, with a `BTreeMap` from tick to
//! key so the least recently used entry is always the first element.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::entry::CacheEntry;
use super::key::CacheKey;

struct Slot {
    entry: Arc<CacheEntry>,
    tick: u64,
}

/// Outcome of an insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Stored { evicted: u64 },
    /// Entry exceeds the budget or per-entry limit and was not kept
    Rejected,
    /// Key was already present; existing entry left untouched
    Existing,
}

pub struct LruStore {
    entries: HashMap<CacheKey, Slot>,
    order: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    total_bytes: u64,
    max_bytes: u64,
    max_entry_bytes: u64,
}

impl LruStore {
    pub fn new(max_bytes: u64, max_entry_bytes: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            total_bytes: 0,
            max_bytes,
            max_entry_bytes: max_entry_bytes.min(max_bytes),
        }
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let tick = self.bump();
        let slot = self.entries.get_mut(key)?;
        self.order.remove(&slot.tick);
        slot.tick = tick;
        self.order.insert(tick, *key);
        Some(Arc::clone(&slot.entry))
    }

    /// Look up an entry without touching recency
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|slot| Arc::clone(&slot.entry))
    }

    /// Insert a new entry, evicting least recently used entries until the
    /// budget holds
    pub fn insert(&mut self, entry: Arc<CacheEntry>) -> Admission {
        if self.entries.contains_key(&entry.key) {
            return Admission::Existing;
        }
        if entry.size_bytes > self.max_entry_bytes {
            return Admission::Rejected;
        }

        let mut evicted = 0;
        while self.total_bytes + entry.size_bytes > self.max_bytes {
            if !self.evict_one() {
                break;
            }
            evicted += 1;
        }

        let tick = self.bump();
        self.total_bytes += entry.size_bytes;
        self.order.insert(tick, entry.key);
        self.entries.insert(entry.key, Slot { entry, tick });

        Admission::Stored { evicted }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn evict_one(&mut self) -> bool {
        let Some((_, key)) = self.order.pop_first() else {
            return false;
        };
        if let Some(slot) = self.entries.remove(&key) {
            self.total_bytes -= slot.entry.size_bytes;
            tracing::debug!(key = %key, size = slot.entry.size_bytes, "Evicted derivative");
        }
        true
    }

    fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }
}
