//! In-flight derivative registry
//!
//! At most one computation runs per cache key. The first caller (leader)
//! registers a watch channel; later callers (followers) subscribe to it and
//! receive exactly the value the leader publishes, success or failure.
//!
//! The map lock is a plain `parking_lot::Mutex` held only for insert/remove,
//! never across an await point.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::entry::CacheEntry;
use super::key::CacheKey;
use crate::error::ProxyError;

/// Result delivered to every caller of one computation
pub type SharedResult = Result<Arc<CacheEntry>, ProxyError>;

type Outcome = Option<SharedResult>;

#[derive(Debug, Default)]
pub struct InFlightRegistry {
    pending: Mutex<HashMap<CacheKey, watch::Receiver<Outcome>>>,
}

/// Role assigned to a caller by [`InFlightRegistry::acquire`]
pub enum Slot {
    /// Caller must run the computation and publish through the guard
    Leader(LeaderGuard),
    /// Another caller is computing; wait on the receiver
    Follower(Waiter),
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(self: &Arc<Self>, key: CacheKey) -> Slot {
        let mut pending = self.pending.lock();
        if let Some(receiver) = pending.get(&key) {
            return Slot::Follower(Waiter {
                receiver: receiver.clone(),
            });
        }

        let (sender, receiver) = watch::channel(None);
        pending.insert(key, receiver.clone());
        Slot::Leader(LeaderGuard {
            key,
            registry: Arc::clone(self),
            sender,
            receiver,
            published: false,
        })
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    fn release(&self, key: &CacheKey) {
        self.pending.lock().remove(key);
    }
}

/// Follower handle on a leader's computation
pub struct Waiter {
    receiver: watch::Receiver<Outcome>,
}

impl Waiter {
    pub async fn wait(mut self) -> SharedResult {
        match self.receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome
                .clone()
                .unwrap_or_else(|| Err(ProxyError::Internal("empty derivative result".to_string()))),
            Err(_) => Err(ProxyError::Internal(
                "derivative computation ended without a result".to_string(),
            )),
        }
    }
}

/// Held by the leader until it publishes
///
/// Dropping an unpublished guard (panic, cancelled task) releases waiters
/// with an internal error so nobody hangs.
pub struct LeaderGuard {
    key: CacheKey,
    registry: Arc<InFlightRegistry>,
    sender: watch::Sender<Outcome>,
    receiver: watch::Receiver<Outcome>,
    published: bool,
}

impl LeaderGuard {
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// A waiter on this guard's own result
    pub fn waiter(&self) -> Waiter {
        Waiter {
            receiver: self.receiver.clone(),
        }
    }

    /// Deregister the key and hand `result` to every waiter
    ///
    /// Callers store successful entries before publishing so that a request
    /// arriving after deregistration finds the entry in the cache.
    pub fn publish(mut self, result: SharedResult) {
        self.registry.release(&self.key);
        self.sender.send_replace(Some(result));
        self.published = true;
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        tracing::warn!(key = %self.key, "Derivative computation abandoned");
        self.registry.release(&self.key);
        self.sender.send_replace(Some(Err(ProxyError::Internal(
            "derivative computation aborted".to_string(),
        ))));
    }
}
