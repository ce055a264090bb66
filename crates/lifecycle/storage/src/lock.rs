//! Keyed pessimistic locking
//!
//! The engine serializes writes per entity, and the numbering engine
//! per counter scope, through a [`LockManager`]: one async mutex per
//! key, acquired with a bounded timeout. Work on distinct keys never
//! waits on each other.

use crate::{StorageError, StorageResult};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default bound on how long a caller waits for a contended key
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A held keyed lock. Dropping it releases the key.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Hands out one async mutex per key with bounded acquisition.
///
/// Lock entries are created lazily and kept for the lifetime of the
/// manager; the set of keys in practice is bounded by the set of live
/// entities and counter scopes.
pub struct LockManager<K> {
    locks: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

impl<K> LockManager<K>
where
    K: Hash + Eq + Clone + std::fmt::Display,
{
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquire the lock for a key, waiting at most the configured
    /// timeout. Times out with `StorageError::LockTimeout`, which
    /// callers surface as a concurrency conflict rather than hanging.
    pub async fn acquire(&self, key: &K) -> StorageResult<KeyedGuard> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| StorageError::Backend("lock table poisoned".into()))?;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyedGuard { _guard: guard }),
            Err(_) => {
                tracing::warn!(key = %key, timeout_ms = self.timeout.as_millis() as u64, "lock acquisition timed out");
                Err(StorageError::LockTimeout(format!(
                    "could not lock key '{}' within {}ms",
                    key,
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

impl<K> Default for LockManager<K>
where
    K: Hash + Eq + Clone + std::fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}
