//! Per-chart-name locking.
//!
//! The chart directory is shared mutable state: the ingest pipeline and the
//! resolver's cache refill both overwrite files in it.  Handlers take the
//! name's lock for the duration of an upload or read so that a refresh and
//! an upload of the same chart cannot interleave their writes.  Locks are
//! created on demand and live only while some request holds them: the map
//! stores weak references and prunes dead entries on every lookup, so
//! probing arbitrary names cannot grow it without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::Mutex as AsyncMutex;

/// On-demand map from chart name to its lock.
#[derive(Debug, Default)]
pub struct NameLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the lock for `name`, creating it when no request currently
    /// holds one.
    ///
    /// The caller holds the returned `Arc` and awaits the mutex itself;
    /// the internal map lock is only held for the lookup.  Entries whose
    /// last holder has gone away are dropped here.
    pub fn for_name(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.retain(|_, weak| weak.strong_count() > 0);

        if let Some(lock) = map.get(name).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        map.insert(name.to_string(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
