// src/infrastructure/keyed_lock.rs
//
// Per-key mutual exclusion.
//
// Locks are created lazily per key and pruned once nobody holds or waits
// on them. Release happens on every exit path, including unwinding.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::Arc;

pub struct KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    locks: DashMap<K, Arc<Mutex<()>>>,
}

/// Removes the map entry for `key` once this was the last user of its lock
struct PruneOnExit<'a, K>
where
    K: Eq + Hash + Clone,
{
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
    key: &'a K,
}

impl<K> Drop for PruneOnExit<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.locks
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        // Dropped last, after our Arc and the guard are gone
        let _prune = PruneOnExit {
            locks: &self.locks,
            key,
        };

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock();
        f()
    }

    /// Number of keys currently holding a lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
