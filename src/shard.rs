use crate::stats::{ShardOps, ShardStats};
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// A single shard containing a HashMap protected by a read-write lock.
///
/// Storage is only reachable through [`Shard::read`] and [`Shard::write`],
/// whose guards release the lock when dropped, on every return path and
/// during unwinding. `parking_lot` locks do not poison, so a panicking
/// callback leaves the shard usable for later callers.
pub(crate) struct Shard<K, V> {
    map: RwLock<HashMap<K, Arc<V>>>,
    stats: ShardStats,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq,
{
    pub fn new(capacity: Option<usize>) -> Self {
        let map = match capacity {
            Some(capacity) => HashMap::with_capacity(capacity),
            None => HashMap::new(),
        };
        Self {
            map: RwLock::new(map),
            stats: ShardStats::new(),
        }
    }

    /// Acquire the shared lock.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Arc<V>>> {
        let guard = self.map.read();
        self.stats.record_lock_acquisition();
        guard
    }

    /// Acquire the exclusive lock.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Arc<V>>> {
        let guard = self.map.write();
        self.stats.record_lock_acquisition();
        guard
    }

    /// Insert or overwrite, returning the previous value if any.
    pub fn set(&self, key: K, value: V) -> Option<Arc<V>> {
        let previous = self.write().insert(key, Arc::new(value));
        self.stats.record_write();
        previous
    }

    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.read().get(key).cloned();
        self.stats.record_read();
        value
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let found = self.read().contains_key(key);
        self.stats.record_read();
        found
    }

    /// Insert only if the key is absent. Check and insert share one lock hold.
    pub fn set_if_absent(&self, key: K, value: V) -> bool {
        match self.write().entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(value));
                self.stats.record_write();
                true
            }
        }
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.write().remove(key);
        if removed.is_some() {
            self.stats.record_remove();
        }
        removed
    }

    /// Read, decide, and store under a single exclusive lock hold.
    pub fn upsert<F>(&self, key: K, value: V, f: F) -> Arc<V>
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        let mut map = self.write();
        let stored = match map.entry(key) {
            Entry::Occupied(mut slot) => {
                let next = Arc::new(f(Some(slot.get().as_ref()), value));
                slot.insert(Arc::clone(&next));
                next
            }
            Entry::Vacant(slot) => {
                let next = Arc::new(f(None, value));
                slot.insert(Arc::clone(&next));
                next
            }
        };
        self.stats.record_write();
        stored
    }

    /// Remove when the callback agrees and the key exists. The callback's
    /// answer is returned whether or not anything was removed.
    pub fn remove_if<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&Q, Option<&V>) -> bool,
    {
        let mut map = self.write();
        let should_remove = f(key, map.get(key).map(Arc::as_ref));
        if should_remove && map.remove(key).is_some() {
            self.stats.record_remove();
        }
        should_remove
    }

    /// Get the number of entries in this shard.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn clear(&self) {
        let mut map = self.write();
        let removed = map.len();
        map.clear();
        for _ in 0..removed {
            self.stats.record_remove();
        }
    }

    /// Get a snapshot of statistics for this shard.
    pub fn stats(&self) -> ShardOps {
        self.stats.snapshot()
    }
}

impl<K, V> Default for Shard<K, V>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new(None)
    }
}
