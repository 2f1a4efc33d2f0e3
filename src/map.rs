use crate::config::{create_hasher, Config, RoutingConfig};
use crate::error::Error;
use crate::hash::ShardHasher;
use crate::iter::Iter;
use crate::reentrancy::{self, CallbackScope};
use crate::scan;
use crate::shard::Shard;
use crate::stats::{ShardOps, Stats};
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent map partitioned into independently locked shards.
///
/// Every key is routed to exactly one shard by hashing it, and each
/// operation only ever holds that shard's reader-writer lock. Operations on
/// keys in different shards never block each other. Values are wrapped in
/// `Arc<T>` so reads can share them without copying.
///
/// Single-key operations are linearizable per key. Whole-map views
/// (`count`, `keys`, `values`, `iterate`) read each shard independently and
/// are not atomic snapshots while writers are active.
///
/// # Example
///
/// ```rust
/// use cmap::ConcurrentMap;
///
/// let map = ConcurrentMap::new(10)?;
/// map.set("a", "b");
/// assert_eq!(*map.get("a").unwrap(), "b");
/// # Ok::<(), cmap::Error>(())
/// ```
pub struct ConcurrentMap<K, V> {
    shards: Arc<[Shard<K, V>]>,
    hash: ShardHasher,
    routing: RoutingConfig,
    id: usize,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    /// Create a map with `shard_count` shards and FNV-1a routing.
    ///
    /// Fails with [`Error::InvalidShardCount`] when `shard_count` is 0.
    pub fn new(shard_count: usize) -> Result<Self, Error> {
        Ok(Self::with_config(Config::new().shard_count(shard_count)?))
    }

    /// Create a map from a config. The config's setters already rejected a
    /// zero shard count, so this cannot fail.
    pub fn with_config(config: Config) -> Self {
        debug_assert!(config.shard_count > 0);
        let shards: Arc<[Shard<K, V>]> = (0..config.shard_count)
            .map(|_| Shard::new(config.capacity_per_shard))
            .collect();

        tracing::debug!(
            shard_count = config.shard_count,
            hash_function = ?config.hash_function,
            routing = ?config.routing,
            "created concurrent map"
        );

        Self {
            shards,
            hash: create_hasher(config.hash_function),
            routing: config.routing,
            id: reentrancy::next_map_id(),
        }
    }

    /// Number of shards, fixed at construction.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Figure out which shard this key belongs to.
    #[inline]
    fn shard_index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let hash = self.hash.hash_key(key);
        self.routing.route(hash, self.shards.len())
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        reentrancy::check(self.id);
        &self.shards[self.shard_index(key)]
    }

    /// Insert or overwrite a value. Returns the previous value if the key existed.
    ///
    /// ```rust
    /// use cmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new(4)?;
    /// assert!(map.set("key", "value").is_none());
    /// assert_eq!(*map.set("key", "new_value").unwrap(), "value");
    /// # Ok::<(), cmap::Error>(())
    /// ```
    pub fn set(&self, key: K, value: V) -> Option<Arc<V>> {
        self.shard(&key).set(key, value)
    }

    /// Apply [`set`](Self::set) to every entry in turn.
    ///
    /// There is no atomicity across entries: other writers may interleave
    /// between any two of them.
    pub fn set_many<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Get a value by key. `None` means the key is not present.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).get(key)
    }

    /// Check if a key exists without cloning the value.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).contains_key(key)
    }

    /// Insert `value` only if `key` is absent. Returns `true` iff it inserted.
    ///
    /// ```rust
    /// use cmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new(4)?;
    /// assert!(map.set_if_absent("a", "b"));
    /// assert!(!map.set_if_absent("a", "c"));
    /// assert_eq!(*map.get("a").unwrap(), "b");
    /// # Ok::<(), cmap::Error>(())
    /// ```
    pub fn set_if_absent(&self, key: K, value: V) -> bool {
        self.shard(&key).set_if_absent(key, value)
    }

    /// Remove a key, returning its value if it existed.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).remove(key)
    }

    /// Insert or update through a callback, atomically for this key.
    ///
    /// Under the shard's write lock, `f` is called exactly once with the
    /// current value (`None` if absent) and `value`; whatever it returns is
    /// stored and handed back.
    ///
    /// `f` runs with the shard locked. It must not block on outside work,
    /// and calling back into this map from `f` panics.
    ///
    /// ```rust
    /// use cmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new(4)?;
    /// let sum = |old: Option<&i32>, new: i32| old.map_or(new, |old| old + new);
    /// assert_eq!(*map.upsert("x", 5, sum), 5);
    /// assert_eq!(*map.upsert("x", 3, sum), 8);
    /// # Ok::<(), cmap::Error>(())
    /// ```
    pub fn upsert<F>(&self, key: K, value: V, f: F) -> Arc<V>
    where
        F: FnOnce(Option<&V>, V) -> V,
    {
        let shard = self.shard(&key);
        let _scope = CallbackScope::enter(self.id);
        shard.upsert(key, value, f)
    }

    /// Remove `key` if `f` says so, atomically for this key.
    ///
    /// `f` receives the key and its current value (`None` if absent). The
    /// entry is removed only when `f` returns `true` and the key existed,
    /// but `f`'s answer is returned either way, including for a key that
    /// was never present.
    ///
    /// The same locking rules as [`upsert`](Self::upsert) apply to `f`.
    pub fn remove_if<Q, F>(&self, key: &Q, f: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&Q, Option<&V>) -> bool,
    {
        let shard = self.shard(key);
        let _scope = CallbackScope::enter(self.id);
        shard.remove_if(key, f)
    }

    /// Get the total number of entries across all shards.
    ///
    /// Each shard is read under its own shared lock, one after another, so
    /// the total is not a snapshot while writers are active.
    pub fn count(&self) -> usize {
        reentrancy::check(self.id);
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Remove every entry, one shard at a time.
    pub fn clear(&self) {
        reentrancy::check(self.id);
        for shard in self.shards.iter() {
            shard.clear();
        }
    }

    /// All keys, scanned in parallel. Order is unspecified.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        reentrancy::check(self.id);
        scan::keys(&self.shards)
    }

    /// All values, scanned in parallel. Order is unspecified.
    pub fn values(&self) -> Vec<Arc<V>> {
        reentrancy::check(self.id);
        scan::values(&self.shards)
    }

    /// Lazily iterate over all entries.
    ///
    /// Every call starts a fresh scan: one producer per shard streams
    /// entries into a queue the returned iterator drains. Entries written
    /// or removed while the scan runs may or may not show up.
    ///
    /// ```rust
    /// use cmap::ConcurrentMap;
    ///
    /// let map = ConcurrentMap::new(4)?;
    /// map.set("key1", "value1");
    /// map.set("key2", "value2");
    /// assert_eq!(map.iterate().count(), 2);
    /// # Ok::<(), cmap::Error>(())
    /// ```
    pub fn iterate(&self) -> Iter<K, V>
    where
        K: Clone + 'static,
        V: 'static,
    {
        reentrancy::check(self.id);
        Iter::spawn(Arc::clone(&self.shards))
    }

    /// Visit every entry shard by shard on the calling thread.
    ///
    /// Each shard stays read-locked while its entries are visited; `f` must
    /// not call back into this map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        reentrancy::check(self.id);
        let _scope = CallbackScope::enter(self.id);
        for shard in self.shards.iter() {
            let map = shard.read();
            for (key, value) in map.iter() {
                f(key, &**value);
            }
        }
    }

    /// Number of entries in each shard.
    pub fn shard_loads(&self) -> Vec<usize> {
        reentrancy::check(self.id);
        self.shards.iter().map(|shard| shard.len()).collect()
    }

    /// Get detailed statistics about the map and its shards.
    pub fn stats(&self) -> Stats {
        let shard_sizes = self.shard_loads();
        let operations: Vec<ShardOps> = self.shards.iter().map(|s| s.stats()).collect();
        let size: usize = shard_sizes.iter().sum();

        Stats {
            size,
            shard_sizes,
            operations,
        }
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    /// A map with 32 shards and FNV-1a routing.
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<K, V> std::fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("shards", &self.shards.len())
            .field("hash", &self.hash)
            .field("routing", &self.routing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShardRouter;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn zero_shards_is_a_configuration_error() {
        assert_eq!(
            ConcurrentMap::<String, i32>::new(0).unwrap_err(),
            Error::InvalidShardCount(0)
        );
    }

    #[test]
    fn routing_is_stable_per_key() {
        let map: ConcurrentMap<String, i32> = ConcurrentMap::new(7).unwrap();
        for i in 0..100 {
            let key = format!("key_{}", i);
            let index = map.shard_index(key.as_str());
            assert!(index < 7);
            assert_eq!(index, map.shard_index(&key));
        }
    }

    #[test]
    fn reentrant_upsert_panics_instead_of_deadlocking() {
        let map: ConcurrentMap<&str, i32> = ConcurrentMap::new(1).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            map.upsert("a", 1, |_, new| {
                map.get("a");
                new
            });
        }));
        assert!(result.is_err());

        // The shard lock and the callback marker were both released.
        map.set("a", 2);
        assert_eq!(*map.get("a").unwrap(), 2);
    }

    #[test]
    fn callback_may_use_another_map() {
        let map: ConcurrentMap<&str, i32> = ConcurrentMap::new(2).unwrap();
        let audit: ConcurrentMap<&str, i32> = ConcurrentMap::new(2).unwrap();
        map.upsert("a", 1, |old, new| {
            audit.set("a", new);
            old.map_or(new, |old| old + new)
        });
        assert_eq!(*audit.get("a").unwrap(), 1);
    }

    struct FirstShard;

    impl ShardRouter for FirstShard {
        fn route(&self, _key_hash: u64, _shard_count: usize) -> usize {
            0
        }
    }

    #[test]
    fn custom_router_is_used() {
        let map: ConcurrentMap<u32, u32> = ConcurrentMap::with_config(
            Config::new()
                .shard_count(4)
                .unwrap()
                .routing(RoutingConfig::Custom(Box::new(FirstShard))),
        );
        for i in 0..20 {
            map.set(i, i);
        }
        assert_eq!(map.shard_loads(), vec![20, 0, 0, 0]);
    }

    struct PastTheEnd;

    impl ShardRouter for PastTheEnd {
        fn route(&self, key_hash: u64, shard_count: usize) -> usize {
            shard_count + (key_hash % 3) as usize
        }
    }

    #[test]
    fn out_of_range_router_answer_wraps() {
        let map: ConcurrentMap<u32, u32> = ConcurrentMap::with_config(
            Config::new()
                .shard_count(4)
                .unwrap()
                .routing(RoutingConfig::Custom(Box::new(PastTheEnd))),
        );
        for i in 0..50 {
            map.set(i, i);
        }
        for i in 0..50 {
            assert_eq!(*map.get(&i).unwrap(), i);
            assert!(map.shard_index(&i) < 3);
        }
        assert_eq!(map.count(), 50);
        assert_eq!(map.shard_loads()[3], 0);
    }
}
