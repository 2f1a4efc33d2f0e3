//! Map construction settings.
//!
//! A [`Config`] is only ever built through setters that validate their
//! input, so any `Config` value describes a map that can be created.

use crate::error::Error;
use crate::hash::ShardHasher;
use std::fmt;
use std::hash::Hash;

/// Shard count used by [`Config::default`] and `ConcurrentMap::default`.
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Hasher that turns a key into the number routing works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// 32-bit FNV-1a. Same placement on every run and every machine.
    #[default]
    Fnv1a,
    /// ahash with its fixed keys.
    AHash,
    /// fxhash; cheapest per key.
    #[cfg(feature = "fxhash")]
    FxHash,
}

/// Picks a shard from a key hash.
///
/// Implement this to pin keys to particular shards. Whatever `route`
/// returns is reduced modulo `shard_count`, so any `usize` is accepted, but
/// the answer for a given hash must not change while the map is alive or
/// keys already stored become unreachable.
pub trait ShardRouter: Send + Sync {
    /// Shard for `key_hash` in a map of `shard_count` shards.
    fn route(&self, key_hash: u64, shard_count: usize) -> usize;
}

/// `key_hash % shard_count`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRouter;

impl ShardRouter for DefaultRouter {
    #[inline]
    fn route(&self, key_hash: u64, shard_count: usize) -> usize {
        (key_hash % shard_count as u64) as usize
    }
}

/// Which [`ShardRouter`] a map uses.
#[derive(Default)]
pub enum RoutingConfig {
    /// [`DefaultRouter`].
    #[default]
    Default,
    /// A caller-supplied router.
    Custom(Box<dyn ShardRouter>),
}

impl RoutingConfig {
    /// Always in `[0, shard_count)`; `shard_count` is never 0 here.
    #[inline]
    pub(crate) fn route(&self, key_hash: u64, shard_count: usize) -> usize {
        match self {
            RoutingConfig::Default => DefaultRouter.route(key_hash, shard_count),
            RoutingConfig::Custom(router) => router.route(key_hash, shard_count) % shard_count,
        }
    }
}

impl fmt::Debug for RoutingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingConfig::Default => f.write_str("Default"),
            RoutingConfig::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Settings for a new ConcurrentMap.
#[derive(Debug)]
pub struct Config {
    pub(crate) shard_count: usize,
    pub(crate) hash_function: HashFunction,
    pub(crate) capacity_per_shard: Option<usize>,
    pub(crate) routing: RoutingConfig,
}

impl Config {
    /// 32 shards, FNV-1a, default routing, no pre-allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shards. Rejects 0 with [`Error::InvalidShardCount`].
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        if count == 0 {
            return Err(Error::InvalidShardCount(count));
        }
        self.shard_count = count;
        Ok(self)
    }

    /// Hasher fed to the router.
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.hash_function = hash_fn;
        self
    }

    /// Pre-allocate room for `capacity` entries in every shard.
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.capacity_per_shard = Some(capacity);
        self
    }

    /// Replace the default `hash % shard_count` routing.
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            hash_function: HashFunction::default(),
            capacity_per_shard: None,
            routing: RoutingConfig::Default,
        }
    }
}

/// Chained form of [`Config`] ending in a typed map.
///
/// ```rust
/// use cmap::{ConcurrentMapBuilder, HashFunction};
///
/// let map = ConcurrentMapBuilder::new()
///     .shard_count(10)?
///     .hash_function(HashFunction::AHash)
///     .build::<String, i32>();
/// assert_eq!(map.shard_count(), 10);
/// # Ok::<(), cmap::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct ConcurrentMapBuilder {
    config: Config,
}

impl ConcurrentMapBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`Config::shard_count`].
    pub fn shard_count(mut self, count: usize) -> Result<Self, Error> {
        self.config = self.config.shard_count(count)?;
        Ok(self)
    }

    /// See [`Config::hash_function`].
    pub fn hash_function(mut self, hash_fn: HashFunction) -> Self {
        self.config = self.config.hash_function(hash_fn);
        self
    }

    /// See [`Config::capacity_per_shard`].
    pub fn capacity_per_shard(mut self, capacity: usize) -> Self {
        self.config = self.config.capacity_per_shard(capacity);
        self
    }

    /// See [`Config::routing`].
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.config = self.config.routing(routing);
        self
    }

    /// Create the map.
    pub fn build<K, V>(self) -> crate::ConcurrentMap<K, V>
    where
        K: Hash + Eq + Send + Sync,
        V: Send + Sync,
    {
        crate::ConcurrentMap::with_config(self.config)
    }
}

pub(crate) fn create_hasher(hash_fn: HashFunction) -> ShardHasher {
    match hash_fn {
        HashFunction::Fnv1a => ShardHasher::Fnv1a,
        HashFunction::AHash => ShardHasher::AHash,
        #[cfg(feature = "fxhash")]
        HashFunction::FxHash => ShardHasher::FxHash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl ShardRouter for Fixed {
        fn route(&self, _key_hash: u64, _shard_count: usize) -> usize {
            self.0
        }
    }

    #[test]
    fn zero_shards_rejected() {
        assert_eq!(
            Config::new().shard_count(0).unwrap_err(),
            Error::InvalidShardCount(0)
        );
    }

    #[test]
    fn any_positive_shard_count_accepted() {
        for count in [1, 3, 5, 10, 17] {
            assert_eq!(Config::new().shard_count(count).unwrap().shard_count, count);
        }
    }

    #[test]
    fn default_router_stays_in_range() {
        for hash in [0u64, 1, 9, 10, u64::MAX] {
            assert!(DefaultRouter.route(hash, 10) < 10);
        }
        assert_eq!(DefaultRouter.route(23, 10), 3);
    }

    #[test]
    fn custom_router_answer_reduced_into_range() {
        let routing = RoutingConfig::Custom(Box::new(Fixed(13)));
        assert_eq!(routing.route(0, 4), 1);
        assert_eq!(routing.route(0, 13), 0);

        let routing = RoutingConfig::Custom(Box::new(Fixed(2)));
        assert_eq!(routing.route(0, 4), 2);
    }
}
