//! # cmap
//!
//! A thread-safe map split into independently locked shards.
//!
//! Every key hashes to one shard, and every operation only takes that
//! shard's reader-writer lock, so workers touching different shards do not
//! serialize behind a single global lock. Values are stored behind `Arc<T>`
//! so they can be shared without copying.
//!
//! ## Features
//!
//! - **Sharded locking**: one `parking_lot::RwLock` per shard
//! - **Compound operations**: `upsert`, `set_if_absent` and `remove_if` run
//!   their read-decide-write step under a single lock hold
//! - **Parallel scans**: `keys`, `values` and `iterate` visit all shards
//!   concurrently
//! - **Deterministic routing**: FNV-1a by default, `hash % shard_count`
//! - **Statistics**: per-shard load and, with `metrics`, operation counters
//!
//! ## Example
//!
//! ```rust
//! use cmap::ConcurrentMap;
//!
//! let map = ConcurrentMap::new(5)?;
//!
//! assert!(map.set_if_absent("a", 1));
//! assert_eq!(*map.get("a").unwrap(), 1);
//!
//! // Add to the existing value, or start from the new one.
//! map.upsert("a", 2, |old, new| old.map_or(new, |old| old + new));
//! assert_eq!(*map.get("a").unwrap(), 3);
//!
//! // The callback's answer is returned even when nothing was removed.
//! assert!(map.remove_if("missing", |_, _| true));
//! assert!(map.remove_if("a", |_, value| value.is_some()));
//! assert!(map.is_empty());
//!
//! map.set_many([("x", 1), ("y", 2)]);
//! for tuple in map.iterate() {
//!     println!("{}: {}", tuple.key(), tuple.value());
//! }
//! # Ok::<(), cmap::Error>(())
//! ```
//!
//! ## Callbacks
//!
//! `upsert`, `remove_if` and `for_each` call back into user code while a
//! shard lock is held. Shard locks are not reentrant, so touching the same
//! map from the callback panics rather than deadlocking.

#![deny(missing_docs)]
#![warn(clippy::all)]

/// Configuration and builder types.
pub mod config;
/// Error types.
pub mod error;
/// Hash function implementations.
pub mod hash;
/// Iterator implementations.
pub mod iter;
/// Main ConcurrentMap implementation.
pub mod map;
mod reentrancy;
mod scan;
mod shard;
/// Statistics and load introspection.
pub mod stats;

// Re-export main types
pub use config::{Config, ConcurrentMapBuilder, HashFunction, RoutingConfig, ShardRouter};
pub use error::Error;
pub use iter::{Iter, Tuple};
pub use map::ConcurrentMap;
pub use stats::{ShardOps, Stats};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let map = ConcurrentMap::new(10).unwrap();

        map.set("a", "b");
        assert_eq!(*map.get("a").unwrap(), "b");
        assert!(map.has("a"));

        map.remove("a");
        assert!(map.get("a").is_none());
        assert!(!map.has("a"));
    }

    #[test]
    fn test_set_if_absent() {
        let map = ConcurrentMap::new(10).unwrap();

        assert!(map.set_if_absent("a", "b"));
        assert!(!map.set_if_absent("a", "c"));
        assert_eq!(*map.get("a").unwrap(), "b");
    }

    #[test]
    fn test_count_and_is_empty() {
        let map = ConcurrentMap::default();
        assert!(map.is_empty());

        map.set_many((0..10).map(|i| (i, i)));
        assert_eq!(map.count(), 10);
        assert!(!map.is_empty());
    }

    #[test]
    fn test_builder() {
        let map = ConcurrentMapBuilder::new()
            .shard_count(8)
            .unwrap()
            .build::<String, i32>();

        map.set("test".to_string(), 42);
        assert_eq!(*map.get("test").unwrap(), 42);
        assert_eq!(map.shard_count(), 8);
    }
}
