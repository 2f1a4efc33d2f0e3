//! Parallel whole-map scans.
//!
//! Each shard is visited by its own rayon task, which collects into a local
//! `Vec` under the shard's read lock. The per-shard lists are concatenated
//! afterwards, so the output grows to exactly what was observed rather than
//! to a count taken before the scan.

use crate::shard::Shard;
use rayon::prelude::*;
use std::hash::Hash;
use std::sync::Arc;

/// Fan out over all shards, mapping each held shard to a local list, and
/// fan the lists back in.
pub(crate) fn collect<K, V, T, F>(shards: &[Shard<K, V>], per_entry: F) -> Vec<T>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
    T: Send,
    F: Fn(&K, &Arc<V>) -> T + Sync,
{
    let parts: Vec<Vec<T>> = shards
        .par_iter()
        .map(|shard| {
            let map = shard.read();
            map.iter().map(|(key, value)| per_entry(key, value)).collect()
        })
        .collect();

    let mut out = Vec::new();
    for part in parts {
        out.extend(part);
    }
    tracing::trace!(shards = shards.len(), items = out.len(), "scan complete");
    out
}

pub(crate) fn keys<K, V>(shards: &[Shard<K, V>]) -> Vec<K>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    collect(shards, |key, _| key.clone())
}

pub(crate) fn values<K, V>(shards: &[Shard<K, V>]) -> Vec<Arc<V>>
where
    K: Hash + Eq + Send + Sync,
    V: Send + Sync,
{
    collect(shards, |_, value| Arc::clone(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_values_cover_all_shards() {
        let shards: Vec<Shard<u32, u32>> = (0..5).map(|_| Shard::default()).collect();
        for i in 0..50u32 {
            shards[(i % 5) as usize].set(i, i * 10);
        }

        let mut keys = keys(&shards);
        keys.sort_unstable();
        assert_eq!(keys, (0..50).collect::<Vec<_>>());

        let mut values: Vec<u32> = values(&shards).into_iter().map(|v| *v).collect();
        values.sort_unstable();
        assert_eq!(values, (0..50).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[test]
    fn empty_scan() {
        let shards: Vec<Shard<u32, u32>> = (0..3).map(|_| Shard::default()).collect();
        assert!(keys(&shards).is_empty());
        assert!(values(&shards).is_empty());
    }
}
