use crate::shard::Shard;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use rayon::Yield;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

/// How long a pool worker parks on an empty queue once the pool has no
/// pending work left to run.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// A `(key, value)` pair produced by [`ConcurrentMap::iterate`].
///
/// The key is a clone and the value a shared `Arc`, so holding a tuple never
/// keeps a shard locked.
///
/// [`ConcurrentMap::iterate`]: crate::ConcurrentMap::iterate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple<K, V> {
    key: K,
    value: Arc<V>,
}

impl<K, V> Tuple<K, V> {
    pub(crate) fn new(key: K, value: Arc<V>) -> Self {
        Self { key, value }
    }

    /// The entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value as seen when its shard was scanned.
    pub fn value(&self) -> &Arc<V> {
        &self.value
    }

    /// Split into owned key and value.
    pub fn into_parts(self) -> (K, Arc<V>) {
        (self.key, self.value)
    }
}

/// Lazy fan-in iterator over every entry of the map.
///
/// One producer per shard runs on the rayon pool, holds that shard's read
/// lock while it copies the shard's entries into an unbounded queue, and
/// drops its sender when finished. The iterator yields tuples as they
/// arrive and ends once every producer has finished and the queue is
/// drained. Order is unspecified.
///
/// Dropping the iterator early makes outstanding producers stop at their
/// next send.
///
/// When consumed on a rayon worker, `next` runs pending pool jobs while the
/// queue is empty, so producers queued on the same pool still make progress.
pub struct Iter<K, V> {
    receiver: Receiver<Tuple<K, V>>,
}

impl<K, V> Iter<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn spawn(shards: Arc<[Shard<K, V>]>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        for index in 0..shards.len() {
            let shards = Arc::clone(&shards);
            let sender = sender.clone();
            rayon::spawn(move || produce(&shards[index], index, &sender));
        }
        tracing::trace!(shards = shards.len(), "spawned iterate producers");
        Self { receiver }
    }
}

fn produce<K, V>(shard: &Shard<K, V>, index: usize, sender: &Sender<Tuple<K, V>>)
where
    K: Hash + Eq + Clone,
{
    let map = shard.read();
    for (key, value) in map.iter() {
        if sender
            .send(Tuple::new(key.clone(), Arc::clone(value)))
            .is_err()
        {
            tracing::debug!(shard = index, "iterate consumer hung up, stopping producer");
            return;
        }
    }
}

impl<K, V> Iterator for Iter<K, V> {
    type Item = Tuple<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.receiver.try_recv() {
                Ok(tuple) => return Some(tuple),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }

            // On a pool worker the producers may be queued behind us, so run
            // pending pool work instead of parking.
            match rayon::yield_now() {
                None => return self.receiver.recv().ok(),
                Some(Yield::Executed) => {}
                Some(Yield::Idle) => match self.receiver.recv_timeout(IDLE_WAIT) {
                    Ok(tuple) => return Some(tuple),
                    Err(RecvTimeoutError::Disconnected) => return None,
                    Err(RecvTimeoutError::Timeout) => {}
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shards(count: usize) -> Arc<[Shard<String, usize>]> {
        (0..count).map(|_| Shard::default()).collect()
    }

    #[test]
    fn drains_every_shard() {
        let shards = shards(4);
        for i in 0..40 {
            shards[i % 4].set(format!("key_{}", i), i);
        }

        let mut seen: Vec<usize> = Iter::spawn(Arc::clone(&shards))
            .map(|tuple| *tuple.into_parts().1)
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn completes_on_single_thread_pool() {
        let shards = shards(4);
        for i in 0..100 {
            shards[i % 4].set(format!("key_{}", i), i);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let count = pool.install(|| Iter::spawn(Arc::clone(&shards)).count());
        assert_eq!(count, 100);
    }

    #[test]
    fn empty_shards_end_immediately() {
        assert_eq!(Iter::spawn(shards(3)).count(), 0);
    }

    #[test]
    fn early_drop_releases_shards() {
        let shards = shards(2);
        for i in 0..1000 {
            shards[i % 2].set(format!("key_{}", i), i);
        }

        let mut iter = Iter::spawn(Arc::clone(&shards));
        assert!(iter.next().is_some());
        drop(iter);

        // Producers exit at their next failed send and release the read lock.
        for shard in shards.iter() {
            shard.set("after".to_string(), 0);
        }
        assert_eq!(shards.iter().map(|s| s.len()).sum::<usize>(), 1002);
    }
}
