//! Held-callback marker.
//!
//! Compound operators run their callback while the shard's write lock is
//! held. Shard locks are not reentrant, so a callback touching the same map
//! again would deadlock. Each thread tracks which maps it is currently
//! running a callback for and refuses to re-enter them.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_MAP_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static ACTIVE_CALLBACKS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Allocate a process-unique id for a new map.
pub(crate) fn next_map_id() -> usize {
    NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Panic if the current thread is inside a callback of map `map_id`.
#[inline]
pub(crate) fn check(map_id: usize) {
    let reentered = ACTIVE_CALLBACKS.with(|active| active.borrow().contains(&map_id));
    if reentered {
        panic!("re-entrant call into ConcurrentMap from inside an upsert/remove_if callback");
    }
}

/// Marks the current thread as running a callback for one map until dropped.
pub(crate) struct CallbackScope {
    map_id: usize,
}

impl CallbackScope {
    pub(crate) fn enter(map_id: usize) -> Self {
        ACTIVE_CALLBACKS.with(|active| active.borrow_mut().push(map_id));
        Self { map_id }
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        ACTIVE_CALLBACKS.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(pos) = active.iter().rposition(|&id| id == self.map_id) {
                active.remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn scope_blocks_only_its_own_map() {
        let id = next_map_id();
        let other = next_map_id();
        let scope = CallbackScope::enter(id);
        check(other);
        assert!(panic::catch_unwind(|| check(id)).is_err());
        drop(scope);
        check(id);
    }

    #[test]
    fn scope_cleared_on_unwind() {
        let id = next_map_id();
        let result = panic::catch_unwind(|| {
            let _scope = CallbackScope::enter(id);
            panic!("callback failed");
        });
        assert!(result.is_err());
        check(id);
    }
}
