//! Per-board mutation locks.

use crate::graph::Identity;
use crate::locking;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// One mutex per board identity, created on first use.
///
/// Holding a board's lock serializes read-modify-replace cycles on that
/// board's root. Different boards never contend.
#[derive(Debug, Default)]
pub struct BoardLocks {
    locks: DashMap<Identity, Arc<Mutex<()>>>,
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, identity: &Identity) -> Arc<Mutex<()>> {
        // Cloned out so the shard lock is released before blocking on the
        // board mutex.
        self.locks
            .entry(*identity)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the board's lock.
    pub fn with_board<R>(&self, identity: &Identity, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(identity);
        let _guard = locking::lock(&lock);
        f()
    }

    /// Number of boards that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
