//! Per-key exclusive locks
//!
//! Every compound read-modify-write sequence on a collection key holds
//! that key's lock for the whole sequence; this is the sole mechanism
//! preventing lost updates to collection metadata under concurrent
//! mutation of the same key. Distinct keys never contend.
//!
//! The table is an arena of reference-counted mutexes keyed by owning-key
//! bytes. A slot exists only while handles (or waiters) for its key are
//! outstanding, so idle keys don't accumulate. Release is a scoped guard:
//! dropping the [`LockHandle`] unlocks on every exit path. Inside a
//! transaction the handle is moved into the session instead of dropped,
//! which is how "release becomes a no-op until the transaction ends" is
//! expressed here.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::sync::Arc;

struct Slot {
    mutex: Arc<Mutex<()>>,
    refs: usize,
}

/// Table of per-key exclusive locks
#[derive(Default)]
pub struct KeyLockTable {
    slots: DashMap<Vec<u8>, Slot>,
}

impl KeyLockTable {
    /// Create an empty table
    pub fn new() -> Self {
        KeyLockTable::default()
    }

    /// Block until the calling thread exclusively holds `key`
    ///
    /// The returned handle releases the lock when dropped.
    pub fn acquire(self: &Arc<Self>, key: &[u8]) -> LockHandle {
        let mutex = {
            let mut slot = self.slots.entry(key.to_vec()).or_insert_with(|| Slot {
                mutex: Arc::new(Mutex::new(())),
                refs: 0,
            });
            slot.refs += 1;
            slot.mutex.clone()
        };
        // The shard guard is dropped before blocking on the key mutex.
        let guard = mutex.lock_arc();
        LockHandle {
            table: Arc::clone(self),
            key: key.to_vec(),
            guard: Some(guard),
        }
    }

    /// Number of keys with outstanding handles or waiters
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }
}

/// Exclusive hold on one key; unlocks on drop
pub struct LockHandle {
    table: Arc<KeyLockTable>,
    key: Vec<u8>,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl LockHandle {
    /// The owning-key bytes this handle locks
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        // Unlock before the refcount bookkeeping so a thread blocked in
        // acquire() can proceed as soon as possible.
        self.guard.take();
        let key = std::mem::take(&mut self.key);
        if let Entry::Occupied(mut occupied) = self.table.slots.entry(key) {
            let slot = occupied.get_mut();
            slot.refs -= 1;
            if slot.refs == 0 {
                occupied.remove();
            }
        }
    }
}
