//! Operation/shutdown barrier
//!
//! Every public store operation registers itself as in flight by taking an
//! [`OpGuard`] for its entire duration, including scans that hold an open
//! engine cursor. Shutdown flips the closed flag (so new entries fail with
//! `Error::Closed`) and then waits until every in-flight guard has been
//! released before the engine is torn down.

use parking_lot::lock_api::ArcRwLockReadGuard;
use parking_lot::{RawRwLock, RwLock};
use reef_core::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared/exclusive barrier between operations and shutdown
#[derive(Default)]
pub struct Lifecycle {
    closed: AtomicBool,
    gate: Arc<RwLock<()>>,
}

impl Lifecycle {
    /// Create an open lifecycle
    pub fn new() -> Self {
        Lifecycle::default()
    }

    /// Register an operation as in flight
    ///
    /// Fails with [`Error::Closed`] once shutdown has begun.
    pub fn enter(&self) -> Result<OpGuard> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let permit = self.gate.read_arc();
        // close() may have won the race between the flag check and the
        // read acquisition; re-check under the guard.
        if self.closed.load(Ordering::Acquire) {
            drop(permit);
            return Err(Error::Closed);
        }
        Ok(OpGuard { _permit: permit })
    }

    /// Begin shutdown: reject new operations, wait out in-flight ones
    ///
    /// Idempotent; the second and later calls return immediately.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Taking the write half blocks until every OpGuard is dropped.
        let _exclusive = self.gate.write();
    }

    /// True once shutdown has begun
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Witness that one operation is in flight; release by dropping
pub struct OpGuard {
    _permit: ArcRwLockReadGuard<RawRwLock, ()>,
}
