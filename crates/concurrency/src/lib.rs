//! Concurrency layer for Reef
//!
//! This crate implements the coordination machinery every collection
//! operation composes:
//! - KeyLockTable: per-collection-key exclusive locks
//! - Transaction: explicit session batching multiple operations atomically
//! - TxView: read view overlaying a session's uncommitted writes
//! - Lifecycle: shared/exclusive barrier between operations and shutdown

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lifecycle;
pub mod locks;
pub mod transaction;

pub use lifecycle::{Lifecycle, OpGuard};
pub use locks::{KeyLockTable, LockHandle};
pub use transaction::{Transaction, TxStatus, TxView, ViewIterator};
