//! Collection types for Reef
//!
//! This crate builds the higher-level collections on top of the engine
//! contract, the per-key locks and the transaction sessions:
//! - codec: exact byte layouts for metadata, member-index, score-index
//!   and timer records
//! - meta: versioned collection metadata with lazy TTL expiry and the
//!   process-global generation sequence
//! - timer: the time-ordered expiration index
//! - zset: the sorted-set collection
//!
//! Collections receive their shared machinery through [`StoreContext`]
//! rather than inheriting it; each collection type is a thin facade over
//! the same injected capability set.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod meta;
pub mod timer;
pub mod zset;

use reef_concurrency::{KeyLockTable, Lifecycle};
use reef_core::traits::StorageEngine;
use reef_core::Limits;
use std::sync::Arc;

pub use meta::GenerationSequence;
pub use zset::{Entry, SortedSet};

/// Shared machinery injected into every collection type
pub struct StoreContext {
    /// The ordered storage engine underneath all collections
    pub engine: Arc<dyn StorageEngine>,
    /// Per-collection-key exclusive locks
    pub locks: Arc<KeyLockTable>,
    /// Operation/shutdown barrier
    pub lifecycle: Arc<Lifecycle>,
    /// Process-global generation counter
    pub generations: GenerationSequence,
    /// API boundary size limits
    pub limits: Limits,
}
