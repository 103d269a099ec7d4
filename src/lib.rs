//! ReefDB: embedded multi-model data store
//!
//! Reef layers Redis-like collection types over an ordered byte-keyed
//! storage engine. Collections share a compact binary key encoding, a
//! generation scheme that makes clear/overwrite O(1), per-key locking
//! with optional multi-operation transaction sessions, and a
//! time-indexed expiration subsystem.
//!
//! # Example
//!
//! ```
//! use reefdb::{Db, Entry};
//!
//! # fn main() -> reefdb::Result<()> {
//! let db = Db::open_memory()?;
//! let zset = db.sorted_set();
//!
//! zset.add(None, "leaderboard", &[Entry::new(10, "alice"), Entry::new(5, "bob")])?;
//! let top = zset.range(None, "leaderboard", 0, 100, 10)?;
//! assert_eq!(top[0].member, b"bob");
//!
//! // Several operations as one atomic unit:
//! let txn = db.begin()?;
//! zset.add(Some(&txn), "leaderboard", &[Entry::new(7, "carol")])?;
//! zset.remove(Some(&txn), "leaderboard", &[b"bob".as_slice()])?;
//! txn.commit()?;
//!
//! db.close();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod db;
mod reaper;

pub use db::{Db, DbOptions};

pub use reef_collections::{Entry, SortedSet};
pub use reef_concurrency::{Transaction, TxStatus};
pub use reef_core::{
    EngineIterator, Error, KeyError, Limits, Namespace, Result, StorageEngine, WriteBatch,
};
pub use reef_storage::MemoryEngine;
