//! Store facade
//!
//! `Db` wires the engine, the lock table, the lifecycle barrier and the
//! generation sequence into a [`StoreContext`], hands out collection
//! facades and transaction sessions, and runs the expiry reaper thread.

use crate::reaper::Reaper;
use parking_lot::Mutex;
use reef_collections::{GenerationSequence, SortedSet, StoreContext};
use reef_concurrency::{KeyLockTable, Lifecycle, Transaction};
use reef_core::error::{Error, Result};
use reef_core::traits::StorageEngine;
use reef_core::Limits;
use reef_storage::MemoryEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Store configuration
#[derive(Debug, Clone)]
pub struct DbOptions {
    /// API boundary size limits
    pub limits: Limits,
    /// How often the reaper scans for due expiry timers
    pub reaper_interval: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        DbOptions {
            limits: Limits::default(),
            reaper_interval: Duration::from_millis(500),
        }
    }
}

/// Embedded multi-model store over an ordered key-value engine
pub struct Db {
    ctx: Arc<StoreContext>,
    reaper: Mutex<Option<Reaper>>,
}

impl Db {
    /// Open a store over `engine` with default options
    pub fn open(engine: Arc<dyn StorageEngine>) -> Result<Db> {
        Db::open_with(engine, DbOptions::default())
    }

    /// Open a store over `engine`
    pub fn open_with(engine: Arc<dyn StorageEngine>, options: DbOptions) -> Result<Db> {
        let generations = GenerationSequence::open(&*engine)?;
        let ctx = Arc::new(StoreContext {
            engine,
            locks: Arc::new(KeyLockTable::new()),
            lifecycle: Arc::new(Lifecycle::new()),
            generations,
            limits: options.limits,
        });
        let reaper = Reaper::spawn(
            SortedSet::new(Arc::clone(&ctx)),
            Arc::clone(&ctx.engine),
            options.reaper_interval,
        )?;
        info!(reaper_interval = ?options.reaper_interval, "store opened");
        Ok(Db {
            ctx,
            reaper: Mutex::new(Some(reaper)),
        })
    }

    /// Open a store over a fresh in-memory engine
    pub fn open_memory() -> Result<Db> {
        Db::open(Arc::new(MemoryEngine::new()))
    }

    /// Open a store over a fresh in-memory engine with custom options
    pub fn open_memory_with(options: DbOptions) -> Result<Db> {
        Db::open_with(Arc::new(MemoryEngine::new()), options)
    }

    /// The sorted-set collection
    pub fn sorted_set(&self) -> SortedSet {
        SortedSet::new(Arc::clone(&self.ctx))
    }

    /// Start a transaction session
    ///
    /// Pass the session to subsequent operations as `Some(&txn)`; they
    /// fold into one atomic unit applied by [`Transaction::commit`].
    pub fn begin(&self) -> Result<Transaction> {
        if self.ctx.lifecycle.is_closed() {
            return Err(Error::Closed);
        }
        Ok(Transaction::begin(Arc::clone(&self.ctx.engine)))
    }

    /// The engine underneath this store
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.ctx.engine
    }

    /// True once shutdown has begun
    pub fn is_closed(&self) -> bool {
        self.ctx.lifecycle.is_closed()
    }

    /// Shut down: stop the reaper, reject new operations and wait until
    /// no operation is in flight
    ///
    /// Idempotent.
    pub fn close(&self) {
        if let Some(reaper) = self.reaper.lock().take() {
            reaper.stop();
        }
        self.ctx.lifecycle.close();
        info!("store closed");
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        self.close();
    }
}
