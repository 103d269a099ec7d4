//! Expiry reaper
//!
//! A background thread that periodically scans the timer store for due
//! entries and invokes the collection expiry callback for each. The
//! callback re-validates against current metadata under the key lock, so
//! the reaper goes through the normal lock-then-mutate path like any
//! other caller.

use parking_lot::{Condvar, Mutex};
use reef_collections::{meta, timer, SortedSet};
use reef_core::error::Error;
use reef_core::traits::StorageEngine;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Default)]
struct Shutdown {
    stopped: Mutex<bool>,
    signal: Condvar,
}

/// Handle to the running reaper thread
pub(crate) struct Reaper {
    shutdown: Arc<Shutdown>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawn the reaper loop
    pub(crate) fn spawn(
        zset: SortedSet,
        engine: Arc<dyn StorageEngine>,
        interval: Duration,
    ) -> std::io::Result<Reaper> {
        let shutdown = Arc::new(Shutdown::default());
        let thread_shutdown = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("reef-reaper".to_string())
            .spawn(move || run(zset, engine, interval, thread_shutdown))?;
        Ok(Reaper { shutdown, handle })
    }

    /// Stop the loop and wait for the thread to exit
    pub(crate) fn stop(self) {
        *self.shutdown.stopped.lock() = true;
        self.shutdown.signal.notify_all();
        if self.handle.join().is_err() {
            warn!("reaper thread panicked");
        }
    }
}

fn run(zset: SortedSet, engine: Arc<dyn StorageEngine>, interval: Duration, shutdown: Arc<Shutdown>) {
    loop {
        {
            let mut stopped = shutdown.stopped.lock();
            if !*stopped {
                let _ = shutdown.signal.wait_for(&mut stopped, interval);
            }
            if *stopped {
                return;
            }
        }
        if let Err(err) = sweep(&zset, &*engine) {
            match err {
                Error::Closed => return,
                other => warn!(error = %other, "expiry sweep failed"),
            }
        }
    }
}

fn sweep(zset: &SortedSet, engine: &dyn StorageEngine) -> reef_core::Result<()> {
    let now = meta::now_secs().max(0) as u32;
    let due = timer::scan_due(engine, timer::COLLECTION_EXPIRY, now)?;
    if due.is_empty() {
        return Ok(());
    }
    debug!(count = due.len(), "processing due expiry timers");
    for entry in due {
        zset.expire_due(entry.at, &entry.payload)?;
    }
    Ok(())
}
