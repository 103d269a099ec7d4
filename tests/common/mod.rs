//! Shared helpers for integration suites

#![allow(dead_code)]

use reefdb::{Db, DbOptions};
use std::time::Duration;

/// Open a store over a fresh in-memory engine
pub fn open_db() -> Db {
    init_tracing();
    Db::open_memory().unwrap()
}

/// Open a store with a specific reaper interval
pub fn open_db_with_reaper(interval: Duration) -> Db {
    init_tracing();
    Db::open_memory_with(DbOptions {
        reaper_interval: interval,
        ..DbOptions::default()
    })
    .unwrap()
}

/// Open a store whose reaper effectively never runs
///
/// For tests that exercise lazy expiry without physical reclamation.
pub fn open_db_without_reaper() -> Db {
    open_db_with_reaper(Duration::from_secs(3600))
}

/// Best-effort tracing init; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
