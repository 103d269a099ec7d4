//! Time-ordered expiration index
//!
//! Scheduling and cancellation are plain upserts/deletes against a
//! time-keyed index, folded into the calling operation's write batch so
//! they commit atomically with the metadata they belong to. Cancellation
//! must supply the byte-identical time and payload of the original
//! schedule call.
//!
//! A reaper outside this module periodically calls [`scan_due`] and
//! invokes the per-topic callback for each entry; the callback is
//! responsible for re-validating against current metadata before acting,
//! and for removing the entry.

use crate::codec::{self, TimerEntry};
use reef_core::error::Result;
use reef_core::traits::{EngineIterator, StorageEngine};
use reef_core::types::{Namespace, TypeTag};
use reef_core::WriteBatch;

/// Topic byte for collection-expiry timers
pub const COLLECTION_EXPIRY: u8 = TypeTag::Timer as u8;

/// Schedule `payload` to fire at `at` (epoch seconds)
pub fn schedule(batch: &mut WriteBatch, topic: u8, at: u32, payload: &[u8]) {
    batch.put(
        Namespace::Data,
        codec::timer_key(topic, at, payload),
        payload.to_vec(),
    );
}

/// Cancel a previously scheduled entry
///
/// A no-op if no entry matches the composite key exactly.
pub fn cancel(batch: &mut WriteBatch, topic: u8, at: u32, payload: &[u8]) {
    batch.delete(Namespace::Data, codec::timer_key(topic, at, payload));
}

/// Collect every entry of `topic` due at or before `now`
pub fn scan_due(engine: &dyn StorageEngine, topic: u8, now: u32) -> Result<Vec<TimerEntry>> {
    let head = codec::timer_head(topic);
    let mut due = Vec::new();
    let mut it = engine.iter(Namespace::Data);
    it.seek(&head);
    while it.valid() && codec::check_head(&head, it.key()) {
        let entry = TimerEntry::decode(topic, it.key())?;
        if entry.at > now {
            break;
        }
        due.push(entry);
        it.next();
    }
    Ok(due)
}
