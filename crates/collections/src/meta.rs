//! Metadata access and the generation sequence
//!
//! Expiry is evaluated lazily at read time: [`load`] treats an expired
//! record as absent, and the timer reaper is the only thing that sweeps
//! it eagerly. Bookkeeping paths that must see an expired-but-unreaped
//! record (ttl rescheduling, the reaper itself) use
//! [`load_ignoring_ttl`].

use crate::codec::Meta;
use chrono::Utc;
use parking_lot::Mutex;
use reef_concurrency::TxView;
use reef_core::error::Result;
use reef_core::traits::StorageEngine;
use reef_core::types::Namespace;

/// Reserved meta-namespace key for the generation high-water mark
///
/// Starts with a NUL byte so it can never collide with an owning key,
/// which always starts with a collection type tag.
const SEQ_KEY: &[u8] = b"\x00generation_seq";

/// Current epoch time in seconds
pub fn now_secs() -> i32 {
    Utc::now().timestamp() as i32
}

/// Load live metadata for `owner`
///
/// Returns `None` if absent or expired.
pub fn load(view: &TxView<'_>, owner: &[u8]) -> Result<Option<Meta>> {
    match load_ignoring_ttl(view, owner)? {
        Some(meta) if meta.is_live(now_secs()) => Ok(Some(meta)),
        _ => Ok(None),
    }
}

/// Load metadata for `owner` even if it has expired
pub fn load_ignoring_ttl(view: &TxView<'_>, owner: &[u8]) -> Result<Option<Meta>> {
    match view.get(Namespace::Meta, owner)? {
        None => Ok(None),
        Some(bytes) => Ok(Some(Meta::decode(&bytes)?)),
    }
}

/// Process-global, monotonically increasing generation counter
///
/// The high-water mark persists in the meta namespace on every draw, so a
/// reopened store never hands out a generation that was already stamped
/// onto records. A crash (or a rolled-back transaction that drew a
/// generation) may skip values; it can never reuse one.
pub struct GenerationSequence {
    current: Mutex<u32>,
}

impl GenerationSequence {
    /// Read the persisted high-water mark from `engine`
    pub fn open(engine: &dyn StorageEngine) -> Result<Self> {
        let current = match engine.get(Namespace::Meta, SEQ_KEY)? {
            None => 0,
            Some(bytes) => {
                if bytes.len() != 4 {
                    return Err(reef_core::Error::MalformedRecord(
                        "truncated generation sequence".to_string(),
                    ));
                }
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
        };
        Ok(GenerationSequence {
            current: Mutex::new(current),
        })
    }

    /// Draw the next generation and persist the new high-water mark
    pub fn next(&self, engine: &dyn StorageEngine) -> Result<u32> {
        let mut current = self.current.lock();
        let next = *current + 1;
        engine.put(Namespace::Meta, SEQ_KEY, &next.to_be_bytes())?;
        *current = next;
        Ok(next)
    }
}
