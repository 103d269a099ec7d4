//! Ordered storage engine contract
//!
//! This module defines the seam between the store and the ordered
//! byte-keyed engine underneath it. The engine's internals (LSM/B-tree,
//! compaction, compression) are not this repository's concern; anything
//! satisfying these traits can sit below the collection layer.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (`Send + Sync`).

use crate::batch::WriteBatch;
use crate::error::Result;
use crate::types::Namespace;

/// Ordered byte-keyed storage engine with independent namespaces
pub trait StorageEngine: Send + Sync {
    /// Point lookup
    ///
    /// Returns `None` if the key is absent.
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Batched point lookups
    ///
    /// The result is positionally aligned with `keys`: `result[i]` is the
    /// value for `keys[i]` or `None` if absent.
    fn multi_get(&self, ns: Namespace, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.get(ns, k)).collect()
    }

    /// Insert or overwrite a single key
    fn put(&self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a single key if present
    fn delete(&self, ns: Namespace, key: &[u8]) -> Result<()>;

    /// Remove every key in `[start, end)`
    ///
    /// An empty `end` means "to the end of the namespace". Engines are
    /// expected to implement this as a cheap range tombstone rather than
    /// a per-key scan.
    fn delete_range(&self, ns: Namespace, start: &[u8], end: &[u8]) -> Result<()>;

    /// Apply a whole batch atomically
    ///
    /// Operations apply in order; no concurrent reader may observe a
    /// partially applied batch.
    fn write(&self, batch: WriteBatch) -> Result<()>;

    /// Open a cursor over one namespace, positioned before the first key
    ///
    /// Call [`EngineIterator::seek`] before reading.
    fn iter(&self, ns: Namespace) -> Box<dyn EngineIterator + '_>;
}

/// Forward cursor over an engine namespace, ordered by key bytes
pub trait EngineIterator {
    /// Position at the first key `>= key`
    fn seek(&mut self, key: &[u8]);

    /// True while the cursor points at an entry
    fn valid(&self) -> bool;

    /// Key of the current entry
    ///
    /// Must only be called while `valid()` is true.
    fn key(&self) -> &[u8];

    /// Value of the current entry
    ///
    /// Must only be called while `valid()` is true.
    fn value(&self) -> &[u8];

    /// Advance to the next entry in key order
    fn next(&mut self);
}
