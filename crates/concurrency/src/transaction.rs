//! Transaction sessions
//!
//! A [`Transaction`] is an explicit session value obtained from the store
//! and threaded through subsequent operations. While the session is
//! active, every operation folds its local write batch into the session's
//! single batch instead of committing it, and hands over its key lock so
//! all keys touched by the session stay locked until the session ends.
//! `commit` applies the accumulated batch atomically and releases every
//! retained lock; `rollback` (or dropping the session) discards the batch
//! and releases the locks.
//!
//! The session lifecycle maps onto the usual state machine: no session
//! value means NONE; an owned `Transaction` is ACTIVE; commit and
//! rollback consume the value, so a finished session cannot be reused by
//! construction. The one observable non-active state is a *poisoned*
//! session: when an operation fails mid-session it rolls the session back
//! in place, and any further use (including commit) is refused with a
//! transaction-state error.
//!
//! Reads inside a session go through [`TxView`], which overlays the
//! session's uncommitted puts, deletes and range deletes over the engine,
//! including merged iteration — read-your-own-writes without touching
//! the engine's committed state.

use crate::locks::LockHandle;
use parking_lot::Mutex;
use reef_core::batch::BatchOp;
use reef_core::error::{Error, Result};
use reef_core::traits::{EngineIterator, StorageEngine};
use reef_core::types::Namespace;
use reef_core::WriteBatch;
use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

/// Observable session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// The session accepts operations and can commit
    Active,
    /// The session was rolled back in place after a failed operation
    RolledBack,
}

type Overlay = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

struct TxInner {
    status: TxStatus,
    batch: WriteBatch,
    overlay: [Overlay; 2],
    ranges: [Vec<(Vec<u8>, Vec<u8>)>; 2],
    locks: Vec<LockHandle>,
}

impl TxInner {
    fn ensure_active(&self) -> Result<()> {
        match self.status {
            TxStatus::Active => Ok(()),
            TxStatus::RolledBack => Err(Error::TransactionState(
                "transaction is no longer active".to_string(),
            )),
        }
    }
}

/// Explicit transaction session
///
/// Obtained from the store facade; passed to operations as
/// `Option<&Transaction>`.
pub struct Transaction {
    engine: Arc<dyn StorageEngine>,
    inner: Mutex<TxInner>,
}

impl Transaction {
    /// Start a session against `engine`
    pub fn begin(engine: Arc<dyn StorageEngine>) -> Self {
        Transaction {
            engine,
            inner: Mutex::new(TxInner {
                status: TxStatus::Active,
                batch: WriteBatch::new(),
                overlay: [BTreeMap::new(), BTreeMap::new()],
                ranges: [Vec::new(), Vec::new()],
                locks: Vec::new(),
            }),
        }
    }

    /// Current session state
    pub fn status(&self) -> TxStatus {
        self.inner.lock().status
    }

    /// Apply the accumulated batch atomically and release retained locks
    pub fn commit(self) -> Result<()> {
        let Transaction { engine, inner } = self;
        let mut inner = inner.into_inner();
        inner.ensure_active().map_err(|_| {
            Error::TransactionState("cannot commit a rolled-back transaction".to_string())
        })?;
        let batch = std::mem::take(&mut inner.batch);
        debug!(ops = batch.len(), locks = inner.locks.len(), "committing transaction");
        let result = engine.write(batch);
        // Locks release whether the write succeeded or not.
        inner.locks.clear();
        result
    }

    /// Discard the accumulated batch and release retained locks
    ///
    /// Dropping an unfinished session has the same effect.
    pub fn rollback(self) {
        let inner = self.inner.lock();
        debug!(ops = inner.batch.len(), "rolling back transaction");
        drop(inner);
    }

    /// Roll the session back in place after a failed operation
    ///
    /// Retained locks release immediately; commit is refused afterwards.
    /// Idempotent.
    pub fn poison(&self) {
        let mut inner = self.inner.lock();
        if inner.status == TxStatus::Active {
            debug!("transaction poisoned after failed operation");
            inner.status = TxStatus::RolledBack;
            inner.batch = WriteBatch::new();
            inner.overlay = [BTreeMap::new(), BTreeMap::new()];
            inner.ranges = [Vec::new(), Vec::new()];
            inner.locks.clear();
        }
    }

    /// True if the session already holds the lock for `key`
    ///
    /// A second operation on the same key inside one session must not
    /// re-acquire the key lock it already retains.
    pub fn holds(&self, key: &[u8]) -> bool {
        self.inner.lock().locks.iter().any(|l| l.key() == key)
    }

    /// Fold one operation's batch and lock into the session
    pub fn fold(&self, batch: WriteBatch, lock: Option<LockHandle>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ensure_active()?;
        for op in batch.ops() {
            match op {
                BatchOp::Put { ns, key, value } => {
                    inner.overlay[ns.index()].insert(key.clone(), Some(value.clone()));
                }
                BatchOp::Delete { ns, key } => {
                    inner.overlay[ns.index()].insert(key.clone(), None);
                }
                BatchOp::DeleteRange { ns, start, end } => {
                    let i = ns.index();
                    let doomed: Vec<Vec<u8>> = if end.is_empty() {
                        inner.overlay[i]
                            .range::<[u8], _>((Bound::Included(start.as_slice()), Bound::Unbounded))
                            .map(|(k, _)| k.clone())
                            .collect()
                    } else {
                        inner.overlay[i]
                            .range::<[u8], _>((
                                Bound::Included(start.as_slice()),
                                Bound::Excluded(end.as_slice()),
                            ))
                            .map(|(k, _)| k.clone())
                            .collect()
                    };
                    for key in doomed {
                        inner.overlay[i].insert(key, None);
                    }
                    inner.ranges[i].push((start.clone(), end.clone()));
                }
            }
        }
        inner.batch.append(batch);
        if let Some(lock) = lock {
            inner.locks.push(lock);
        }
        Ok(())
    }

    /// Overlay lookup: `Some(result)` settles the read, `None` falls
    /// through to the engine
    fn overlay_get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Option<Vec<u8>>>> {
        let inner = self.inner.lock();
        inner.ensure_active()?;
        let i = ns.index();
        if let Some(v) = inner.overlay[i].get(key) {
            return Ok(Some(v.clone()));
        }
        if range_covers(&inner.ranges[i], key) {
            return Ok(Some(None));
        }
        Ok(None)
    }

    /// Clone the overlay state for one namespace (for merged iteration)
    fn snapshot(&self, ns: Namespace) -> Result<(Overlay, Vec<(Vec<u8>, Vec<u8>)>)> {
        let inner = self.inner.lock();
        inner.ensure_active()?;
        let i = ns.index();
        Ok((inner.overlay[i].clone(), inner.ranges[i].clone()))
    }
}

fn range_covers(ranges: &[(Vec<u8>, Vec<u8>)], key: &[u8]) -> bool {
    ranges
        .iter()
        .any(|(s, e)| s.as_slice() <= key && (e.is_empty() || key < e.as_slice()))
}

/// Read view over the engine, overlaying a session's uncommitted writes
///
/// With no session this is a zero-cost passthrough to the engine.
pub struct TxView<'a> {
    engine: &'a dyn StorageEngine,
    txn: Option<&'a Transaction>,
}

impl<'a> TxView<'a> {
    /// Build a view for an operation
    pub fn new(engine: &'a dyn StorageEngine, txn: Option<&'a Transaction>) -> Self {
        TxView { engine, txn }
    }

    /// Point lookup through the overlay
    pub fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(txn) = self.txn {
            if let Some(settled) = txn.overlay_get(ns, key)? {
                return Ok(settled);
            }
        }
        self.engine.get(ns, key)
    }

    /// Batched point lookups, positionally aligned with `keys`
    pub fn multi_get(&self, ns: Namespace, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        match self.txn {
            None => self.engine.multi_get(ns, keys),
            Some(_) => keys.iter().map(|k| self.get(ns, k)).collect(),
        }
    }

    /// Open a merged cursor over one namespace
    pub fn iter(&self, ns: Namespace) -> Result<ViewIterator<'a>> {
        let (overlay, ranges) = match self.txn {
            Some(txn) => txn.snapshot(ns)?,
            None => (BTreeMap::new(), Vec::new()),
        };
        Ok(ViewIterator {
            engine_it: self.engine.iter(ns),
            overlay,
            ranges,
            pending: VecDeque::new(),
            current: None,
        })
    }
}

/// Cursor merging the engine with a session overlay
///
/// Same surface as [`EngineIterator`]: `seek`, then `valid`/`key`/`value`
/// and `next`. Overlay entries win over engine entries with the same key;
/// overlay deletions and range deletions hide engine entries.
pub struct ViewIterator<'a> {
    engine_it: Box<dyn EngineIterator + 'a>,
    overlay: Overlay,
    ranges: Vec<(Vec<u8>, Vec<u8>)>,
    pending: VecDeque<(Vec<u8>, Option<Vec<u8>>)>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl ViewIterator<'_> {
    /// Position at the first visible entry with key `>= key`
    pub fn seek(&mut self, key: &[u8]) {
        self.engine_it.seek(key);
        self.pending = self
            .overlay
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.advance();
    }

    /// True while the cursor points at an entry
    pub fn valid(&self) -> bool {
        self.current.is_some()
    }

    /// Key of the current entry; only while `valid()`
    pub fn key(&self) -> &[u8] {
        let (k, _) = self.current.as_ref().expect("cursor is not valid");
        k
    }

    /// Value of the current entry; only while `valid()`
    pub fn value(&self) -> &[u8] {
        let (_, v) = self.current.as_ref().expect("cursor is not valid");
        v
    }

    /// Advance to the next visible entry
    pub fn next(&mut self) {
        self.advance();
    }

    fn advance(&mut self) {
        self.current = None;
        loop {
            let engine_key = if self.engine_it.valid() {
                Some(self.engine_it.key().to_vec())
            } else {
                None
            };
            if let Some(k) = &engine_key {
                if range_covers(&self.ranges, k) {
                    self.engine_it.next();
                    continue;
                }
            }
            let overlay_key = self.pending.front().map(|(k, _)| k.clone());
            match (engine_key, overlay_key) {
                (None, None) => return,
                (Some(ek), None) => {
                    self.current = Some((ek, self.engine_it.value().to_vec()));
                    self.engine_it.next();
                    return;
                }
                (None, Some(_)) => {
                    let Some((ok, ov)) = self.pending.pop_front() else {
                        return;
                    };
                    if let Some(v) = ov {
                        self.current = Some((ok, v));
                        return;
                    }
                }
                (Some(ek), Some(ok)) => {
                    if ok <= ek {
                        if ok == ek {
                            // Overlay entry shadows the engine entry.
                            self.engine_it.next();
                        }
                        let Some((ok, ov)) = self.pending.pop_front() else {
                            return;
                        };
                        if let Some(v) = ov {
                            self.current = Some((ok, v));
                            return;
                        }
                    } else {
                        self.current = Some((ek, self.engine_it.value().to_vec()));
                        self.engine_it.next();
                        return;
                    }
                }
            }
        }
    }
}
