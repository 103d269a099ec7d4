//! Ordered in-memory storage engine
//!
//! One `BTreeMap<Vec<u8>, Vec<u8>>` per namespace behind a
//! `parking_lot::RwLock`. Reads take the shared lock; single writes and
//! batch application take the exclusive lock. `write` holds the guards of
//! every namespace touched by the batch at once, so a concurrent reader
//! never observes a partially applied batch.
//!
//! Iterators are cursor-based: each step re-acquires the shared lock and
//! takes the next key strictly greater than the current one. A cursor
//! therefore never blocks writers between steps and tolerates concurrent
//! mutation; callers that need a stable scan hold the collection's key
//! lock, which is what every store operation does.

use parking_lot::RwLock;
use reef_core::batch::BatchOp;
use reef_core::error::Result;
use reef_core::traits::{EngineIterator, StorageEngine};
use reef_core::types::Namespace;
use reef_core::WriteBatch;
use std::collections::BTreeMap;
use std::ops::Bound;

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory ordered engine with one tree per namespace
#[derive(Debug, Default)]
pub struct MemoryEngine {
    trees: [RwLock<Tree>; 2],
}

impl MemoryEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        MemoryEngine::default()
    }

    fn tree(&self, ns: Namespace) -> &RwLock<Tree> {
        &self.trees[ns.index()]
    }

    fn apply_op(tree: &mut Tree, op: BatchOp) {
        match op {
            BatchOp::Put { key, value, .. } => {
                tree.insert(key, value);
            }
            BatchOp::Delete { key, .. } => {
                tree.remove(&key);
            }
            BatchOp::DeleteRange { start, end, .. } => {
                Self::remove_range(tree, &start, &end);
            }
        }
    }

    fn remove_range(tree: &mut Tree, start: &[u8], end: &[u8]) {
        // split_off(start) takes everything >= start; splitting the tail
        // again at end leaves exactly [start, end) to be dropped.
        let mut tail = tree.split_off(start);
        if !end.is_empty() {
            let mut keep = tail.split_off(end);
            tree.append(&mut keep);
        }
    }
}

impl StorageEngine for MemoryEngine {
    fn get(&self, ns: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tree(ns).read().get(key).cloned())
    }

    fn put(&self, ns: Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        self.tree(ns).write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, ns: Namespace, key: &[u8]) -> Result<()> {
        self.tree(ns).write().remove(key);
        Ok(())
    }

    fn delete_range(&self, ns: Namespace, start: &[u8], end: &[u8]) -> Result<()> {
        let mut tree = self.tree(ns).write();
        Self::remove_range(&mut tree, start, end);
        Ok(())
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        // Exclusive guards over all namespaces for the whole batch.
        let mut meta = self.trees[Namespace::Meta.index()].write();
        let mut data = self.trees[Namespace::Data.index()].write();
        for op in batch.into_ops() {
            let tree = match op {
                BatchOp::Put { ns, .. }
                | BatchOp::Delete { ns, .. }
                | BatchOp::DeleteRange { ns, .. } => match ns {
                    Namespace::Meta => &mut *meta,
                    Namespace::Data => &mut *data,
                },
            };
            Self::apply_op(tree, op);
        }
        Ok(())
    }

    fn iter(&self, ns: Namespace) -> Box<dyn EngineIterator + '_> {
        Box::new(MemoryIterator {
            tree: self.tree(ns),
            current: None,
        })
    }
}

/// Cursor over one namespace of a [`MemoryEngine`]
struct MemoryIterator<'a> {
    tree: &'a RwLock<Tree>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl EngineIterator for MemoryIterator<'_> {
    fn seek(&mut self, key: &[u8]) {
        let tree = self.tree.read();
        self.current = tree
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        let (k, _) = self.current.as_ref().expect("cursor is not valid");
        k
    }

    fn value(&self) -> &[u8] {
        let (_, v) = self.current.as_ref().expect("cursor is not valid");
        v
    }

    fn next(&mut self) {
        let Some((cur, _)) = self.current.take() else {
            return;
        };
        let tree = self.tree.read();
        self.current = tree
            .range::<[u8], _>((Bound::Excluded(cur.as_slice()), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
    }
}
