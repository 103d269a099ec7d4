//! Transaction session suite
//!
//! Atomic visibility, rollback, retained locks, read-your-own-writes and
//! poisoning after a mid-session storage failure.

#[path = "../common/mod.rs"]
mod common;

use common::open_db;
use reefdb::{
    Db, EngineIterator, Entry, Error, MemoryEngine, Namespace, StorageEngine, TxStatus, WriteBatch,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn commit_makes_all_operations_visible_atomically() {
    let db = open_db();
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "a", &[Entry::new(1, "m1")]).unwrap();
    zset.add(Some(&txn), "b", &[Entry::new(2, "m2")]).unwrap();

    // Nothing is visible outside the session before commit.
    assert!(!zset.exists(None, "a").unwrap());
    assert!(!zset.exists(None, "b").unwrap());

    txn.commit().unwrap();

    assert_eq!(zset.score(None, "a", b"m1").unwrap(), Some(1));
    assert_eq!(zset.score(None, "b", b"m2").unwrap(), Some(2));
}

#[test]
fn rollback_leaves_store_exactly_as_before() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(1, "keep1"), Entry::new(2, "keep2")])
        .unwrap();
    let before = zset.range(None, "k", i64::MIN, i64::MAX, 100).unwrap();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(9, "added")]).unwrap();
    zset.remove(Some(&txn), "k", &[b"keep1".as_slice()]).unwrap();
    zset.range_del(Some(&txn), "k", 2, 2, 10).unwrap();
    zset.add(Some(&txn), "other", &[Entry::new(1, "x")]).unwrap();
    txn.rollback();

    let after = zset.range(None, "k", i64::MIN, i64::MAX, 100).unwrap();
    assert_eq!(after, before);
    assert_eq!(zset.len(None, "k").unwrap(), 2);
    assert!(!zset.exists(None, "other").unwrap());
}

#[test]
fn dropping_an_unfinished_session_rolls_back() {
    let db = open_db();
    let zset = db.sorted_set();

    {
        let txn = db.begin().unwrap();
        zset.add(Some(&txn), "k", &[Entry::new(1, "m")]).unwrap();
    }

    assert!(!zset.exists(None, "k").unwrap());
}

#[test]
fn session_reads_its_own_uncommitted_writes() {
    let db = open_db();
    let zset = db.sorted_set();
    zset.add(None, "k", &[Entry::new(1, "committed")]).unwrap();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(5, "pending")]).unwrap();

    assert!(zset.contains(Some(&txn), "k", b"pending").unwrap());
    assert_eq!(zset.score(Some(&txn), "k", b"pending").unwrap(), Some(5));
    let merged = zset.range(Some(&txn), "k", i64::MIN, i64::MAX, 10).unwrap();
    assert_eq!(
        merged,
        vec![Entry::new(1, "committed"), Entry::new(5, "pending")]
    );
    assert_eq!(zset.len(Some(&txn), "k").unwrap(), 2);

    txn.rollback();
    assert_eq!(zset.len(None, "k").unwrap(), 1);
}

#[test]
fn several_operations_on_one_key_compose_in_one_session() {
    let db = open_db();
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(1, "a")]).unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(2, "b")]).unwrap();
    zset.remove(Some(&txn), "k", &[b"a".as_slice()]).unwrap();
    txn.commit().unwrap();

    assert_eq!(zset.len(None, "k").unwrap(), 1);
    assert_eq!(
        zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap(),
        vec![Entry::new(2, "b")]
    );
}

#[test]
fn add_then_delete_then_add_within_one_session() {
    let db = open_db();
    let zset = db.sorted_set();
    zset.add(None, "k", &[Entry::new(1, "old")]).unwrap();

    let txn = db.begin().unwrap();
    zset.delete(Some(&txn), "k").unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(2, "new")]).unwrap();
    txn.commit().unwrap();

    assert!(!zset.contains(None, "k", b"old").unwrap());
    assert_eq!(
        zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap(),
        vec![Entry::new(2, "new")]
    );
    assert_eq!(zset.len(None, "k").unwrap(), 1);
}

#[test]
fn locks_are_retained_until_commit() {
    let db = Arc::new(open_db());
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "contended", &[Entry::new(1, "tx")])
        .unwrap();

    let db2 = Arc::clone(&db);
    let other = thread::spawn(move || {
        db2.sorted_set()
            .add(None, "contended", &[Entry::new(2, "outside")])
            .unwrap();
    });

    // The other thread must stay blocked on the retained key lock.
    thread::sleep(Duration::from_millis(60));
    assert!(!other.is_finished());

    txn.commit().unwrap();
    other.join().unwrap();

    assert_eq!(zset.len(None, "contended").unwrap(), 2);
}

#[test]
fn sessions_on_distinct_keys_do_not_block_each_other() {
    let db = Arc::new(open_db());
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "mine", &[Entry::new(1, "m")]).unwrap();

    let db2 = Arc::clone(&db);
    let other = thread::spawn(move || {
        db2.sorted_set()
            .add(None, "theirs", &[Entry::new(2, "m")])
            .unwrap();
    });
    other.join().unwrap();

    assert!(zset.exists(None, "theirs").unwrap());
    txn.commit().unwrap();
}

// ============================================================================
// Poisoning after a mid-session storage failure
// ============================================================================

/// Engine wrapper that injects read failures on demand
struct FailingEngine {
    inner: MemoryEngine,
    fail_reads: AtomicBool,
}

impl FailingEngine {
    fn new() -> Self {
        FailingEngine {
            inner: MemoryEngine::new(),
            fail_reads: AtomicBool::new(false),
        }
    }
}

impl StorageEngine for FailingEngine {
    fn get(&self, ns: Namespace, key: &[u8]) -> reefdb::Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::Storage("injected read failure".to_string()));
        }
        self.inner.get(ns, key)
    }

    fn put(&self, ns: Namespace, key: &[u8], value: &[u8]) -> reefdb::Result<()> {
        self.inner.put(ns, key, value)
    }

    fn delete(&self, ns: Namespace, key: &[u8]) -> reefdb::Result<()> {
        self.inner.delete(ns, key)
    }

    fn delete_range(&self, ns: Namespace, start: &[u8], end: &[u8]) -> reefdb::Result<()> {
        self.inner.delete_range(ns, start, end)
    }

    fn write(&self, batch: WriteBatch) -> reefdb::Result<()> {
        self.inner.write(batch)
    }

    fn iter(&self, ns: Namespace) -> Box<dyn EngineIterator + '_> {
        self.inner.iter(ns)
    }
}

#[test]
fn failed_operation_poisons_the_session() {
    let engine = Arc::new(FailingEngine::new());
    let db = Db::open(engine.clone()).unwrap();
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(1, "before")]).unwrap();

    engine.fail_reads.store(true, Ordering::Relaxed);
    let failed = zset.add(Some(&txn), "k", &[Entry::new(2, "during")]);
    engine.fail_reads.store(false, Ordering::Relaxed);

    assert!(matches!(failed, Err(Error::Storage(_))));
    assert_eq!(txn.status(), TxStatus::RolledBack);

    // Commit is refused; nothing from the session is visible.
    assert!(matches!(txn.commit(), Err(Error::TransactionState(_))));
    assert!(!zset.exists(None, "k").unwrap());

    // The poisoned session released its locks: a new session works.
    let txn = db.begin().unwrap();
    zset.add(Some(&txn), "k", &[Entry::new(3, "after")]).unwrap();
    txn.commit().unwrap();
    assert_eq!(zset.score(None, "k", b"after").unwrap(), Some(3));
}

#[test]
fn operations_on_a_poisoned_session_fail_fast() {
    let db = open_db();
    let zset = db.sorted_set();

    let txn = db.begin().unwrap();
    txn.poison();

    assert!(matches!(
        zset.add(Some(&txn), "k", &[Entry::new(1, "m")]),
        Err(Error::TransactionState(_))
    ));
    assert!(matches!(
        zset.range(Some(&txn), "k", 0, 10, 10),
        Err(Error::TransactionState(_))
    ));
}
