//! TTL and expiry suite
//!
//! Lazy expiry at read time, del_ttl/ttl rescheduling, fresh-generation
//! add after expiry, and physical reclamation by the reaper.

#[path = "../common/mod.rs"]
mod common;

use common::{open_db_with_reaper, open_db_without_reaper};
use reefdb::{Entry, Namespace, StorageEngine};
use std::thread;
use std::time::Duration;

/// Owning key bytes for a sorted-set collection (collection tag + key)
fn owner_bytes(key: &str) -> Vec<u8> {
    let mut owner = vec![b'z'];
    owner.extend_from_slice(key.as_bytes());
    owner
}

#[test]
fn expired_collection_is_invisible_before_reaping() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    zset.add_with_ttl(None, "k", 1, &[Entry::new(1, "v")]).unwrap();
    assert!(zset.exists(None, "k").unwrap());

    thread::sleep(Duration::from_millis(1300));

    // Lazily expired: every read path treats the collection as absent.
    assert!(!zset.exists(None, "k").unwrap());
    assert!(!zset.contains(None, "k", b"v").unwrap());
    assert_eq!(zset.score(None, "k", b"v").unwrap(), None);
    assert!(zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap().is_empty());
    assert_eq!(zset.len(None, "k").unwrap(), 0);

    // The record bytes are still physically present until reaped.
    let raw = db.engine().get(Namespace::Meta, &owner_bytes("k")).unwrap();
    assert!(raw.is_some());
}

#[test]
fn del_ttl_before_deadline_prevents_expiry() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    zset.add_with_ttl(None, "k", 1, &[Entry::new(1, "v")]).unwrap();
    zset.del_ttl(None, "k").unwrap();

    thread::sleep(Duration::from_millis(1300));

    assert!(zset.exists(None, "k").unwrap());
    assert_eq!(zset.score(None, "k", b"v").unwrap(), Some(1));
    assert_eq!(zset.ttl_remaining(None, "k").unwrap(), -1);
}

#[test]
fn ttl_reschedules_a_pending_expiry() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    zset.add_with_ttl(None, "k", 1, &[Entry::new(1, "v")]).unwrap();
    zset.ttl(None, "k", 1000).unwrap();

    thread::sleep(Duration::from_millis(1300));

    assert!(zset.exists(None, "k").unwrap());
    let remaining = zset.ttl_remaining(None, "k").unwrap();
    assert!(remaining > 990, "remaining = {remaining}");
}

#[test]
fn ttl_on_a_plain_collection_sets_expiry() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(1, "v")]).unwrap();
    assert_eq!(zset.ttl_remaining(None, "k").unwrap(), -1);

    zset.ttl(None, "k", 1).unwrap();
    thread::sleep(Duration::from_millis(1300));

    assert!(!zset.exists(None, "k").unwrap());
}

#[test]
fn ttl_on_a_missing_collection_is_noop() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();
    zset.ttl(None, "nope", 100).unwrap();
    zset.del_ttl(None, "nope").unwrap();
    assert!(!zset.exists(None, "nope").unwrap());
}

#[test]
fn add_after_expiry_starts_a_fresh_collection() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    zset.add_with_ttl(None, "k", 1, &[Entry::new(1, "old")]).unwrap();
    thread::sleep(Duration::from_millis(1300));
    assert!(!zset.exists(None, "k").unwrap());

    zset.add(None, "k", &[Entry::new(2, "new")]).unwrap();

    assert!(zset.exists(None, "k").unwrap());
    assert!(!zset.contains(None, "k", b"old").unwrap());
    assert_eq!(zset.len(None, "k").unwrap(), 1);
    // The fresh collection carries no expiry.
    assert_eq!(zset.ttl_remaining(None, "k").unwrap(), -1);
    assert_eq!(
        zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap(),
        vec![Entry::new(2, "new")]
    );
}

#[test]
fn reaper_physically_reclaims_expired_collections() {
    let db = open_db_with_reaper(Duration::from_millis(100));
    let zset = db.sorted_set();

    zset.add_with_ttl(None, "k", 1, &[Entry::new(1, "v")]).unwrap();
    thread::sleep(Duration::from_millis(2500));

    assert!(!zset.exists(None, "k").unwrap());
    // The metadata record itself is gone, not just invisible.
    let raw = db.engine().get(Namespace::Meta, &owner_bytes("k")).unwrap();
    assert!(raw.is_none());
}

#[test]
fn ttl_remaining_counts_down() {
    let db = open_db_without_reaper();
    let zset = db.sorted_set();

    assert_eq!(zset.ttl_remaining(None, "missing").unwrap(), -1);

    zset.add_with_ttl(None, "k", 100, &[Entry::new(1, "v")]).unwrap();
    let remaining = zset.ttl_remaining(None, "k").unwrap();
    assert!((99..=100).contains(&remaining), "remaining = {remaining}");
}
