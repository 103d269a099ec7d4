//! Point operations: add, remove, score, contains, len, delete

use crate::common::open_db;
use reefdb::{Entry, Error};

#[test]
fn add_then_range_returns_sorted_entries() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(10, "v1")]).unwrap();
    zset.add(None, "k", &[Entry::new(5, "v2")]).unwrap();

    let entries = zset.range(None, "k", 0, 100, 10).unwrap();
    assert_eq!(entries, vec![Entry::new(5, "v2"), Entry::new(10, "v1")]);
}

#[test]
fn add_then_remove_leaves_nothing() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(10, "v1")]).unwrap();
    zset.remove(None, "k", &[b"v1".as_slice()]).unwrap();

    assert!(!zset.contains(None, "k", b"v1").unwrap());
    assert_eq!(zset.len(None, "k").unwrap(), 0);
    assert_eq!(zset.score(None, "k", b"v1").unwrap(), None);
}

#[test]
fn score_of_absent_member_is_none_not_error() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(1, "present")]).unwrap();
    assert_eq!(zset.score(None, "k", b"absent").unwrap(), None);
    assert_eq!(zset.score(None, "missing-collection", b"m").unwrap(), None);
}

#[test]
fn scores_align_with_requested_members() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(
        None,
        "k",
        &[Entry::new(1, "a"), Entry::new(2, "b"), Entry::new(3, "d")],
    )
    .unwrap();

    let scores = zset
        .scores(
            None,
            "k",
            &[
                b"a".as_slice(),
                b"b".as_slice(),
                b"c".as_slice(),
                b"d".as_slice(),
            ],
        )
        .unwrap();
    assert_eq!(scores, vec![Some(1), Some(2), None, Some(3)]);
}

#[test]
fn scores_on_missing_collection_are_all_none() {
    let db = open_db();
    let zset = db.sorted_set();
    let scores = zset
        .scores(None, "nope", &[b"a".as_slice(), b"b".as_slice()])
        .unwrap();
    assert_eq!(scores, vec![None, None]);
}

#[test]
fn rescore_updates_without_growing() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(10, "v")]).unwrap();
    zset.add(None, "k", &[Entry::new(3, "v")]).unwrap();

    assert_eq!(zset.len(None, "k").unwrap(), 1);
    assert_eq!(zset.score(None, "k", b"v").unwrap(), Some(3));
    assert_eq!(
        zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap(),
        vec![Entry::new(3, "v")]
    );
}

#[test]
fn incr_by_leaves_no_orphaned_score_records() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(100, "v")]).unwrap();
    zset.incr_by(None, "k", 25, &[b"v".as_slice()]).unwrap();
    zset.incr_by(None, "k", -200, &[b"v".as_slice()]).unwrap();

    assert_eq!(zset.score(None, "k", b"v").unwrap(), Some(-75));
    // Every intermediate score record must be gone from range scans.
    let all = zset.range(None, "k", i64::MIN, i64::MAX, 100).unwrap();
    assert_eq!(all, vec![Entry::new(-75, "v")]);
    assert_eq!(zset.len(None, "k").unwrap(), 1);
}

#[test]
fn delete_then_add_is_a_fresh_collection() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "k", &[Entry::new(1, "a"), Entry::new(2, "b")])
        .unwrap();
    zset.delete(None, "k").unwrap();
    assert!(!zset.exists(None, "k").unwrap());
    assert_eq!(zset.len(None, "k").unwrap(), 0);

    zset.add(None, "k", &[Entry::new(9, "c")]).unwrap();
    assert!(zset.exists(None, "k").unwrap());
    assert!(!zset.contains(None, "k", b"a").unwrap());
    assert!(!zset.contains(None, "k", b"b").unwrap());
    assert_eq!(
        zset.range(None, "k", i64::MIN, i64::MAX, 10).unwrap(),
        vec![Entry::new(9, "c")]
    );
}

#[test]
fn delete_missing_collection_is_noop() {
    let db = open_db();
    db.sorted_set().delete(None, "nope").unwrap();
}

#[test]
fn distinct_keys_are_independent() {
    let db = open_db();
    let zset = db.sorted_set();

    zset.add(None, "left", &[Entry::new(1, "m")]).unwrap();
    zset.add(None, "right", &[Entry::new(2, "m")]).unwrap();

    assert_eq!(zset.score(None, "left", b"m").unwrap(), Some(1));
    assert_eq!(zset.score(None, "right", b"m").unwrap(), Some(2));

    zset.delete(None, "left").unwrap();
    assert!(!zset.exists(None, "left").unwrap());
    assert!(zset.exists(None, "right").unwrap());
}

#[test]
fn validation_errors_have_no_side_effects() {
    let db = open_db();
    let zset = db.sorted_set();

    assert!(matches!(
        zset.add(None, "k", &[]),
        Err(Error::Empty("entries"))
    ));
    assert!(matches!(
        zset.add(None, "k", &[Entry::new(1, "x"), Entry::new(2, "x")]),
        Err(Error::DuplicateMembers)
    ));
    assert!(zset.add(None, "", &[Entry::new(1, "x")]).is_err());
    assert!(matches!(
        zset.remove(None, "k", &[]),
        Err(Error::Empty("members"))
    ));

    assert!(!zset.exists(None, "k").unwrap());
}

#[test]
fn binary_members_round_trip() {
    let db = open_db();
    let zset = db.sorted_set();

    let member: Vec<u8> = vec![0x00, 0xff, 0x7f, 0x80, 0x01];
    zset.add(None, "bin", &[Entry { score: 7, member: member.clone() }])
        .unwrap();

    assert!(zset.contains(None, "bin", &member).unwrap());
    let all = zset.range(None, "bin", i64::MIN, i64::MAX, 10).unwrap();
    assert_eq!(all[0].member, member);
}
