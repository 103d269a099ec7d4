//! Sorted-set collection
//!
//! Members are byte payloads ordered by a 64-bit score. Two paired index
//! records exist per member so both lookup-by-member and range-scan-by-
//! score are single seeks: the member index maps member -> score, the
//! score index maps (score, member) -> existence.
//!
//! Every mutating operation follows the same shape: lifecycle guard,
//! validation, key lock, read view (overlaying an active session), one
//! write batch with the metadata record last, then commit — or fold into
//! the session. Clearing a collection is O(1): the generation bump makes
//! old records invisible immediately and their bytes are reclaimed by
//! head range-deletes folded into whichever later operation touches the
//! key.

use crate::codec::{self, Meta, ScoreKey, TimerPayload};
use crate::meta::{self, now_secs};
use crate::timer;
use crate::StoreContext;
use reef_concurrency::{LockHandle, Transaction, TxView};
use reef_core::error::{Error, Result};
use reef_core::traits::StorageEngine;
use reef_core::types::Namespace;
use reef_core::WriteBatch;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// One scored member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Ordering score
    pub score: i64,
    /// Member payload
    pub member: Vec<u8>,
}

impl Entry {
    /// Convenience constructor
    pub fn new(score: i64, member: impl Into<Vec<u8>>) -> Self {
        Entry {
            score,
            member: member.into(),
        }
    }
}

/// Sorted-set collection facade
///
/// Stateless over the injected [`StoreContext`]; cloning is cheap and
/// clones may be used from multiple threads.
#[derive(Clone)]
pub struct SortedSet {
    ctx: Arc<StoreContext>,
}

fn reclaim_generation(batch: &mut WriteBatch, owner: &[u8], generation: u32) {
    let member_head = codec::member_head(owner, generation);
    let member_end = codec::prefix_end(&member_head);
    batch.delete_range(Namespace::Data, member_head, member_end);

    let score_head = codec::score_head(owner, generation);
    let score_end = codec::prefix_end(&score_head);
    batch.delete_range(Namespace::Data, score_head, score_end);
}

fn expiry_payload(owner: &[u8], meta: &Meta) -> Vec<u8> {
    TimerPayload {
        owner: owner.to_vec(),
        meta_head: meta.head(),
    }
    .encode()
}

impl SortedSet {
    /// Create a facade over the shared store machinery
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        SortedSet { ctx }
    }

    fn owner(&self, key: &str) -> Result<Vec<u8>> {
        reef_core::validate_key_with_limits(key, &self.ctx.limits)?;
        Ok(codec::owning_key(key))
    }

    /// Acquire the key lock unless the session already retains it
    fn lock_for(&self, txn: Option<&Transaction>, owner: &[u8]) -> Option<LockHandle> {
        if let Some(txn) = txn {
            if txn.holds(owner) {
                return None;
            }
        }
        Some(self.ctx.locks.acquire(owner))
    }

    /// Commit the batch, or fold batch and lock into the session
    fn finish(
        &self,
        txn: Option<&Transaction>,
        batch: WriteBatch,
        lock: Option<LockHandle>,
    ) -> Result<()> {
        match txn {
            Some(txn) => txn.fold(batch, lock),
            None => self.ctx.engine.write(batch),
        }
    }

    /// Poison the session if the mutation failed mid-flight
    fn run_mutation<T>(
        &self,
        txn: Option<&Transaction>,
        f: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let result = f();
        if result.is_err() {
            if let Some(txn) = txn {
                txn.poison();
            }
        }
        result
    }

    // ========== Mutations ==========

    /// Add or re-score members
    ///
    /// Entries must be non-empty and pairwise member-distinct. An entry
    /// whose member already exists re-scores it (size unchanged); a new
    /// member increments size.
    pub fn add(&self, txn: Option<&Transaction>, key: &str, entries: &[Entry]) -> Result<()> {
        self.add_may_ttl(txn, key, None, entries)
    }

    /// Add members, creating the collection with a TTL if it doesn't exist
    ///
    /// The TTL only applies when this call creates the collection; an
    /// existing collection keeps its expiry unchanged.
    pub fn add_with_ttl(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        ttl_secs: u32,
        entries: &[Entry],
    ) -> Result<()> {
        self.add_may_ttl(txn, key, Some(ttl_secs), entries)
    }

    fn add_may_ttl(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        ttl: Option<u32>,
        entries: &[Entry],
    ) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        if entries.is_empty() {
            return Err(Error::Empty("entries"));
        }
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if entry.member.len() > self.ctx.limits.max_member_bytes {
                return Err(Error::MemberTooLarge {
                    actual: entry.member.len(),
                    max: self.ctx.limits.max_member_bytes,
                });
            }
            if !seen.insert(entry.member.as_slice()) {
                return Err(Error::DuplicateMembers);
            }
        }
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.add_locked(txn, &owner, ttl, entries))
    }

    fn add_locked(
        &self,
        txn: Option<&Transaction>,
        owner: &[u8],
        ttl: Option<u32>,
        entries: &[Entry],
    ) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let mut batch = WriteBatch::new();
        let now = now_secs();

        let mut meta = match meta::load_ignoring_ttl(&view, owner)? {
            Some(existing) if existing.is_live(now) => existing,
            stale => {
                // Establishing a fresh collection: reclaim the expired
                // generation's records and cancel its pending timer.
                if let Some(stale) = stale {
                    reclaim_generation(&mut batch, owner, stale.generation);
                    if stale.timestamp != -1 {
                        timer::cancel(
                            &mut batch,
                            timer::COLLECTION_EXPIRY,
                            stale.timestamp as u32,
                            &expiry_payload(owner, &stale),
                        );
                    }
                }
                let generation = self.ctx.generations.next(&*self.ctx.engine)?;
                debug!(generation, "creating collection");
                let mut fresh = Meta::new(generation);
                if let Some(secs) = ttl {
                    fresh.timestamp = now.saturating_add(secs.min(i32::MAX as u32) as i32);
                    timer::schedule(
                        &mut batch,
                        timer::COLLECTION_EXPIRY,
                        fresh.timestamp as u32,
                        &expiry_payload(owner, &fresh),
                    );
                }
                fresh
            }
        };

        for entry in entries {
            let member_key = codec::member_key(owner, meta.generation, &entry.member);
            match view.get(Namespace::Data, &member_key)? {
                Some(old) => {
                    // Re-score: the stale score-index record goes away.
                    let old_score = codec::decode_score_value(&old)?;
                    batch.delete(
                        Namespace::Data,
                        codec::score_key(owner, meta.generation, old_score, &entry.member),
                    );
                }
                None => meta.size += 1,
            }
            batch.put(
                Namespace::Data,
                member_key,
                codec::encode_score_value(entry.score).to_vec(),
            );
            batch.put(
                Namespace::Data,
                codec::score_key(owner, meta.generation, entry.score, &entry.member),
                Vec::new(),
            );
        }

        batch.put(Namespace::Meta, owner.to_vec(), meta.encode());
        self.finish(txn, batch, lock)
    }

    /// Remove members; members not present are silently skipped
    pub fn remove(&self, txn: Option<&Transaction>, key: &str, members: &[&[u8]]) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        if members.is_empty() {
            return Err(Error::Empty("members"));
        }
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.remove_locked(txn, &owner, members))
    }

    fn remove_locked(
        &self,
        txn: Option<&Transaction>,
        owner: &[u8],
        members: &[&[u8]],
    ) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(mut meta) = meta::load(&view, owner)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        let mut removed = 0u32;
        for member in members {
            let member_key = codec::member_key(owner, meta.generation, member);
            if let Some(value) = view.get(Namespace::Data, &member_key)? {
                let score = codec::decode_score_value(&value)?;
                batch.delete(
                    Namespace::Data,
                    codec::score_key(owner, meta.generation, score, member),
                );
                batch.delete(Namespace::Data, member_key);
                removed += 1;
            }
        }
        if removed == 0 {
            return Ok(());
        }
        meta.size = meta.size.saturating_sub(removed);
        batch.put(Namespace::Meta, owner.to_vec(), meta.encode());
        self.finish(txn, batch, lock)
    }

    /// Return and delete every entry with score in `[start, end]`
    ///
    /// Returns the same entries [`SortedSet::range`] would for identical
    /// arguments; deletions and the size update commit as one batch.
    pub fn range_del(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.range_del_locked(txn, &owner, start, end, limit))
    }

    fn range_del_locked(
        &self,
        txn: Option<&Transaction>,
        owner: &[u8],
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(mut meta) = meta::load(&view, owner)? else {
            return Ok(Vec::new());
        };

        let head = codec::score_head(owner, meta.generation);
        let mut batch = WriteBatch::new();
        let mut out = Vec::new();
        let mut it = view.iter(Namespace::Data)?;
        it.seek(&codec::score_seek(owner, meta.generation, start));
        while it.valid() && out.len() < limit {
            if !codec::check_head(&head, it.key()) {
                break;
            }
            let decoded = ScoreKey::decode(it.key())?;
            if decoded.score > end {
                break;
            }
            batch.delete(Namespace::Data, it.key().to_vec());
            batch.delete(
                Namespace::Data,
                codec::member_key(owner, meta.generation, &decoded.member),
            );
            out.push(Entry {
                score: decoded.score,
                member: decoded.member,
            });
            it.next();
        }
        if out.is_empty() {
            return Ok(out);
        }
        meta.size = meta.size.saturating_sub(out.len() as u32);
        batch.put(Namespace::Meta, owner.to_vec(), meta.encode());
        self.finish(txn, batch, lock)?;
        Ok(out)
    }

    /// Add `delta` to the score of each present member
    ///
    /// Members not present (and absent collections) are silently skipped.
    /// The member's old score-index record is removed and reinserted at
    /// the new score, the same as `add`'s re-score path.
    pub fn incr_by(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        delta: i64,
        members: &[&[u8]],
    ) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        if members.is_empty() {
            return Err(Error::Empty("members"));
        }
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.incr_locked(txn, &owner, delta, members))
    }

    fn incr_locked(
        &self,
        txn: Option<&Transaction>,
        owner: &[u8],
        delta: i64,
        members: &[&[u8]],
    ) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, owner)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        for member in members {
            let member_key = codec::member_key(owner, meta.generation, member);
            if let Some(value) = view.get(Namespace::Data, &member_key)? {
                let old = codec::decode_score_value(&value)?;
                let new = old.wrapping_add(delta);
                batch.delete(
                    Namespace::Data,
                    codec::score_key(owner, meta.generation, old, member),
                );
                batch.put(
                    Namespace::Data,
                    member_key,
                    codec::encode_score_value(new).to_vec(),
                );
                batch.put(
                    Namespace::Data,
                    codec::score_key(owner, meta.generation, new, member),
                    Vec::new(),
                );
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.finish(txn, batch, lock)
    }

    /// Remove the collection: metadata plus both index ranges
    pub fn delete(&self, txn: Option<&Transaction>, key: &str) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.delete_locked(txn, &owner))
    }

    fn delete_locked(&self, txn: Option<&Transaction>, owner: &[u8]) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, owner)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        batch.delete(Namespace::Meta, owner.to_vec());
        reclaim_generation(&mut batch, owner, meta.generation);
        if meta.timestamp != -1 {
            timer::cancel(
                &mut batch,
                timer::COLLECTION_EXPIRY,
                meta.timestamp as u32,
                &expiry_payload(owner, &meta),
            );
        }
        self.finish(txn, batch, lock)
    }

    /// Set the collection's expiry to `secs` from now
    ///
    /// A no-op when the collection doesn't exist. Any previously
    /// scheduled expiry is cancelled first.
    pub fn ttl(&self, txn: Option<&Transaction>, key: &str, secs: u32) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.ttl_locked(txn, &owner, secs))
    }

    fn ttl_locked(&self, txn: Option<&Transaction>, owner: &[u8], secs: u32) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(mut meta) = meta::load(&view, owner)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::new();
        if meta.timestamp != -1 {
            timer::cancel(
                &mut batch,
                timer::COLLECTION_EXPIRY,
                meta.timestamp as u32,
                &expiry_payload(owner, &meta),
            );
        }
        meta.timestamp = now_secs().saturating_add(secs.min(i32::MAX as u32) as i32);
        batch.put(Namespace::Meta, owner.to_vec(), meta.encode());
        timer::schedule(
            &mut batch,
            timer::COLLECTION_EXPIRY,
            meta.timestamp as u32,
            &expiry_payload(owner, &meta),
        );
        self.finish(txn, batch, lock)
    }

    /// Remove the collection's expiry
    ///
    /// Sees an expired-but-unreaped record, matching the ttl-bookkeeping
    /// contract: rescheduling paths operate on the raw metadata.
    pub fn del_ttl(&self, txn: Option<&Transaction>, key: &str) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        self.run_mutation(txn, || self.del_ttl_locked(txn, &owner))
    }

    fn del_ttl_locked(&self, txn: Option<&Transaction>, owner: &[u8]) -> Result<()> {
        let lock = self.lock_for(txn, owner);
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(mut meta) = meta::load_ignoring_ttl(&view, owner)? else {
            return Ok(());
        };
        if meta.timestamp == -1 {
            return Ok(());
        }

        let mut batch = WriteBatch::new();
        timer::cancel(
            &mut batch,
            timer::COLLECTION_EXPIRY,
            meta.timestamp as u32,
            &expiry_payload(owner, &meta),
        );
        meta.timestamp = -1;
        batch.put(Namespace::Meta, owner.to_vec(), meta.encode());
        self.finish(txn, batch, lock)
    }

    // ========== Queries ==========

    /// Entries with score in `[start, end]`, ascending, at most `limit`
    pub fn range(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<Entry>> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(Vec::new());
        };

        let head = codec::score_head(&owner, meta.generation);
        let mut out = Vec::new();
        let mut it = view.iter(Namespace::Data)?;
        it.seek(&codec::score_seek(&owner, meta.generation, start));
        while it.valid() && out.len() < limit {
            if !codec::check_head(&head, it.key()) {
                break;
            }
            let decoded = ScoreKey::decode(it.key())?;
            if decoded.score > end {
                break;
            }
            out.push(Entry {
                score: decoded.score,
                member: decoded.member,
            });
            it.next();
        }
        Ok(out)
    }

    /// Score of one member, `None` if absent
    pub fn score(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        member: &[u8],
    ) -> Result<Option<i64>> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(None);
        };
        match view.get(
            Namespace::Data,
            &codec::member_key(&owner, meta.generation, member),
        )? {
            None => Ok(None),
            Some(value) => Ok(Some(codec::decode_score_value(&value)?)),
        }
    }

    /// Scores of several members, positionally aligned with `members`
    pub fn scores(
        &self,
        txn: Option<&Transaction>,
        key: &str,
        members: &[&[u8]],
    ) -> Result<Vec<Option<i64>>> {
        let _op = self.ctx.lifecycle.enter()?;
        if members.is_empty() {
            return Err(Error::Empty("members"));
        }
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(vec![None; members.len()]);
        };

        let keys: Vec<Vec<u8>> = members
            .iter()
            .map(|m| codec::member_key(&owner, meta.generation, m))
            .collect();
        view.multi_get(Namespace::Data, &keys)?
            .into_iter()
            .map(|value| match value {
                None => Ok(None),
                Some(bytes) => Ok(Some(codec::decode_score_value(&bytes)?)),
            })
            .collect()
    }

    /// Membership check via the member index only
    pub fn contains(&self, txn: Option<&Transaction>, key: &str, member: &[u8]) -> Result<bool> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(false);
        };
        Ok(view
            .get(
                Namespace::Data,
                &codec::member_key(&owner, meta.generation, member),
            )?
            .is_some())
    }

    /// Member count, by full iteration of the live member-index range
    ///
    /// The cached metadata size is bookkeeping used inside mutations; the
    /// query API counts the records themselves.
    pub fn len(&self, txn: Option<&Transaction>, key: &str) -> Result<u64> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(0);
        };

        let head = codec::member_head(&owner, meta.generation);
        let mut count = 0u64;
        let mut it = view.iter(Namespace::Data)?;
        it.seek(&head);
        while it.valid() && codec::check_head(&head, it.key()) {
            count += 1;
            it.next();
        }
        Ok(count)
    }

    /// True if the collection exists and has not lazily expired
    pub fn exists(&self, txn: Option<&Transaction>, key: &str) -> Result<bool> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        Ok(meta::load(&view, &owner)?.is_some())
    }

    /// Seconds until expiry; `-1` if absent or no expiry is set
    pub fn ttl_remaining(&self, txn: Option<&Transaction>, key: &str) -> Result<i64> {
        let _op = self.ctx.lifecycle.enter()?;
        let owner = self.owner(key)?;
        let view = TxView::new(&*self.ctx.engine, txn);
        let Some(meta) = meta::load(&view, &owner)? else {
            return Ok(-1);
        };
        if meta.timestamp == -1 {
            return Ok(-1);
        }
        Ok(i64::from(meta.timestamp) - i64::from(now_secs()))
    }

    // ========== Expiry callback ==========

    /// Handle one fired expiry timer
    ///
    /// Re-reads the metadata under the key lock and compares its current
    /// ttl timestamp with the fired time: a mismatch means the expiry was
    /// superseded by a later `ttl`/`add` call and the event is a stale
    /// no-op. Either way the fired timer entry is removed.
    pub fn expire_due(&self, fired_at: u32, payload: &[u8]) -> Result<()> {
        let _op = self.ctx.lifecycle.enter()?;
        let decoded = codec::TimerPayload::decode(payload)?;
        let owner = decoded.owner;

        let _lock = self.ctx.locks.acquire(&owner);
        let view = TxView::new(&*self.ctx.engine, None);
        let mut batch = WriteBatch::new();
        match meta::load_ignoring_ttl(&view, &owner)? {
            Some(current) if current.timestamp == fired_at as i32 => {
                debug!(
                    key = %String::from_utf8_lossy(&owner[1..]),
                    generation = current.generation,
                    "expiring collection"
                );
                batch.delete(Namespace::Meta, owner.clone());
                reclaim_generation(&mut batch, &owner, current.generation);
            }
            _ => {
                // Superseded by a later ttl/add, or already gone.
            }
        }
        batch.delete(
            Namespace::Data,
            codec::timer_key(timer::COLLECTION_EXPIRY, fired_at, payload),
        );
        self.ctx.engine.write(batch)
    }
}
