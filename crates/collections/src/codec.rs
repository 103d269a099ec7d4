//! Byte layouts for collection records
//!
//! Pure, allocation-light conversions between structured records and their
//! exact on-disk layouts. Every encoding is a two-way lossless mapping;
//! decoding rejects truncated or mistagged input with
//! `Error::MalformedRecord` instead of reading out of bounds.
//!
//! All integers are big-endian fixed width. The layouts:
//!
//! | record            | layout                                                            |
//! |-------------------|-------------------------------------------------------------------|
//! | metadata value    | `tag ‖ size:u32 ‖ ttl_timestamp:i32 ‖ generation:u32`             |
//! | member-index key  | `tag ‖ owner_len:u32 ‖ owner ‖ generation:u32 ‖ member`           |
//! | member-index value| `score:i64` (plain big-endian)                                    |
//! | score-index key   | `tag ‖ owner_len:u32 ‖ owner ‖ generation:u32 ‖ score ‖ member`   |
//! | score-index value | empty                                                             |
//! | timer key         | `topic ‖ at:u32 ‖ payload`                                        |
//! | timer payload     | `owner_len:u32 ‖ owner ‖ metadata-head-bytes`                     |
//!
//! The owning key embedded in member/score keys is itself
//! `collection-tag ‖ application-key-bytes`, so a precomputed head prefix
//! plus [`check_head`] decides in one memcmp whether a cursor has left the
//! current collection's generation range.
//!
//! Scores inside score-index *keys* are sign-flipped (`xor 1 << 63`)
//! before the big-endian write, so the engine's lexicographic byte order
//! equals numeric `i64` order. The member-index *value* carries the score
//! as a plain big-endian `i64`; it is never compared as bytes.

use byteorder::{BigEndian, ByteOrder};
use reef_core::error::{Error, Result};
use reef_core::types::TypeTag;

/// Fixed length of an encoded metadata value
pub const META_LEN: usize = 13;

const SIGN_FLIP: u64 = 1 << 63;

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    let mut tmp = [0u8; 4];
    BigEndian::write_u32(&mut tmp, v);
    buf.extend_from_slice(&tmp);
}

fn truncated(what: &str) -> Error {
    Error::MalformedRecord(format!("truncated {what}"))
}

fn mistagged(what: &str) -> Error {
    Error::MalformedRecord(format!("{what} has wrong type tag"))
}

/// Build the owning key for a collection: collection tag + key bytes
pub fn owning_key(key: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + key.len());
    buf.push(TypeTag::ZSet.as_byte());
    buf.extend_from_slice(key.as_bytes());
    buf
}

/// True if `key` starts with `head`
///
/// The termination condition for every range scan.
#[inline]
pub fn check_head(head: &[u8], key: &[u8]) -> bool {
    key.len() >= head.len() && &key[..head.len()] == head
}

/// Exclusive upper bound of the byte range prefixed by `prefix`
///
/// Empty result means "no upper bound" (the prefix was all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last == 0xff {
            end.pop();
        } else {
            let i = end.len() - 1;
            end[i] = last + 1;
            return end;
        }
    }
    Vec::new()
}

/// Encode a score for use inside a score-index key
///
/// Sign-flipped big-endian: byte order equals numeric order.
pub fn encode_score_index(score: i64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, (score as u64) ^ SIGN_FLIP);
    buf
}

fn decode_score_index(bytes: &[u8]) -> i64 {
    (BigEndian::read_u64(bytes) ^ SIGN_FLIP) as i64
}

/// Encode a score for the member-index value
pub fn encode_score_value(score: i64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    BigEndian::write_i64(&mut buf, score);
    buf
}

/// Decode a member-index value back into a score
pub fn decode_score_value(bytes: &[u8]) -> Result<i64> {
    if bytes.len() != 8 {
        return Err(truncated("member-index value"));
    }
    Ok(BigEndian::read_i64(bytes))
}

// ============================================================================
// Metadata
// ============================================================================

/// Versioned collection metadata
///
/// One record per collection key, stored in the meta namespace under the
/// owning key. `timestamp` is an absolute epoch second, `-1` meaning "no
/// expiry". `generation` stamps every member/score record written while
/// this metadata is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    /// Cached member count (bookkeeping, not authoritative for queries)
    pub size: u32,
    /// Absolute expiry time in epoch seconds; `-1` = no expiry
    pub timestamp: i32,
    /// Generation stamped on this collection's live records
    pub generation: u32,
}

impl Meta {
    /// Fresh metadata for a newly created collection
    pub fn new(generation: u32) -> Self {
        Meta {
            size: 0,
            timestamp: -1,
            generation,
        }
    }

    /// True while the record is authoritative at `now` (epoch seconds)
    pub fn is_live(&self, now: i32) -> bool {
        self.timestamp == -1 || now < self.timestamp
    }

    /// Encode to the 13-byte metadata value
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; META_LEN];
        buf[0] = TypeTag::ZSet.as_byte();
        BigEndian::write_u32(&mut buf[1..5], self.size);
        BigEndian::write_i32(&mut buf[5..9], self.timestamp);
        BigEndian::write_u32(&mut buf[9..13], self.generation);
        buf
    }

    /// Decode a metadata value
    pub fn decode(bytes: &[u8]) -> Result<Meta> {
        if bytes.len() != META_LEN {
            return Err(truncated("metadata value"));
        }
        if bytes[0] != TypeTag::ZSet.as_byte() {
            return Err(mistagged("metadata value"));
        }
        Ok(Meta {
            size: BigEndian::read_u32(&bytes[1..5]),
            timestamp: BigEndian::read_i32(&bytes[5..9]),
            generation: BigEndian::read_u32(&bytes[9..13]),
        })
    }

    /// Stable head form: size and timestamp zeroed, generation kept
    ///
    /// Embedded in timer payloads, where the volatile fields must not
    /// affect the composite key.
    pub fn head(&self) -> Vec<u8> {
        Meta {
            size: 0,
            timestamp: 0,
            generation: self.generation,
        }
        .encode()
    }
}

// ============================================================================
// Member index
// ============================================================================

/// Build a member-index key
pub fn member_key(owner: &[u8], generation: u32, member: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9 + owner.len() + member.len());
    buf.push(TypeTag::ZSetMember.as_byte());
    push_u32(&mut buf, owner.len() as u32);
    buf.extend_from_slice(owner);
    push_u32(&mut buf, generation);
    buf.extend_from_slice(member);
    buf
}

/// Prefix shared by every member-index key of one collection generation
pub fn member_head(owner: &[u8], generation: u32) -> Vec<u8> {
    member_key(owner, generation, &[])
}

/// Decoded member-index key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberKey {
    /// Owning key (collection tag + application key bytes)
    pub owner: Vec<u8>,
    /// Generation the record was written under
    pub generation: u32,
    /// Member payload
    pub member: Vec<u8>,
}

impl MemberKey {
    /// Encode back to the wire key
    pub fn encode(&self) -> Vec<u8> {
        member_key(&self.owner, self.generation, &self.member)
    }

    /// Decode a member-index key
    pub fn decode(bytes: &[u8]) -> Result<MemberKey> {
        if bytes.len() < 9 {
            return Err(truncated("member-index key"));
        }
        if bytes[0] != TypeTag::ZSetMember.as_byte() {
            return Err(mistagged("member-index key"));
        }
        let owner_len = BigEndian::read_u32(&bytes[1..5]) as usize;
        let gen_end = 5 + owner_len + 4;
        if bytes.len() < gen_end {
            return Err(truncated("member-index key"));
        }
        Ok(MemberKey {
            owner: bytes[5..5 + owner_len].to_vec(),
            generation: BigEndian::read_u32(&bytes[5 + owner_len..gen_end]),
            member: bytes[gen_end..].to_vec(),
        })
    }
}

// ============================================================================
// Score index
// ============================================================================

/// Build a score-index key
pub fn score_key(owner: &[u8], generation: u32, score: i64, member: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(17 + owner.len() + member.len());
    buf.push(TypeTag::ZSetScore.as_byte());
    push_u32(&mut buf, owner.len() as u32);
    buf.extend_from_slice(owner);
    push_u32(&mut buf, generation);
    buf.extend_from_slice(&encode_score_index(score));
    buf.extend_from_slice(member);
    buf
}

/// Prefix shared by every score-index key of one collection generation
pub fn score_head(owner: &[u8], generation: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(9 + owner.len());
    buf.push(TypeTag::ZSetScore.as_byte());
    push_u32(&mut buf, owner.len() as u32);
    buf.extend_from_slice(owner);
    push_u32(&mut buf, generation);
    buf
}

/// Seek position for a range scan starting at `score`
pub fn score_seek(owner: &[u8], generation: u32, score: i64) -> Vec<u8> {
    score_key(owner, generation, score, &[])
}

/// Decoded score-index key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreKey {
    /// Owning key (collection tag + application key bytes)
    pub owner: Vec<u8>,
    /// Generation the record was written under
    pub generation: u32,
    /// Member score
    pub score: i64,
    /// Member payload
    pub member: Vec<u8>,
}

impl ScoreKey {
    /// Encode back to the wire key
    pub fn encode(&self) -> Vec<u8> {
        score_key(&self.owner, self.generation, self.score, &self.member)
    }

    /// Decode a score-index key
    pub fn decode(bytes: &[u8]) -> Result<ScoreKey> {
        if bytes.len() < 17 {
            return Err(truncated("score-index key"));
        }
        if bytes[0] != TypeTag::ZSetScore.as_byte() {
            return Err(mistagged("score-index key"));
        }
        let owner_len = BigEndian::read_u32(&bytes[1..5]) as usize;
        let score_end = 5 + owner_len + 4 + 8;
        if bytes.len() < score_end {
            return Err(truncated("score-index key"));
        }
        let gen_at = 5 + owner_len;
        Ok(ScoreKey {
            owner: bytes[5..gen_at].to_vec(),
            generation: BigEndian::read_u32(&bytes[gen_at..gen_at + 4]),
            score: decode_score_index(&bytes[gen_at + 4..score_end]),
            member: bytes[score_end..].to_vec(),
        })
    }
}

// ============================================================================
// Timer store
// ============================================================================

/// Build a timer-store key: topic, absolute time, payload
///
/// Cancellation must supply byte-identical time and payload.
pub fn timer_key(topic: u8, at: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5 + payload.len());
    buf.push(topic);
    push_u32(&mut buf, at);
    buf.extend_from_slice(payload);
    buf
}

/// Prefix shared by every timer entry of one topic
pub fn timer_head(topic: u8) -> Vec<u8> {
    vec![topic]
}

/// Decoded timer-store entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    /// Absolute firing time in epoch seconds
    pub at: u32,
    /// Opaque payload scheduled with the entry
    pub payload: Vec<u8>,
}

impl TimerEntry {
    /// Decode a timer key for `topic`
    pub fn decode(topic: u8, key: &[u8]) -> Result<TimerEntry> {
        if key.len() < 5 {
            return Err(truncated("timer key"));
        }
        if key[0] != topic {
            return Err(mistagged("timer key"));
        }
        Ok(TimerEntry {
            at: BigEndian::read_u32(&key[1..5]),
            payload: key[5..].to_vec(),
        })
    }
}

/// Payload of a collection-expiry timer entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerPayload {
    /// Owning key of the collection to expire
    pub owner: Vec<u8>,
    /// Metadata head bytes captured at scheduling time
    pub meta_head: Vec<u8>,
}

impl TimerPayload {
    /// Encode to the wire payload
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.owner.len() + self.meta_head.len());
        push_u32(&mut buf, self.owner.len() as u32);
        buf.extend_from_slice(&self.owner);
        buf.extend_from_slice(&self.meta_head);
        buf
    }

    /// Decode a wire payload
    pub fn decode(bytes: &[u8]) -> Result<TimerPayload> {
        if bytes.len() < 4 {
            return Err(truncated("timer payload"));
        }
        let owner_len = BigEndian::read_u32(&bytes[0..4]) as usize;
        if bytes.len() < 4 + owner_len {
            return Err(truncated("timer payload"));
        }
        Ok(TimerPayload {
            owner: bytes[4..4 + owner_len].to_vec(),
            meta_head: bytes[4 + owner_len..].to_vec(),
        })
    }
}
