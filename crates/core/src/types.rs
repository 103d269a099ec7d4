//! Record kind tags and engine namespaces
//!
//! Every record in the shared byte key space starts with a one-byte type
//! tag, so different record kinds (and different collection types) never
//! collide. The storage engine exposes two independent namespaces: `Meta`
//! for collection metadata and `Data` for member/score/timer records.

/// One-byte tag identifying the kind of record a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// Sorted-set collection metadata (also the owning-key prefix)
    ZSet = b'z',
    /// Sorted-set member-index record (member -> score)
    ZSetMember = b'm',
    /// Sorted-set score-index record ((score, member) existence)
    ZSetScore = b's',
    /// Timer-store entry (absolute expiration time index)
    Timer = b't',
}

impl TypeTag {
    /// The tag as its wire byte
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode a wire byte back into a tag
    pub fn from_byte(b: u8) -> Option<TypeTag> {
        match b {
            b'z' => Some(TypeTag::ZSet),
            b'm' => Some(TypeTag::ZSetMember),
            b's' => Some(TypeTag::ZSetScore),
            b't' => Some(TypeTag::Timer),
            _ => None,
        }
    }
}

/// Independent key spaces within the storage engine
///
/// Maps onto engine column families. Metadata records live apart from
/// bulk data so metadata scans never wade through member records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Collection metadata records
    Meta,
    /// Member-index, score-index and timer records
    Data,
}

impl Namespace {
    /// All namespaces, in fixed order
    pub const ALL: [Namespace; 2] = [Namespace::Meta, Namespace::Data];

    /// Stable index for array-backed per-namespace state
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Namespace::Meta => 0,
            Namespace::Data => 1,
        }
    }
}
