//! Size limits enforced at the API boundary

/// Size limits for keys and members
///
/// Checked before any lock or storage access; violations fail the
/// operation with a validation error and no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum collection key length in bytes (UTF-8)
    pub max_key_bytes: usize,
    /// Maximum member payload length in bytes
    pub max_member_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 1024,
            max_member_bytes: 64 * 1024,
        }
    }
}
