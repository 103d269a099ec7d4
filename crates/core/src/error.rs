//! Error types for the Reef store
//!
//! All layers share one error enum. We use `thiserror` for automatic
//! `Display` and `Error` trait implementations.

use crate::key::KeyError;
use std::io;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Reef store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error surfaced by a storage engine
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Collection key failed validation
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// A required argument was empty
    #[error("empty argument: {0}")]
    Empty(&'static str),

    /// The same member appeared more than once in a single call
    #[error("duplicate members in one call")]
    DuplicateMembers,

    /// A member exceeds the configured size limit
    #[error("member too large: {actual} bytes exceeds maximum {max}")]
    MemberTooLarge {
        /// Actual member length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// A transaction session was used in an illegal state
    #[error("transaction state error: {0}")]
    TransactionState(String),

    /// The store has been closed
    #[error("store is closed")]
    Closed,

    /// An on-disk record failed to decode
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Storage engine failure
    #[error("storage error: {0}")]
    Storage(String),
}
