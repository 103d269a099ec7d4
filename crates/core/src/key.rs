//! Collection-key validation
//!
//! Collection keys are application-chosen Unicode strings. They are
//! validated at every public API entry point before any lock or storage
//! access:
//! - Keys must not be empty
//! - Keys must not exceed `max_key_bytes` (default: 1024)
//!
//! UTF-8 validity is guaranteed by Rust's `&str` type.

use crate::limits::Limits;
use thiserror::Error;

/// Validate a collection key using default limits
///
/// # Examples
///
/// ```
/// use reef_core::key::validate_key;
///
/// assert!(validate_key("scores").is_ok());
/// assert!(validate_key("user:123").is_ok());
/// assert!(validate_key("").is_err());
/// ```
pub fn validate_key(key: &str) -> Result<(), KeyError> {
    validate_key_with_limits(key, &Limits::default())
}

/// Validate a collection key against custom limits
pub fn validate_key_with_limits(key: &str, limits: &Limits) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }

    let len = key.len();
    if len > limits.max_key_bytes {
        return Err(KeyError::TooLong {
            actual: len,
            max: limits.max_key_bytes,
        });
    }

    Ok(())
}

/// Key validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Key is empty (length 0)
    #[error("key cannot be empty")]
    Empty,

    /// Key exceeds maximum length
    #[error("key too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Actual key length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}
