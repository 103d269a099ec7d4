//! Core types and traits for Reef
//!
//! This crate defines the foundational pieces used throughout the store:
//! - Error: the store-wide error taxonomy
//! - Key validation and Limits
//! - TypeTag / Namespace: record kind tags and engine namespaces
//! - WriteBatch: the ordered atomic mutation unit
//! - StorageEngine / EngineIterator: the ordered key-value engine contract

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod key;
pub mod limits;
pub mod traits;
pub mod types;

pub use batch::{BatchOp, WriteBatch};
pub use error::{Error, Result};
pub use key::{validate_key, validate_key_with_limits, KeyError};
pub use limits::Limits;
pub use traits::{EngineIterator, StorageEngine};
pub use types::{Namespace, TypeTag};
