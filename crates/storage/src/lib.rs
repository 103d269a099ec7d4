//! In-process ordered storage engine for Reef
//!
//! The store treats the engine as an external collaborator behind
//! `reef_core::StorageEngine`; this crate provides the in-process
//! instance used by tests and by embedders who don't bring their own
//! engine. It is a plain ordered map per namespace — no write-ahead log,
//! no compaction — but it honors the full contract: ordered iteration,
//! range deletes and atomic batch application.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;

pub use memory::MemoryEngine;
