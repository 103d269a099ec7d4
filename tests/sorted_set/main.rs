//! Sorted-set integration suite

#[path = "../common/mod.rs"]
mod common;

mod ops;
