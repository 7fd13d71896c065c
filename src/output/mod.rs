//! Output writers for snapshots.
//!
//! This module handles writing snapshot documents to disk and reading them
//! back for validation.

pub mod json;

// Re-export main functions
pub use json::{read_snapshot, snapshot_to_string, write_snapshot};
