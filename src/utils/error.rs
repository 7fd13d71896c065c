//! Error types for the entire crate.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.
//!
//! The start/stop path never returns these: resolution misses are `None`
//! and host read failures degrade to sentinel values.

use thiserror::Error;

/// Invalid static configuration supplied at construction time
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Execution thresholds must be non-decreasing (info={info}, notice={notice}, warning={warning}, critical={critical})")]
    InvalidThresholds {
        info: u64,
        notice: u64,
        warning: u64,
        critical: u64,
    },

    #[error("Precision {0} is out of range (maximum {max})", max = crate::utils::config::MAX_PRECISION)]
    InvalidPrecision(u32),
}

/// Errors that can occur during snapshot file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// A snapshot document that breaks the wire schema's consistency rules
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Record {record} references unknown group {group}")]
    UnknownGroup { record: u64, group: u64 },

    #[error("Record key {key} does not match record id {id}")]
    RecordIdMismatch { key: u64, id: u64 },

    #[error("Aggregator {aggregator} contains invalid record: {record}")]
    UnknownRecord { aggregator: u64, record: u64 },

    #[error("Records are not ordered by start time (record {0})")]
    Unordered(u64),

    #[error("Invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
}
