//! Snapshot wire schema.
//!
//! This module defines the structure of the JSON document produced by the
//! snapshot builder and consumed by viewers. Integer identities are map keys
//! and therefore strings on the wire; maps keep their insertion order.

use crate::core::{OrderedMap, Severity};
use serde::{Deserialize, Serialize};

/// Top-level snapshot document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds at build time
    pub generated: i64,

    /// Request-wide timing and host memory
    pub system_wide: SystemWide,

    /// Group identity → group name, only groups that own records
    pub groups: OrderedMap<u64, String>,

    /// Aggregator identity → rollup
    pub aggregators: OrderedMap<u64, AggregatorEntry>,

    /// Record identity → record, ordered by start time
    pub records: OrderedMap<u64, RecordEntry>,

    /// The profiler's own figures
    pub profiler: ProfilerEntry,
}

/// Request-wide timing plus host memory samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemWide {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,

    /// Host memory in use (bytes)
    pub end_memory: u64,
    pub real_end_memory: u64,
    pub peak_memory: u64,
    pub real_peak_memory: u64,

    /// Memory limit in bytes, -1 when unlimited, 0 when unknown
    pub memory_limit: i64,
}

/// Rollup of one aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorEntry {
    pub name: String,
    pub total_execution: u64,
    pub total_duration: f64,
    pub minimum_duration: f64,
    pub maximum_duration: f64,
    pub average_duration: f64,

    /// Record identities, ordered by record start time
    pub records: Vec<u64>,
}

/// One record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Group identity (key into `Snapshot::groups`)
    pub group: u64,
    pub id: u64,
    pub name: String,
    pub stopped: bool,
    pub severity: Severity,

    /// Start offset from the profiler start, percent of profiler duration
    pub left: f64,
    pub timing: RecordTiming,
    pub memory: MemoryFigures,
    pub formatted_data: OrderedMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTiming {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,

    /// Share of the profiler duration, percent
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerTiming {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

/// Start/end/used memory, process and real (bytes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFigures {
    pub start_memory: u64,
    pub end_memory: u64,
    pub used_memory: u64,
    pub real_start_memory: u64,
    pub real_end_memory: u64,
    pub real_used_memory: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerEntry {
    pub severity: Severity,
    pub timing: ProfilerTiming,
    pub memory: MemoryFigures,
}
