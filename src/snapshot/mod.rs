//! Snapshots: the JSON-safe projection of a live profiler.
//!
//! - `schema`: wire structs
//! - `builder`: renders a profiler into the schema
//! - `validate`: consistency checks on a (possibly imported) document

pub mod builder;
pub mod schema;
pub mod validate;

pub use builder::{build_snapshot, snapshot, SnapshotOptions};
pub use schema::{
    AggregatorEntry, MemoryFigures, ProfilerEntry, ProfilerTiming, RecordEntry, RecordTiming,
    Snapshot, SystemWide,
};
pub use validate::validate_snapshot;
