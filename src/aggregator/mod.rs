//! Rollup statistics over finishing records.
//!
//! This module provides:
//! - `Aggregation`: one statistics bucket (count, total/min/max/average duration)
//! - `Aggregator`: the pluggable engine trait with an internal aggregation
//!   plus sub-aggregations keyed per record
//! - Stock aggregators bound to a group name or to a profiler

pub mod aggregation;
pub mod engine;
pub mod scoped;

// Re-export main types
pub use aggregation::Aggregation;
pub use engine::{Aggregator, AggregatorCore, AggregatorRef};
pub use scoped::{GroupAggregator, IdentityKey, ProfilerAggregator};
