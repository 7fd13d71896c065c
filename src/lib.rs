//! Span Trace
//!
//! In-process span profiling: open and close named spans of work, track the
//! wall time and memory each one consumed, roll them up through pluggable
//! aggregators and render the whole measurement graph as one deterministic
//! JSON snapshot.
//!
//! ## Getting Started
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use span_trace::{context, snapshot, Aggregator, GroupAggregator, Profiler};
//!
//! let profiler = Profiler::new();
//! let queries = Rc::new(RefCell::new(GroupAggregator::new("db")));
//! profiler.add_aggregator(queries.clone());
//!
//! profiler.start_with("db", "select", context([("table", "users")]));
//! profiler.stop_in("db", Some("select"));
//!
//! assert_eq!(queries.borrow().total_execution(), 1);
//! assert_eq!(snapshot(&profiler).records.len(), 1);
//! ```
//!
//! The `span-trace` binary runs a sample workload and validates snapshot
//! files:
//!
//! ```bash
//! span-trace demo --output snapshot.json --summary
//! span-trace validate --file snapshot.json
//! ```

pub mod aggregator;
pub mod commands;
pub mod core;
pub mod formatter;
pub mod output;
pub mod profiler;
pub mod snapshot;
pub mod utils;

pub use aggregator::{Aggregation, Aggregator, AggregatorRef, GroupAggregator, ProfilerAggregator};
pub use crate::core::{Environment, FrozenMap, Measured, OrderedMap, Severity};
pub use formatter::{Formatter, PlainFormatter};
pub use profiler::{context, Context, Group, Profiler, ProfilerOptions, Record, StopTarget};
pub use snapshot::{build_snapshot, snapshot, Snapshot, SnapshotOptions};
pub use utils::{ConfigError, OutputError, ValidationError};
