//! Measurement graph: profiler, groups and records.

pub mod group;
pub mod record;
pub mod registry;

pub use group::{Group, StopTarget};
pub use record::{context, Context, Record};
pub use registry::{Profiler, ProfilerOptions};
