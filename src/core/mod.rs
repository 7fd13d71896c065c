//! Building blocks shared by the profiler, aggregators and snapshots.

pub mod collection;
pub mod host;
pub mod id;
pub mod measure;

pub use collection::{FrozenMap, OrderedMap};
pub use host::{Clock, Environment, FixedMemory, ManualClock, MemorySource, ProcessMemory, SystemClock};
pub use id::{AggregatorId, GroupId, ProfilerId, RecordId};
pub use measure::{ExecutionThresholds, Mark, Measured, MemorySample, Severity};
