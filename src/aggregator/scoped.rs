//! Stock aggregators: one bound to a group name, one bound to a profiler.

use super::engine::{Aggregator, AggregatorCore};
use crate::core::{ExecutionThresholds, ProfilerId};
use crate::profiler::{Profiler, Record};

/// How records are keyed into sub-aggregations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityKey {
    /// By the owning group's name
    #[default]
    GroupName,
    /// By the record's own name
    RecordName,
}

impl IdentityKey {
    fn of(self, record: &Record) -> String {
        match self {
            IdentityKey::GroupName => record.group_name().to_string(),
            IdentityKey::RecordName => record.name().to_string(),
        }
    }
}

/// Short type name used as the default aggregator name
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Aggregates every record started in one group
#[derive(Debug, Clone)]
pub struct GroupAggregator {
    core: AggregatorCore,
    group: String,
    key: IdentityKey,
}

impl GroupAggregator {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            core: AggregatorCore::new(short_type_name::<Self>()),
            group: group.into(),
            key: IdentityKey::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core.set_name(name);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ExecutionThresholds) -> Self {
        self.core.set_thresholds(thresholds);
        self
    }

    /// Key sub-aggregations by record name instead of group name
    pub fn by_record_name(mut self) -> Self {
        self.key = IdentityKey::RecordName;
        self
    }

    /// Bound group name
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl Aggregator for GroupAggregator {
    fn core(&self) -> &AggregatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregatorCore {
        &mut self.core
    }

    fn accepts(&self, record: &Record) -> bool {
        record.group_name() == self.group
    }

    fn identity(&self, record: &Record) -> String {
        self.key.of(record)
    }
}

/// Aggregates every record of one profiler, at the moment it stops.
///
/// Records already stopped and records of other profilers are rejected.
#[derive(Debug, Clone)]
pub struct ProfilerAggregator {
    core: AggregatorCore,
    profiler: ProfilerId,
    key: IdentityKey,
}

impl ProfilerAggregator {
    pub fn new(profiler: &Profiler) -> Self {
        Self {
            core: AggregatorCore::new(short_type_name::<Self>()),
            profiler: profiler.id(),
            key: IdentityKey::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core.set_name(name);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ExecutionThresholds) -> Self {
        self.core.set_thresholds(thresholds);
        self
    }

    pub fn by_record_name(mut self) -> Self {
        self.key = IdentityKey::RecordName;
        self
    }

    pub fn profiler_id(&self) -> ProfilerId {
        self.profiler
    }
}

impl Aggregator for ProfilerAggregator {
    fn core(&self) -> &AggregatorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AggregatorCore {
        &mut self.core
    }

    fn accepts(&self, record: &Record) -> bool {
        !record.is_stopped() && record.profiler_id() == Some(self.profiler)
    }

    fn identity(&self, record: &Record) -> String {
        self.key.of(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Severity;
    use crate::profiler::Context;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_default_names_are_type_names() {
        let profiler = Profiler::new();
        assert_eq!(GroupAggregator::new("db").name(), "GroupAggregator");
        assert_eq!(ProfilerAggregator::new(&profiler).name(), "ProfilerAggregator");
        assert_eq!(GroupAggregator::new("db").with_name("queries").name(), "queries");
    }

    #[test]
    fn test_group_aggregator_accepts_by_group_name() {
        let profiler = Profiler::new();
        let mut aggregator = GroupAggregator::new("db");
        let in_db = profiler.start_in("db", "select");
        let elsewhere = profiler.start_in("http", "get");

        assert!(aggregator.aggregate(&in_db));
        assert!(!aggregator.aggregate(&elsewhere));
        assert_eq!(aggregator.total_execution(), 1);
        assert!(aggregator.aggregation("db").is_some());
    }

    #[test]
    fn test_record_name_identity() {
        let profiler = Profiler::new();
        let mut aggregator = GroupAggregator::new("db").by_record_name();
        aggregator.aggregate(&profiler.start_in("db", "select"));
        aggregator.aggregate(&profiler.start_in("db", "insert"));
        aggregator.aggregate(&profiler.start_in("db", "select"));

        let keys: Vec<_> = aggregator.aggregations().keys().cloned().collect();
        assert_eq!(keys, vec!["select", "insert"]);
        assert_eq!(aggregator.aggregation("select").map(|a| a.total_execution()), Some(2));
    }

    #[test]
    fn test_profiler_aggregator_sees_records_while_stopping() {
        let profiler = Profiler::new();
        let other = Profiler::new();
        let aggregator = Rc::new(RefCell::new(ProfilerAggregator::new(&profiler)));
        profiler.add_aggregator(aggregator.clone());
        other.add_aggregator(aggregator.clone());

        let record = profiler.start_in("any", "work");
        record.stop(Context::new());
        other.start("foreign").stop(Context::new());

        assert_eq!(aggregator.borrow().total_execution(), 1);
        assert!(!aggregator.borrow_mut().aggregate(&record));
    }

    #[test]
    fn test_severity_follows_execution_count() {
        let profiler = Profiler::new();
        let thresholds = ExecutionThresholds::new(2, 3, 4, 5).unwrap();
        let mut aggregator = GroupAggregator::new("db").with_thresholds(thresholds);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(aggregator.severity());
            aggregator.aggregate(&profiler.start_in("db", "q"));
        }
        seen.push(aggregator.severity());

        assert_eq!(
            seen,
            vec![
                Severity::None,
                Severity::None,
                Severity::Info,
                Severity::Notice,
                Severity::Warning,
                Severity::Critical,
            ]
        );
    }
}
