//! Top-level registry of groups and aggregators.
//!
//! The profiler captures a time/memory baseline at construction and keeps a
//! high-water end mark that only moves forward as records finish.

use super::group::{Group, StopTarget};
use super::record::{Context, Record};
use crate::aggregator::{Aggregator, AggregatorRef};
use crate::core::{Environment, Mark, Measured, OrderedMap, ProfilerId, RecordId};
use crate::utils::config::DEFAULT_GROUP;
use log::debug;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Construction options for [`Profiler`]
#[derive(Debug, Clone)]
pub struct ProfilerOptions {
    /// Track records at all
    pub enabled: bool,

    /// Clock and memory source
    pub environment: Environment,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            environment: Environment::default(),
        }
    }
}

impl ProfilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

pub(crate) struct ProfilerInner {
    id: ProfilerId,
    env: Environment,
    enabled: Cell<bool>,
    start: Mark,
    end: Cell<Option<Mark>>,
    groups: RefCell<OrderedMap<String, Group>>,
    /// shared with in-flight fan-outs; registration copies on write
    aggregators: RefCell<Rc<Vec<AggregatorRef>>>,
}

/// Handle to a profiling session
///
/// # Example
/// ```
/// use span_trace::{context, Measured, Profiler};
///
/// let profiler = Profiler::new();
/// let query = profiler.start_with("db", "select", context([("table", "users")]));
/// // ... work ...
/// query.stop(context([("rows", 3)]));
/// assert!(query.is_stopped());
/// assert!(query.duration() >= 0.0);
/// ```
#[derive(Clone)]
pub struct Profiler {
    pub(crate) inner: Rc<ProfilerInner>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::with_options(ProfilerOptions::default())
    }

    pub fn with_options(options: ProfilerOptions) -> Self {
        let start = options.environment.mark();
        Self {
            inner: Rc::new(ProfilerInner {
                id: ProfilerId::next(),
                env: options.environment,
                enabled: Cell::new(options.enabled),
                start,
                end: Cell::new(None),
                groups: RefCell::new(OrderedMap::new()),
                aggregators: RefCell::new(Rc::new(Vec::new())),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<ProfilerInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ProfilerId {
        self.inner.id
    }

    pub fn environment(&self) -> &Environment {
        &self.inner.env
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.get()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.set(enabled);
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Stop tracking new records. Records already registered stay.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Get or create the group called `name`
    pub fn group(&self, name: &str) -> Group {
        if let Some(group) = self.get_group(name) {
            return group;
        }
        let group = Group::new(self, name);
        self.inner
            .groups
            .borrow_mut()
            .insert(name.to_string(), group.clone());
        debug!("Created group '{}'", name);
        group
    }

    /// Existing group called `name`, never creating one
    pub fn get_group(&self, name: &str) -> Option<Group> {
        self.inner.groups.borrow().get(name).cloned()
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.inner.groups.borrow().contains_key(name)
    }

    /// Every group, in creation order
    pub fn groups(&self) -> Vec<Group> {
        self.inner.groups.borrow().values().cloned().collect()
    }

    /// Start `name` in the default group
    pub fn start(&self, name: &str) -> Record {
        self.start_with(DEFAULT_GROUP, name, Context::new())
    }

    pub fn start_in(&self, group: &str, name: &str) -> Record {
        self.start_with(group, name, Context::new())
    }

    /// Start `name` in `group` with an initial context. Always returns a
    /// usable record, tracked or not.
    pub fn start_with(&self, group: &str, name: &str, initial: Context) -> Record {
        self.group(group).start_with(name, initial)
    }

    /// Stop in the default group; `None` stops the latest active record
    pub fn stop(&self, name: Option<&str>) -> Option<Record> {
        self.stop_with(DEFAULT_GROUP, name, Context::new())
    }

    pub fn stop_in(&self, group: &str, name: Option<&str>) -> Option<Record> {
        self.stop_with(group, name, Context::new())
    }

    /// Stop in an existing group. A missing group is a miss, not a creation.
    pub fn stop_with(&self, group: &str, name: Option<&str>, extra: Context) -> Option<Record> {
        let group = self.get_group(group)?;
        group.stop_with(StopTarget::from(name), extra)
    }

    pub fn stop_all(&self, group: &str, name: Option<&str>) -> OrderedMap<RecordId, Record> {
        self.stop_all_with(group, name, Context::new())
    }

    /// Stop every running record of an existing group, optionally only
    /// those called `name`.
    pub fn stop_all_with(
        &self,
        group: &str,
        name: Option<&str>,
        extra: Context,
    ) -> OrderedMap<RecordId, Record> {
        let Some(group) = self.get_group(group) else {
            return OrderedMap::new();
        };
        let Some(name) = name else {
            return group.stop_all_with(extra);
        };
        let mut stopped = OrderedMap::new();
        for record in group.records(name) {
            if record.is_stopped() {
                continue;
            }
            if let Some(record) = group.stop_with(&record, extra.clone()) {
                stopped.insert(record.id(), record);
            }
        }
        stopped
    }

    /// Register an aggregator. Adding the same instance twice is a no-op.
    pub fn add_aggregator(&self, aggregator: AggregatorRef) {
        if self.position_of(&aggregator).is_some() {
            return;
        }
        if let Ok(agg) = aggregator.try_borrow() {
            debug!("Registered aggregator '{}' ({})", agg.name(), agg.id());
        }
        Rc::make_mut(&mut *self.inner.aggregators.borrow_mut()).push(aggregator);
    }

    /// Unregister an aggregator by reference. Absent ones are ignored.
    pub fn remove_aggregator<A: Aggregator + ?Sized>(&self, aggregator: &Rc<RefCell<A>>) {
        if let Some(pos) = self.position_of(aggregator) {
            Rc::make_mut(&mut *self.inner.aggregators.borrow_mut()).remove(pos);
        }
    }

    pub fn has_aggregator<A: Aggregator + ?Sized>(&self, aggregator: &Rc<RefCell<A>>) -> bool {
        self.position_of(aggregator).is_some()
    }

    fn position_of<A: Aggregator + ?Sized>(&self, aggregator: &Rc<RefCell<A>>) -> Option<usize> {
        let target = Rc::as_ptr(aggregator).cast::<()>();
        self.inner
            .aggregators
            .borrow()
            .iter()
            .position(|registered| Rc::as_ptr(registered).cast::<()>() == target)
    }

    /// Registered aggregators, in registration order
    pub fn aggregators(&self) -> Vec<AggregatorRef> {
        self.inner.aggregators.borrow().to_vec()
    }

    /// Feed `record` to every aggregator and return how many accepted it.
    /// An aggregator that is already borrowed elsewhere is skipped.
    pub fn aggregate(&self, record: &Record) -> usize {
        let aggregators = Rc::clone(&self.inner.aggregators.borrow());
        aggregators
            .iter()
            .filter(|aggregator| match aggregator.try_borrow_mut() {
                Ok(mut aggregator) => aggregator.aggregate(record),
                Err(_) => {
                    debug!("Aggregator busy, skipping record {}", record.id());
                    false
                }
            })
            .count()
    }

    /// Advance the high-water end mark if `record` ended strictly later
    pub(crate) fn record_state(&self, record: &Record) {
        let end = record.end_mark();
        let advance = match self.inner.end.get() {
            Some(current) => end.time > current.time,
            None => true,
        };
        if advance {
            self.inner.end.set(Some(end));
        }
    }

    /// Every record of every group, group by group. Not time ordered.
    pub fn all_records(&self) -> Vec<Record> {
        self.groups()
            .iter()
            .flat_map(|group| group.all_records())
            .collect()
    }

    /// Total record count across all groups
    pub fn len(&self) -> usize {
        self.groups().iter().map(|group| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty every group. The group instances themselves stay registered.
    pub fn clear(&self) {
        for group in self.groups() {
            group.clear();
        }
    }
}

impl Measured for Profiler {
    fn start_mark(&self) -> Mark {
        self.inner.start
    }

    /// High-water mark, or "now" until the first record finishes
    fn end_mark(&self) -> Mark {
        self.inner
            .end
            .get()
            .unwrap_or_else(|| self.inner.env.mark())
    }
}

impl fmt::Debug for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("id", &self.inner.id)
            .field("enabled", &self.is_enabled())
            .field("groups", &self.inner.groups.borrow().len())
            .field("aggregators", &self.inner.aggregators.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::GroupAggregator;
    use crate::core::{FixedMemory, ManualClock, MemorySample, Severity};

    fn manual_profiler() -> (Profiler, ManualClock, FixedMemory) {
        let clock = ManualClock::new(100.0);
        let memory = FixedMemory::new(1000, 5000);
        let env = Environment::new(clock.clone(), memory.clone());
        let profiler = Profiler::with_options(ProfilerOptions::new().with_environment(env));
        (profiler, clock, memory)
    }

    #[test]
    fn test_group_is_created_once() {
        let (profiler, _, _) = manual_profiler();
        let a = profiler.group("db");
        let b = profiler.group("db");
        assert_eq!(a.id(), b.id());
        assert_eq!(profiler.groups().len(), 1);
    }

    #[test]
    fn test_stop_never_creates_groups() {
        let (profiler, _, _) = manual_profiler();
        assert!(profiler.stop_in("nope", None).is_none());
        assert!(profiler.stop_all("nope", None).is_empty());
        assert!(!profiler.has_group("nope"));
    }

    #[test]
    fn test_start_and_stop_in_default_group() {
        let (profiler, clock, _) = manual_profiler();
        let record = profiler.start("boot");
        clock.advance(12.0);
        let stopped = profiler.stop(Some("boot")).unwrap();

        assert!(stopped.same_as(&record));
        assert_eq!(record.group_name(), DEFAULT_GROUP);
        assert_eq!(record.severity(), Severity::Warning);
    }

    #[test]
    fn test_disabled_profiler_tracks_nothing() {
        let (profiler, clock, _) = manual_profiler();
        profiler.disable();
        let record = profiler.start_in("quiet", "x");
        clock.advance(1.0);

        assert!(!record.is_stopped());
        assert!(profiler.group("quiet").is_empty());
        assert!(profiler.all_records().is_empty());
        assert!(profiler.stop_in("quiet", Some("x")).is_none());
    }

    #[test]
    fn test_high_water_only_moves_forward() {
        let (profiler, clock, memory) = manual_profiler();
        let long = profiler.start("long");
        clock.advance(5.0);
        let short = profiler.start("short");
        clock.advance(5.0);
        memory.set(3000, 6000);
        long.stop(Context::new());
        assert_eq!(profiler.end_time(), 110.0);
        assert_eq!(profiler.end_memory(), 3000);

        memory.set(2000, 5500);
        clock.set(105.0);
        short.stop(Context::new());
        assert_eq!(profiler.end_time(), 110.0);
        assert_eq!(profiler.end_memory(), 3000);
        assert_eq!(profiler.duration(), 10.0);
        assert_eq!(profiler.severity(), Severity::Warning);
    }

    #[test]
    fn test_duration_is_live_before_first_stop() {
        let (profiler, clock, _) = manual_profiler();
        clock.advance(0.5);
        assert_eq!(profiler.duration(), 0.5);
        assert_eq!(profiler.severity(), Severity::None);
        clock.advance(0.5);
        assert_eq!(profiler.severity(), Severity::Info);
    }

    #[test]
    fn test_aggregator_set_is_by_reference() {
        let (profiler, _, _) = manual_profiler();
        let first = Rc::new(RefCell::new(GroupAggregator::new("db")));
        let twin = Rc::new(RefCell::new(GroupAggregator::new("db")));

        profiler.add_aggregator(first.clone());
        profiler.add_aggregator(first.clone());
        assert_eq!(profiler.aggregators().len(), 1);
        assert!(profiler.has_aggregator(&first));
        assert!(!profiler.has_aggregator(&twin));

        profiler.remove_aggregator(&twin);
        assert_eq!(profiler.aggregators().len(), 1);
        profiler.remove_aggregator(&first);
        assert!(profiler.aggregators().is_empty());
    }

    #[test]
    fn test_aggregate_counts_accepting_aggregators() {
        let (profiler, _, _) = manual_profiler();
        let db = Rc::new(RefCell::new(GroupAggregator::new("db")));
        let http = Rc::new(RefCell::new(GroupAggregator::new("http")));
        profiler.add_aggregator(db.clone());
        profiler.add_aggregator(http.clone());

        profiler.start_in("db", "select").stop(Context::new());
        assert_eq!(db.borrow().total_execution(), 1);
        assert_eq!(http.borrow().total_execution(), 0);

        let record = profiler.start_in("db", "manual");
        assert_eq!(profiler.aggregate(&record), 1);
    }

    #[test]
    fn test_stop_all_with_name_filter() {
        let (profiler, _, _) = manual_profiler();
        let a1 = profiler.start_in("g", "a");
        let b = profiler.start_in("g", "b");
        let a2 = profiler.start_in("g", "a");

        let stopped = profiler.stop_all("g", Some("a"));
        assert_eq!(stopped.len(), 2);
        assert!(a1.is_stopped() && a2.is_stopped());
        assert!(!b.is_stopped());
    }

    #[test]
    fn test_clear_keeps_groups() {
        let (profiler, _, _) = manual_profiler();
        let group = profiler.group("g");
        group.start("x");
        profiler.clear();
        assert!(profiler.is_empty());
        assert!(profiler.has_group("g"));
        assert_eq!(profiler.group("g").id(), group.id());
    }

    #[test]
    fn test_baseline_memory_captured_at_construction() {
        let (profiler, _, memory) = manual_profiler();
        memory.set(4000, 9000);
        assert_eq!(
            profiler.start_mark().memory,
            MemorySample {
                memory: 1000,
                real_memory: 5000
            }
        );
    }
}
