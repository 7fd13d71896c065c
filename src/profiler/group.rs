//! Named collection of records with start/stop bookkeeping.
//!
//! A group keeps every record it started, bucketed by record name, plus an
//! active stack of the spans not yet stopped. Stopping resolves a target
//! against that stack (see [`Group::stop_with`]), then drives aggregation
//! and the profiler's high-water tracking before the record is marked
//! stopped.

use super::record::{Context, Record};
use super::registry::{Profiler, ProfilerInner};
use crate::core::{Environment, GroupId, Measured, OrderedMap, ProfilerId, RecordId};
use log::debug;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

/// What [`Group::stop_with`] should stop
#[derive(Debug, Clone, Copy)]
pub enum StopTarget<'a> {
    /// The most recently started active record, whatever its name
    Latest,
    /// The most recent record with this name
    Name(&'a str),
    /// This exact record
    Record(&'a Record),
}

impl<'a> From<&'a str> for StopTarget<'a> {
    fn from(name: &'a str) -> Self {
        StopTarget::Name(name)
    }
}

impl<'a> From<&'a String> for StopTarget<'a> {
    fn from(name: &'a String) -> Self {
        StopTarget::Name(name)
    }
}

impl<'a> From<&'a Record> for StopTarget<'a> {
    fn from(record: &'a Record) -> Self {
        StopTarget::Record(record)
    }
}

impl<'a> From<Option<&'a str>> for StopTarget<'a> {
    fn from(name: Option<&'a str>) -> Self {
        name.map_or(StopTarget::Latest, StopTarget::Name)
    }
}

#[derive(Default)]
struct GroupState {
    /// record name → (identity → record), each bucket in start order
    buckets: OrderedMap<String, OrderedMap<RecordId, Record>>,
    /// identity → name of running spans, oldest first
    active: OrderedMap<RecordId, String>,
    /// identities currently inside `stop_with`
    stopping: HashSet<RecordId>,
}

pub(crate) struct GroupInner {
    id: GroupId,
    name: String,
    pub(crate) profiler_id: ProfilerId,
    profiler: Weak<ProfilerInner>,
    env: Environment,
    state: RefCell<GroupState>,
}

/// Handle to a named group of records
#[derive(Clone)]
pub struct Group {
    pub(crate) inner: Rc<GroupInner>,
}

impl Group {
    pub(crate) fn new(profiler: &Profiler, name: &str) -> Self {
        Self {
            inner: Rc::new(GroupInner {
                id: GroupId::next(),
                name: name.to_string(),
                profiler_id: profiler.id(),
                profiler: Rc::downgrade(&profiler.inner),
                env: profiler.environment().clone(),
                state: RefCell::new(GroupState::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<GroupInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> GroupId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn profiler_id(&self) -> ProfilerId {
        self.inner.profiler_id
    }

    /// The owning profiler, if it is still alive
    pub fn profiler(&self) -> Option<Profiler> {
        self.inner.profiler.upgrade().map(Profiler::from_inner)
    }

    pub(crate) fn environment(&self) -> &Environment {
        &self.inner.env
    }

    fn is_enabled(&self) -> bool {
        self.profiler().is_some_and(|profiler| profiler.is_enabled())
    }

    pub fn start(&self, name: &str) -> Record {
        self.start_with(name, Context::new())
    }

    /// Open a new span. A name already running gets a second, independent
    /// record. While the profiler is disabled the record is returned but
    /// not tracked.
    pub fn start_with(&self, name: &str, initial: Context) -> Record {
        let record = Record::begin(self, name, initial);
        if !self.is_enabled() {
            return record;
        }
        let mut state = self.inner.state.borrow_mut();
        state
            .buckets
            .get_or_insert_with(name.to_string(), OrderedMap::new)
            .insert(record.id(), record.clone());
        state.active.insert(record.id(), name.to_string());
        record
    }

    pub fn stop<'a>(&self, target: impl Into<StopTarget<'a>>) -> Option<Record> {
        self.stop_with(target, Context::new())
    }

    /// Stop the most recently started active record
    pub fn stop_latest(&self) -> Option<Record> {
        self.stop_with(StopTarget::Latest, Context::new())
    }

    /// Resolve `target` and stop it, merging `extra` into its context.
    ///
    /// Resolution:
    /// - `Latest`: last entry of the active stack, across all names
    /// - `Name`: most recent active record with that name; otherwise the
    ///   name's bucket, newest first, preferring a record not yet stopped
    ///   and settling for the newest one
    /// - `Record`: the record itself, if this group owns it
    ///
    /// Returns `None` when nothing resolves or the record is already being
    /// stopped further up the call stack. An active record is frozen,
    /// aggregated, reported to the profiler and then marked stopped; a
    /// stopped record is returned as is.
    pub fn stop_with<'a>(&self, target: impl Into<StopTarget<'a>>, extra: Context) -> Option<Record> {
        let record = match self.resolve(target.into()) {
            Some(record) => record,
            None => {
                debug!("No record to stop in group '{}'", self.name());
                return None;
            }
        };
        let id = record.id();

        let was_active = {
            let mut state = self.inner.state.borrow_mut();
            if state.stopping.contains(&id) {
                return None;
            }
            // LIFO stops hit the tail
            let at_tail = state.active.last().is_some_and(|(last, _)| *last == id);
            let removed = if at_tail {
                state.active.pop().is_some()
            } else {
                state.active.remove(&id).is_some()
            };
            if removed {
                state.stopping.insert(id);
            }
            removed
        };

        if was_active {
            record.freeze(extra);
            if let Some(profiler) = self.profiler() {
                profiler.aggregate(&record);
                profiler.record_state(&record);
            }
            record.mark_stopped();
            self.inner.state.borrow_mut().stopping.remove(&id);
        } else if !record.is_stopped() {
            record.freeze(extra);
            record.mark_stopped();
        }
        Some(record)
    }

    fn resolve(&self, target: StopTarget<'_>) -> Option<Record> {
        let state = self.inner.state.borrow();
        match target {
            StopTarget::Latest => {
                let (id, name) = state.active.last()?;
                state.buckets.get(name)?.get(id).cloned()
            }
            StopTarget::Name(name) => {
                let bucket = state.buckets.get(name)?;
                let active = state.active.iter().rev().find(|(_, active)| active.as_str() == name);
                if let Some((id, _)) = active {
                    return bucket.get(id).cloned();
                }
                bucket
                    .values()
                    .rev()
                    .find(|record| !record.is_stopped())
                    .or_else(|| bucket.values().last())
                    .cloned()
            }
            StopTarget::Record(record) => {
                if record.group_id() != self.id() {
                    return None;
                }
                Some(record.clone())
            }
        }
    }

    pub fn stop_all(&self) -> OrderedMap<RecordId, Record> {
        self.stop_all_with(Context::new())
    }

    /// Stop every active record, oldest first. Records already stopped as a
    /// side effect of an earlier stop in the same pass are skipped.
    pub fn stop_all_with(&self, extra: Context) -> OrderedMap<RecordId, Record> {
        let pending: Vec<(RecordId, String)> = self
            .inner
            .state
            .borrow()
            .active
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect();
        let mut stopped = OrderedMap::new();
        for (id, name) in pending {
            let record = {
                let state = self.inner.state.borrow();
                state.buckets.get(&name).and_then(|bucket| bucket.get(&id)).cloned()
            };
            let Some(record) = record else {
                continue;
            };
            if record.is_stopped() {
                continue;
            }
            if let Some(record) = self.stop_with(&record, extra.clone()) {
                stopped.insert(id, record);
            }
        }
        stopped
    }

    /// Move every record of `other` into this group.
    ///
    /// Records are re-parented (see [`Record::rebind`]) into the name
    /// buckets only; they are assumed finished and never touch the active
    /// stack or the aggregators. No-op when the profiler is disabled or
    /// `other` is this group.
    pub fn merge(&self, other: &Group) {
        if !self.is_enabled() || Rc::ptr_eq(&self.inner, &other.inner) {
            return;
        }
        let incoming = other.all_records();
        let count = incoming.len();
        {
            let mut state = self.inner.state.borrow_mut();
            for record in incoming {
                let record = record.rebind(self);
                state
                    .buckets
                    .get_or_insert_with(record.name().to_string(), OrderedMap::new)
                    .insert(record.id(), record);
            }
        }
        self.sort();
        debug!(
            "Merged {} records from group '{}' into '{}'",
            count,
            other.name(),
            self.name()
        );
    }

    /// Stable sort of every bucket by start time
    pub fn sort(&self) {
        let mut state = self.inner.state.borrow_mut();
        for bucket in state.buckets.values_mut() {
            bucket.sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        }
    }

    /// Whether any record was started under `name`
    pub fn has(&self, name: &str) -> bool {
        self.inner.state.borrow().buckets.contains_key(name)
    }

    /// Newest record in the `name` bucket
    pub fn last(&self, name: &str) -> Option<Record> {
        let state = self.inner.state.borrow();
        state.buckets.get(name)?.values().last().cloned()
    }

    pub fn records(&self, name: &str) -> Vec<Record> {
        let state = self.inner.state.borrow();
        state
            .buckets
            .get(name)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every record, bucket by bucket
    pub fn all_records(&self) -> Vec<Record> {
        let state = self.inner.state.borrow();
        state
            .buckets
            .values()
            .flat_map(|bucket| bucket.values().cloned())
            .collect()
    }

    /// Record names in first-start order
    pub fn names(&self) -> Vec<String> {
        self.inner.state.borrow().buckets.keys().cloned().collect()
    }

    /// Copy of every name bucket, records in bucket order
    pub fn buckets(&self) -> OrderedMap<String, Vec<Record>> {
        let state = self.inner.state.borrow();
        state
            .buckets
            .iter()
            .map(|(name, bucket)| (name.clone(), bucket.values().cloned().collect()))
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.inner.state.borrow().active.len()
    }

    /// Total number of records across all buckets
    pub fn len(&self) -> usize {
        let state = self.inner.state.borrow();
        state.buckets.values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of used memory over every record, running or not
    pub fn memory_usage(&self) -> u64 {
        self.all_records().iter().map(|record| record.used_memory()).sum()
    }

    /// Sum of used real memory over every record, running or not
    pub fn real_memory_usage(&self) -> u64 {
        self.all_records()
            .iter()
            .map(|record| record.used_real_memory())
            .sum()
    }

    /// Forget every record and the active stack
    pub fn clear(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.buckets.clear();
        state.active.clear();
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("records", &self.len())
            .field("active", &self.active_count())
            .finish()
    }
}
