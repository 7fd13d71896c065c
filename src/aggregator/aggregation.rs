//! One statistics bucket: execution count and duration rollups.

use crate::core::{Measured, OrderedMap, RecordId};
use crate::profiler::record::{Record, WeakRecord};

/// Running statistics over the records fed into one bucket
#[derive(Debug, Clone)]
pub struct Aggregation {
    name: String,
    total_execution: u64,
    total_duration: f64,
    minimum_duration: f64,
    maximum_duration: f64,
    average_duration: f64,
    executions: OrderedMap<RecordId, u64>,
    records: OrderedMap<RecordId, WeakRecord>,
}

impl Aggregation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_execution: 0,
            total_duration: 0.0,
            minimum_duration: 0.0,
            maximum_duration: 0.0,
            average_duration: 0.0,
            executions: OrderedMap::new(),
            records: OrderedMap::new(),
        }
    }

    /// Fold one record into the statistics.
    ///
    /// The minimum starts at zero and is overwritten whenever it is still
    /// non-positive, so the first positive duration always sets it.
    pub fn aggregate(&mut self, record: &Record) {
        let duration = record.duration();

        self.total_execution += 1;
        self.total_duration += duration;
        self.average_duration = self.total_duration / self.total_execution as f64;
        if duration > self.maximum_duration {
            self.maximum_duration = duration;
        }
        if duration < self.minimum_duration || self.minimum_duration <= 0.0 {
            self.minimum_duration = duration;
        }

        self.record_execution(record.id());
        self.records.insert(record.id(), record.downgrade());
    }

    /// Bump the execution counter of one record identity
    pub fn record_execution(&mut self, id: RecordId) -> u64 {
        let count = self.executions.get_or_insert_with(id, || 0);
        *count += 1;
        *count
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn total_execution(&self) -> u64 {
        self.total_execution
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn minimum_duration(&self) -> f64 {
        self.minimum_duration
    }

    pub fn maximum_duration(&self) -> f64 {
        self.maximum_duration
    }

    pub fn average_duration(&self) -> f64 {
        self.average_duration
    }

    /// How many times the record `id` was fed in
    pub fn executions_of(&self, id: RecordId) -> u64 {
        self.executions.get(&id).copied().unwrap_or(0)
    }

    pub fn executions(&self) -> &OrderedMap<RecordId, u64> {
        &self.executions
    }

    /// Identities of every record fed in, first feed order
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.records.keys().copied().collect()
    }

    /// Records fed in that are still alive somewhere
    pub fn records(&self) -> Vec<Record> {
        self.records.values().filter_map(WeakRecord::upgrade).collect()
    }
}
