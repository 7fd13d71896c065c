//! The pluggable rollup engine.
//!
//! Every aggregator owns an [`AggregatorCore`]: one internal aggregation
//! over everything it accepted plus sub-aggregations keyed by an identity
//! derived from each record. Implementors only decide what to accept and
//! how to key it.

use super::aggregation::Aggregation;
use crate::core::{AggregatorId, ExecutionThresholds, OrderedMap, Severity};
use crate::profiler::Record;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, registrable aggregator handle
pub type AggregatorRef = Rc<RefCell<dyn Aggregator>>;

/// State common to every aggregator
#[derive(Debug, Clone)]
pub struct AggregatorCore {
    id: AggregatorId,
    name: String,
    thresholds: ExecutionThresholds,
    internal: Aggregation,
    aggregations: OrderedMap<String, Aggregation>,
}

impl AggregatorCore {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: AggregatorId::next(),
            internal: Aggregation::new(name.clone()),
            name,
            thresholds: ExecutionThresholds::default(),
            aggregations: OrderedMap::new(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_thresholds(&mut self, thresholds: ExecutionThresholds) {
        self.thresholds = thresholds;
    }

    /// Feed `record` into the internal aggregation and the `identity` bucket
    pub fn feed(&mut self, identity: &str, record: &Record) {
        self.internal.aggregate(record);
        if !self.aggregations.contains_key(identity) {
            self.aggregations
                .insert(identity.to_string(), Aggregation::new(identity));
        }
        if let Some(bucket) = self.aggregations.get_mut(identity) {
            bucket.aggregate(record);
        }
    }
}

/// A consumer of finishing records that accumulates rollup statistics.
///
/// Implementors provide access to their [`AggregatorCore`] and the accept
/// predicate; everything else has a default.
pub trait Aggregator {
    fn core(&self) -> &AggregatorCore;

    fn core_mut(&mut self) -> &mut AggregatorCore;

    /// Whether `record` belongs in this aggregator
    fn accepts(&self, record: &Record) -> bool;

    /// Sub-aggregation key for `record`; the group name by default
    fn identity(&self, record: &Record) -> String {
        record.group_name().to_string()
    }

    /// Feed `record` if accepted. Returns whether it was.
    fn aggregate(&mut self, record: &Record) -> bool {
        if !self.accepts(record) {
            return false;
        }
        let identity = self.identity(record);
        self.core_mut().feed(&identity, record);
        true
    }

    fn id(&self) -> AggregatorId {
        self.core().id
    }

    fn name(&self) -> &str {
        &self.core().name
    }

    fn thresholds(&self) -> &ExecutionThresholds {
        &self.core().thresholds
    }

    /// Count-based severity over every accepted execution
    fn severity(&self) -> Severity {
        Severity::from_executions(self.total_execution(), self.thresholds())
    }

    /// Aggregation over every accepted record
    fn internal_aggregation(&self) -> &Aggregation {
        &self.core().internal
    }

    /// Sub-aggregations by identity, first-seen order
    fn aggregations(&self) -> &OrderedMap<String, Aggregation> {
        &self.core().aggregations
    }

    fn aggregation(&self, identity: &str) -> Option<&Aggregation> {
        self.core().aggregations.get(identity)
    }

    fn total_execution(&self) -> u64 {
        self.internal_aggregation().total_execution()
    }

    fn total_duration(&self) -> f64 {
        self.internal_aggregation().total_duration()
    }

    fn minimum_duration(&self) -> f64 {
        self.internal_aggregation().minimum_duration()
    }

    fn maximum_duration(&self) -> f64 {
        self.internal_aggregation().maximum_duration()
    }

    fn average_duration(&self) -> f64 {
        self.internal_aggregation().average_duration()
    }

    /// Accepted records still alive
    fn records(&self) -> Vec<Record> {
        self.internal_aggregation().records()
    }
}
