//! Render a live profiler into the snapshot wire schema.
//!
//! The builder walks profiler → groups → records and profiler →
//! aggregators, rounding every duration and percentage to the configured
//! precision. Memory and count fields are never rounded.

use super::schema::{
    AggregatorEntry, MemoryFigures, ProfilerEntry, ProfilerTiming, RecordEntry, RecordTiming,
    Snapshot, SystemWide,
};
use crate::core::{Environment, Measured, OrderedMap};
use crate::formatter::{Formatter, PlainFormatter};
use crate::profiler::{Profiler, Record};
use crate::utils::config::{DEFAULT_PRECISION, MAX_PRECISION, REQUEST_START_ENV};
use crate::utils::error::ConfigError;
use log::{debug, warn};
use std::collections::HashMap;

/// Snapshot rendering options
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions {
    /// Decimal places for duration and percentage fields
    precision: u32,

    /// When the surrounding request started, on the profiler clock (ms)
    request_start_ms: Option<f64>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            request_start_ms: None,
        }
    }
}

impl SnapshotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rounding precision
    ///
    /// # Errors
    /// * `ConfigError::InvalidPrecision` - more than `MAX_PRECISION` places
    pub fn with_precision(mut self, precision: u32) -> Result<Self, ConfigError> {
        if precision > MAX_PRECISION {
            return Err(ConfigError::InvalidPrecision(precision));
        }
        self.precision = precision;
        Ok(self)
    }

    pub fn with_request_start(mut self, request_start_ms: f64) -> Self {
        self.request_start_ms = Some(request_start_ms);
        self
    }

    /// Defaults plus the request start marker from the environment, if set.
    ///
    /// The variable holds unix seconds as a float, which matches the
    /// default system clock once converted to milliseconds.
    pub fn from_env() -> Self {
        let options = Self::default();
        match std::env::var(REQUEST_START_ENV) {
            Ok(raw) => match raw.trim().parse::<f64>() {
                Ok(seconds) if seconds.is_finite() => options.with_request_start(seconds * 1000.0),
                _ => {
                    warn!("Ignoring unparsable {}={}", REQUEST_START_ENV, raw);
                    options
                }
            },
            Err(_) => options,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn request_start_ms(&self) -> Option<f64> {
        self.request_start_ms
    }

    /// Round half away from zero; non-finite values become 0
    pub fn round(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let factor = 10f64.powi(self.precision as i32);
        (value * factor).round() / factor
    }
}

/// Build a snapshot with the plain formatter and default options
pub fn snapshot(profiler: &Profiler) -> Snapshot {
    build_snapshot(profiler, &PlainFormatter::default(), &SnapshotOptions::default())
}

/// Build a snapshot of `profiler`
///
/// **Public** - main entry point for snapshot construction
///
/// # Arguments
/// * `profiler` - Live profiler to render
/// * `formatter` - Renders each record's context into `formatted_data`
/// * `options` - Rounding precision and request start marker
///
/// # Returns
/// The wire document. Host memory fields are sampled once up front and again
/// after the body is built; the second sample wins.
pub fn build_snapshot(
    profiler: &Profiler,
    formatter: &dyn Formatter,
    options: &SnapshotOptions,
) -> Snapshot {
    let env = profiler.environment();
    let request_start = options
        .request_start_ms
        .map_or(profiler.start_time(), |start| start.min(profiler.start_time()));

    let mut system_wide = SystemWide {
        start_time: options.round(request_start),
        end_time: 0.0,
        duration: 0.0,
        end_memory: 0,
        real_end_memory: 0,
        peak_memory: 0,
        real_peak_memory: 0,
        memory_limit: env.memory_limit(),
    };
    sample_host(&mut system_wide, env, request_start, options);

    let mut groups = OrderedMap::new();
    let (records, starts) = build_records(profiler, formatter, options, &mut groups);
    let aggregators = build_aggregators(profiler, options, &starts);
    let profiler_entry = ProfilerEntry {
        severity: profiler.severity(),
        timing: ProfilerTiming {
            start_time: options.round(profiler.start_time()),
            end_time: options.round(profiler.end_time()),
            duration: options.round(profiler.duration()),
        },
        memory: memory_figures(profiler),
    };

    sample_host(&mut system_wide, env, request_start, options);

    debug!(
        "Built snapshot: {} groups, {} records, {} aggregators",
        groups.len(),
        records.len(),
        aggregators.len()
    );

    Snapshot {
        generated: chrono::Utc::now().timestamp(),
        system_wide,
        groups,
        aggregators,
        records,
        profiler: profiler_entry,
    }
}

/// Refresh the host-sampled fields of `system_wide`
fn sample_host(system_wide: &mut SystemWide, env: &Environment, request_start: f64, options: &SnapshotOptions) {
    let now = env.now_ms();
    let current = env.memory();
    let peak = env.peak_memory();

    system_wide.end_time = options.round(now);
    system_wide.duration = options.round(now - request_start);
    system_wide.end_memory = current.memory;
    system_wide.real_end_memory = current.real_memory;
    system_wide.peak_memory = peak.memory.max(current.memory);
    system_wide.real_peak_memory = peak.real_memory.max(current.real_memory);
}

fn memory_figures(measured: &impl Measured) -> MemoryFigures {
    MemoryFigures {
        start_memory: measured.start_memory(),
        end_memory: measured.end_memory(),
        used_memory: measured.used_memory(),
        real_start_memory: measured.start_real_memory(),
        real_end_memory: measured.end_real_memory(),
        real_used_memory: measured.used_real_memory(),
    }
}

/// Render every record, sorted by start time. Also returns each record's
/// unrounded start time for ordering aggregator record lists.
fn build_records(
    profiler: &Profiler,
    formatter: &dyn Formatter,
    options: &SnapshotOptions,
    groups: &mut OrderedMap<u64, String>,
) -> (OrderedMap<u64, RecordEntry>, HashMap<u64, f64>) {
    let baseline = profiler.start_time();
    let total = profiler.duration();
    let share = |value: f64| if total <= 0.0 { 0.0 } else { value / total * 100.0 };

    let mut rendered: Vec<(f64, RecordEntry)> = profiler
        .all_records()
        .iter()
        .map(|record| {
            let group = record.group_id().get();
            if !groups.contains_key(&group) {
                groups.insert(group, record.group_name().to_string());
            }
            (record.start_time(), render_record(record, formatter, options, &share, baseline))
        })
        .collect();

    rendered.sort_by(|a, b| a.0.total_cmp(&b.0));

    let starts = rendered.iter().map(|(start, entry)| (entry.id, *start)).collect();
    let records = rendered.into_iter().map(|(_, entry)| (entry.id, entry)).collect();
    (records, starts)
}

fn render_record(
    record: &Record,
    formatter: &dyn Formatter,
    options: &SnapshotOptions,
    share: &dyn Fn(f64) -> f64,
    baseline: f64,
) -> RecordEntry {
    let start = record.start_time();
    let duration = record.duration();
    RecordEntry {
        group: record.group_id().get(),
        id: record.id().get(),
        name: record.name().to_string(),
        stopped: record.is_stopped(),
        severity: record.severity(),
        left: options.round(share(start - baseline)),
        timing: RecordTiming {
            start_time: options.round(start),
            end_time: options.round(record.end_time()),
            duration: options.round(duration),
            percentage: options.round(share(duration)),
        },
        memory: memory_figures(record),
        formatted_data: formatter.format(&record.context()),
    }
}

/// Render every aggregator. Record lists only name records present in the
/// snapshot, ordered by start time.
fn build_aggregators(
    profiler: &Profiler,
    options: &SnapshotOptions,
    starts: &HashMap<u64, f64>,
) -> OrderedMap<u64, AggregatorEntry> {
    let mut entries = OrderedMap::new();
    for handle in profiler.aggregators() {
        let Ok(aggregator) = handle.try_borrow() else {
            debug!("Aggregator busy, left out of snapshot");
            continue;
        };
        let mut records: Vec<(f64, u64)> = aggregator
            .records()
            .iter()
            .filter_map(|record| {
                let id = record.id().get();
                starts.get(&id).map(|start| (*start, id))
            })
            .collect();
        records.sort_by(|a, b| a.0.total_cmp(&b.0));

        entries.insert(
            aggregator.id().get(),
            AggregatorEntry {
                name: aggregator.name().to_string(),
                total_execution: aggregator.total_execution(),
                total_duration: options.round(aggregator.total_duration()),
                minimum_duration: options.round(aggregator.minimum_duration()),
                maximum_duration: options.round(aggregator.maximum_duration()),
                average_duration: options.round(aggregator.average_duration()),
                records: records.into_iter().map(|(_, id)| id).collect(),
            },
        );
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixedMemory, ManualClock};
    use crate::profiler::{Context, ProfilerOptions};

    #[test]
    fn test_rounding() {
        let options = SnapshotOptions::new().with_precision(2).unwrap();
        assert_eq!(options.round(1.23456), 1.23);
        assert_eq!(options.round(2.675_000_1), 2.68);
        assert_eq!(options.round(f64::NAN), 0.0);
        assert_eq!(SnapshotOptions::new().round(0.123456), 0.1235);
    }

    #[test]
    fn test_precision_is_bounded() {
        assert_eq!(
            SnapshotOptions::new().with_precision(MAX_PRECISION + 1),
            Err(ConfigError::InvalidPrecision(MAX_PRECISION + 1))
        );
    }

    #[test]
    fn test_request_start_only_moves_earlier() {
        let clock = ManualClock::new(500.0);
        let env = Environment::new(clock.clone(), FixedMemory::new(0, 0));
        let profiler = Profiler::with_options(ProfilerOptions::new().with_environment(env));
        clock.advance(10.0);

        let earlier = SnapshotOptions::new().with_request_start(400.0);
        let built = build_snapshot(&profiler, &PlainFormatter::new(), &earlier);
        assert_eq!(built.system_wide.start_time, 400.0);
        assert_eq!(built.system_wide.duration, 110.0);

        let later = SnapshotOptions::new().with_request_start(600.0);
        let built = build_snapshot(&profiler, &PlainFormatter::new(), &later);
        assert_eq!(built.system_wide.start_time, 500.0);
    }

    #[test]
    fn test_zero_profiler_duration_gives_zero_shares() {
        let clock = ManualClock::new(0.0);
        let env = Environment::new(clock, FixedMemory::new(0, 0));
        let profiler = Profiler::with_options(ProfilerOptions::new().with_environment(env));
        profiler.start("instant").stop(Context::new());

        let built = snapshot(&profiler);
        let entry = built.records.values().next().unwrap();
        assert_eq!(entry.left, 0.0);
        assert_eq!(entry.timing.percentage, 0.0);
    }
}
