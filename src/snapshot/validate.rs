//! Consistency checks for a snapshot document.
//!
//! These mirror what a viewer checks on import: identities line up, every
//! cross reference resolves and the records map is in start order.

use super::schema::Snapshot;
use crate::utils::error::ValidationError;
use log::debug;

/// Validate a snapshot's internal consistency
///
/// **Public** - used by the `validate` command and tests
///
/// # Errors
/// * `ValidationError::RecordIdMismatch` - a record stored under another key
/// * `ValidationError::UnknownGroup` - a record naming a group not listed
/// * `ValidationError::UnknownRecord` - an aggregator listing a missing record
/// * `ValidationError::Unordered` - records not sorted by start time
/// * `ValidationError::InvalidValue` - negative or non-finite timing
pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), ValidationError> {
    check_value("system_wide.duration", snapshot.system_wide.duration)?;
    check_value("profiler.duration", snapshot.profiler.timing.duration)?;

    let mut previous_start = f64::NEG_INFINITY;
    for (key, record) in snapshot.records.iter() {
        if *key != record.id {
            return Err(ValidationError::RecordIdMismatch {
                key: *key,
                id: record.id,
            });
        }
        if !snapshot.groups.contains_key(&record.group) {
            return Err(ValidationError::UnknownGroup {
                record: record.id,
                group: record.group,
            });
        }
        check_value("timing.duration", record.timing.duration)?;
        check_value("timing.percentage", record.timing.percentage)?;
        if !record.left.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "left",
                value: record.left,
            });
        }
        if record.timing.start_time < previous_start {
            return Err(ValidationError::Unordered(record.id));
        }
        previous_start = record.timing.start_time;
    }

    for (id, aggregator) in snapshot.aggregators.iter() {
        check_value("total_duration", aggregator.total_duration)?;
        if let Some(missing) = aggregator
            .records
            .iter()
            .find(|record| !snapshot.records.contains_key(*record))
        {
            return Err(ValidationError::UnknownRecord {
                aggregator: *id,
                record: *missing,
            });
        }
    }

    debug!(
        "Snapshot valid: {} records, {} aggregators",
        snapshot.records.len(),
        snapshot.aggregators.len()
    );
    Ok(())
}

fn check_value(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidValue { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::{Context, Profiler};
    use crate::snapshot::snapshot;

    fn sample() -> Snapshot {
        let profiler = Profiler::new();
        profiler.start_in("db", "select").stop(Context::new());
        profiler.start_in("http", "get").stop(Context::new());
        snapshot(&profiler)
    }

    #[test]
    fn test_built_snapshot_is_valid() {
        assert_eq!(validate_snapshot(&sample()), Ok(()));
    }

    #[test]
    fn test_unknown_group_is_rejected() {
        let mut broken = sample();
        broken.groups.clear();
        assert!(matches!(
            validate_snapshot(&broken),
            Err(ValidationError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn test_id_mismatch_is_rejected() {
        let mut broken = sample();
        if let Some(entry) = broken.records.values_mut().next() {
            entry.id += 1_000_000;
        }
        assert!(matches!(
            validate_snapshot(&broken),
            Err(ValidationError::RecordIdMismatch { .. })
        ));
    }

    #[test]
    fn test_unordered_records_are_rejected() {
        let mut broken = sample();
        if let Some(last) = broken.records.values_mut().last() {
            last.timing.start_time = -1.0;
        }
        assert!(matches!(
            validate_snapshot(&broken),
            Err(ValidationError::Unordered(_))
        ));
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let mut broken = sample();
        broken.profiler.timing.duration = -1.0;
        assert_eq!(
            validate_snapshot(&broken),
            Err(ValidationError::InvalidValue {
                field: "profiler.duration",
                value: -1.0
            })
        );
    }
}
