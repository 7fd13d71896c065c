use pretty_assertions::assert_eq;
use span_trace::aggregator::{GroupAggregator, ProfilerAggregator};
use span_trace::core::{Environment, FixedMemory, ManualClock, Severity};
use span_trace::output::{read_snapshot, snapshot_to_string, write_snapshot};
use span_trace::snapshot::{build_snapshot, validate_snapshot, Snapshot, SnapshotOptions};
use span_trace::{context, Context, PlainFormatter, Profiler, ProfilerOptions};
use std::cell::RefCell;
use std::rc::Rc;

struct Fixture {
    profiler: Profiler,
    clock: ManualClock,
    memory: FixedMemory,
}

fn fixture() -> Fixture {
    let clock = ManualClock::new(0.0);
    let memory = FixedMemory::new(1_000, 4_000).with_limit(-1);
    let env = Environment::new(clock.clone(), memory.clone());
    let profiler = Profiler::with_options(ProfilerOptions::new().with_environment(env));
    Fixture {
        profiler,
        clock,
        memory,
    }
}

fn build(profiler: &Profiler) -> Snapshot {
    build_snapshot(profiler, &PlainFormatter::new(), &SnapshotOptions::new())
}

/// db.select 0..10, http.get 10..12 (started in a group created first but
/// started last), db.insert 2..? still running
fn populated() -> Fixture {
    let f = fixture();
    let db = Rc::new(RefCell::new(GroupAggregator::new("db")));
    let all = Rc::new(RefCell::new(ProfilerAggregator::new(&f.profiler)));
    f.profiler.add_aggregator(db);
    f.profiler.add_aggregator(all);
    f.profiler.group("http");

    let select = f.profiler.start_with("db", "select", context([("table", "users")]));
    f.clock.set(2.0);
    f.profiler.start_in("db", "insert");
    f.clock.set(10.0);
    f.memory.set(1_500, 4_000);
    select.stop(context([("rows", 3)]));
    let get = f.profiler.start_in("http", "get");
    f.clock.set(12.0);
    get.stop(Context::new());
    f.clock.set(20.0);
    f
}

#[test]
fn test_records_are_sorted_by_start_time() {
    let f = populated();
    let built = build(&f.profiler);

    let names: Vec<_> = built.records.values().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["select", "insert", "get"]);
    assert_eq!(validate_snapshot(&built), Ok(()));
}

#[test]
fn test_record_figures() {
    let f = populated();
    let built = build(&f.profiler);
    let select = built.records.values().find(|r| r.name == "select").unwrap();

    // profiler end is the high-water mark of stopped records: 12 ms
    assert_eq!(built.profiler.timing.duration, 12.0);
    assert_eq!(select.timing.duration, 10.0);
    assert_eq!(select.timing.percentage, 83.3333);
    assert_eq!(select.left, 0.0);
    assert_eq!(select.severity, Severity::Warning);
    assert!(select.stopped);
    assert_eq!(select.memory.used_memory, 500);
    assert_eq!(select.formatted_data.get("table").map(String::as_str), Some("(string: users)"));
    assert_eq!(select.formatted_data.get("rows").map(String::as_str), Some("(integer: 3)"));

    let get = built.records.values().find(|r| r.name == "get").unwrap();
    assert_eq!(get.left, 83.3333);
    assert_eq!(get.timing.percentage, 16.6667);
}

#[test]
fn test_running_record_is_live() {
    let f = populated();
    let built = build(&f.profiler);
    let insert = built.records.values().find(|r| r.name == "insert").unwrap();

    assert!(!insert.stopped);
    assert_eq!(insert.timing.end_time, 20.0);
    assert_eq!(insert.timing.duration, 18.0);
    assert_eq!(insert.severity, Severity::Warning);
}

#[test]
fn test_groups_only_list_groups_with_records() {
    let f = populated();
    f.profiler.group("empty");
    let built = build(&f.profiler);

    let names: Vec<_> = built.groups.values().cloned().collect();
    assert_eq!(names, vec!["http", "db"]);
}

#[test]
fn test_aggregator_entries() {
    let f = populated();
    let built = build(&f.profiler);
    let entries: Vec<_> = built.aggregators.values().collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "GroupAggregator");
    assert_eq!(entries[0].total_execution, 1);
    assert_eq!(entries[0].total_duration, 10.0);
    assert_eq!(entries[1].name, "ProfilerAggregator");
    assert_eq!(entries[1].total_execution, 2);

    let starts: Vec<f64> = entries[1]
        .records
        .iter()
        .map(|id| built.records.get(id).unwrap().timing.start_time)
        .collect();
    assert_eq!(starts, vec![0.0, 10.0]);
}

#[test]
fn test_system_wide_resampled_host_fields() {
    let f = populated();
    let options = SnapshotOptions::new().with_request_start(-5.0);
    let built = build_snapshot(&f.profiler, &PlainFormatter::new(), &options);

    assert_eq!(built.system_wide.start_time, -5.0);
    assert_eq!(built.system_wide.end_time, 20.0);
    assert_eq!(built.system_wide.duration, 25.0);
    assert_eq!(built.system_wide.end_memory, 1_500);
    assert_eq!(built.system_wide.memory_limit, -1);
}

#[test]
fn test_back_to_back_snapshots_match() {
    let f = populated();
    let first = build(&f.profiler);
    f.memory.set(9_999, 9_999);
    let mut second = build(&f.profiler);

    assert_ne!(first.system_wide.end_memory, second.system_wide.end_memory);
    second.generated = first.generated;
    second.system_wide = first.system_wide.clone();
    // the running record reads live memory
    for (id, record) in first.records.iter().filter(|(_, r)| !r.stopped) {
        if let Some(entry) = second.records.get_mut(id) {
            entry.memory = record.memory.clone();
        }
    }
    assert_eq!(second, first);
}

#[test]
fn test_disabled_profiler_snapshot_is_empty() {
    let f = fixture();
    f.profiler.disable();
    f.profiler.start("ignored");
    let built = build(&f.profiler);

    assert!(built.records.is_empty());
    assert!(built.groups.is_empty());
}

#[test]
fn test_file_round_trip_keeps_order() {
    let f = populated();
    let built = build(&f.profiler);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/snapshot.json");

    write_snapshot(&built, &path).unwrap();
    let loaded = read_snapshot(&path).unwrap();

    let ids: Vec<_> = loaded.records.keys().copied().collect();
    let expected: Vec<_> = built.records.keys().copied().collect();
    assert_eq!(ids, expected);
    assert_eq!(validate_snapshot(&loaded), Ok(()));
}

#[test]
fn test_severity_written_as_wire_code() {
    let f = populated();
    let text = snapshot_to_string(&build(&f.profiler)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    // profiler ran 12 ms: warning
    assert_eq!(value["profiler"]["severity"], 3);
}
