use crate::output::read_snapshot;
use crate::snapshot::validate_snapshot;
use crate::utils::config::SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Validate a snapshot JSON file
pub fn validate_snapshot_file(file_path: PathBuf) -> Result<()> {
    println!("Validating snapshot: {}", file_path.display());

    let snapshot = read_snapshot(&file_path)?;
    validate_snapshot(&snapshot).context("Snapshot is inconsistent")?;

    let stopped = snapshot.records.values().filter(|r| r.stopped).count();
    println!("✓ Valid snapshot JSON");
    println!("  Generated: {}", snapshot.generated);
    println!("  Groups: {}", snapshot.groups.len());
    println!(
        "  Records: {} ({} stopped)",
        snapshot.records.len(),
        stopped
    );
    println!("  Aggregators: {}", snapshot.aggregators.len());
    println!("  Profiler Duration: {} ms", snapshot.profiler.timing.duration);
    println!("  Profiler Severity: {}", snapshot.profiler.severity);

    Ok(())
}

/// Display schema information
pub fn display_schema(show_details: bool) {
    println!("Span Trace Snapshot Schema");
    println!("Current Version: {}", SCHEMA_VERSION);
    println!();

    if show_details {
        println!("Schema Structure:");
        println!("  generated: number          - Unix seconds at build time");
        println!("  system_wide: object        - Request-wide timing and host memory");
        println!("    start_time/end_time/duration: number (ms)");
        println!("    end_memory, real_end_memory, peak_memory, real_peak_memory: number (bytes)");
        println!("    memory_limit: number     - Bytes, -1 unlimited, 0 unknown");
        println!("  groups: object             - Group id -> group name");
        println!("  aggregators: object        - Aggregator id -> rollup");
        println!("    name, total_execution, total/minimum/maximum/average_duration");
        println!("    records: array           - Record ids by start time");
        println!("  records: object            - Record id -> record, by start time");
        println!("    group, id, name, stopped, severity, left");
        println!("    timing: start_time, end_time, duration, percentage");
        println!("    memory: start/end/used memory, real_start/end/used memory");
        println!("    formatted_data: object   - Context key -> display string");
        println!("  profiler: object           - severity, timing, memory");
        println!();
        println!("Severity codes: 0 none, 6 info, 5 notice, 3 warning, 1 critical");
    } else {
        println!("Use --show for detailed schema information");
    }
}

/// Display version information
pub fn display_version() {
    println!("Span Trace v{}", env!("CARGO_PKG_VERSION"));
    println!("Snapshot Schema: v{}", SCHEMA_VERSION);
    println!();
    println!("In-process span profiling with aggregation and JSON snapshots.");
}
