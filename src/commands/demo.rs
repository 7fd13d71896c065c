//! Demo command implementation.
//!
//! The demo command:
//! 1. Sets up a profiler with a database and a profiler-wide aggregator
//! 2. Runs a small instrumented workload
//! 3. Builds a snapshot
//! 4. Writes it to disk

use super::models::DemoArgs;
use crate::aggregator::{Aggregator, GroupAggregator, ProfilerAggregator};
use crate::core::Measured;
use crate::formatter::PlainFormatter;
use crate::output::write_snapshot;
use crate::profiler::{context, Profiler};
use crate::snapshot::{build_snapshot, validate_snapshot, Snapshot, SnapshotOptions};
use anyhow::{bail, Context as _, Result};
use log::{debug, info};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

/// Validate demo arguments before running
///
/// **Public** - called by main.rs before execution
pub fn validate_args(args: &DemoArgs) -> Result<()> {
    if args.iterations == 0 {
        bail!("Iterations must be at least 1");
    }
    if args.output.as_os_str().is_empty() {
        bail!("Output path must not be empty");
    }
    Ok(())
}

/// Execute the demo command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Invalid precision
/// * File write errors
pub fn execute_demo(args: DemoArgs) -> Result<Snapshot> {
    let started = Instant::now();
    let options = SnapshotOptions::from_env()
        .with_precision(args.precision)
        .context("Invalid snapshot precision")?;

    info!("Step 1/4: Setting up profiler...");
    let profiler = Profiler::new();
    let queries = Rc::new(RefCell::new(
        GroupAggregator::new("db")
            .by_record_name()
            .with_name("Database queries"),
    ));
    let everything = Rc::new(RefCell::new(ProfilerAggregator::new(&profiler)));
    profiler.add_aggregator(queries.clone());
    profiler.add_aggregator(everything.clone());

    info!("Step 2/4: Running {} simulated requests...", args.iterations);
    run_workload(&profiler, &args);

    info!("Step 3/4: Building snapshot...");
    let snapshot = build_snapshot(&profiler, &PlainFormatter::new(), &options);
    validate_snapshot(&snapshot).context("Built snapshot failed validation")?;

    info!("Step 4/4: Writing snapshot...");
    write_snapshot(&snapshot, &args.output).context("Failed to write snapshot JSON")?;
    info!("✓ Snapshot written to: {}", args.output.display());

    if args.print_summary {
        println!("\n{}", "=".repeat(60));
        println!("PROFILE SUMMARY");
        println!("{}", "=".repeat(60));
        println!("Records:     {}", snapshot.records.len());
        println!("Duration:    {:.3} ms", profiler.duration());
        println!("Severity:    {}", profiler.severity());
        let queries = queries.borrow();
        println!(
            "{}: {} executions, avg {:.3} ms, severity {}",
            queries.name(),
            queries.total_execution(),
            queries.average_duration(),
            queries.severity()
        );
        for (identity, aggregation) in queries.aggregations().iter() {
            println!(
                "  {:<12} {:>3}x  max {:.3} ms",
                identity,
                aggregation.total_execution(),
                aggregation.maximum_duration()
            );
        }
        println!("Profiler-wide executions: {}", everything.borrow().total_execution());
        println!("{}", "=".repeat(60));
    }

    info!("Demo completed in {:.2}s", started.elapsed().as_secs_f64());
    Ok(snapshot)
}

/// Simulated request handling: a request span wrapping a few queries and an
/// outbound call, with one query left running to show live records.
fn run_workload(profiler: &Profiler, args: &DemoArgs) {
    let work = |factor: u64| thread::sleep(Duration::from_millis(args.work_ms * factor));

    for request in 0..args.iterations {
        let span = profiler.start_with("app", "request", context([("index", request)]));

        profiler.start_with("db", "select", context([("table", "users")]));
        work(1);
        profiler.stop_in("db", Some("select"));

        profiler.start_with("db", "update", context([("table", "sessions")]));
        work(2);
        profiler.stop_with("db", Some("update"), context([("rows", 1)]));

        let call = profiler.start_with(
            "http",
            "GET /profile",
            context([("authorization", "Bearer secret")]),
        );
        work(3);
        call.stop(context([("status", 200)]));

        span.stop(context([("ok", true)]));
        debug!("Request {} finished", request);
    }

    profiler.start_with("db", "vacuum", context([("table", "events")]));
}
