//! Span Trace CLI
//!
//! Runs an instrumented demo workload, writes its snapshot and validates
//! snapshot files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use span_trace::commands::{
    display_schema, display_version, execute_demo, validate_args, validate_snapshot_file, DemoArgs,
};
use span_trace::utils::config::DEFAULT_PRECISION;

/// Span Trace - in-process span profiling
#[derive(Parser, Debug)]
#[command(name = "span-trace")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an instrumented sample workload and write its snapshot
    Demo {
        /// Output path for the JSON snapshot
        #[arg(short, long, default_value = "snapshot.json", env = "SPAN_TRACE_OUTPUT")]
        output: PathBuf,

        /// Number of simulated requests
        #[arg(short, long, default_value = "3")]
        iterations: usize,

        /// Base sleep per simulated query (milliseconds)
        #[arg(long, default_value = "2")]
        work_ms: u64,

        /// Decimal places for durations and percentages
        #[arg(long, default_value_t = DEFAULT_PRECISION, env = "SPAN_TRACE_PRECISION")]
        precision: u32,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a snapshot JSON file
    Validate {
        /// Path to snapshot JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Demo {
            output,
            iterations,
            work_ms,
            precision,
            summary,
        } => {
            let args = DemoArgs {
                output,
                iterations,
                work_ms,
                precision,
                print_summary: summary,
            };

            // Validate args first
            validate_args(&args)?;

            execute_demo(args)?;
        }

        Commands::Validate { file } => {
            validate_snapshot_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
