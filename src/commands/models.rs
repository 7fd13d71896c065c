use std::path::PathBuf;

/// Arguments for the demo command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct DemoArgs {
    /// Output path for the JSON snapshot
    pub output: PathBuf,

    /// Number of simulated requests
    pub iterations: usize,

    /// Base sleep per simulated query, in milliseconds
    pub work_ms: u64,

    /// Decimal places for durations and percentages
    pub precision: u32,

    /// Print a text summary to stdout
    pub print_summary: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            output: PathBuf::from("snapshot.json"),
            iterations: 3,
            work_ms: 2,
            precision: 4,
            print_summary: false,
        }
    }
}
