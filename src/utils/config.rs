//! Configuration and constants for the profiler and the CLI.

/// Current snapshot wire schema version (display only, not part of the payload)
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Group used when the caller does not name one
pub const DEFAULT_GROUP: &str = "default";

/// Default number of decimal places for duration and percentage fields
pub const DEFAULT_PRECISION: u32 = 4;

/// Highest precision accepted by the snapshot builder.
/// Beyond this, `10^p` no longer rounds f64 values meaningfully.
pub const MAX_PRECISION: u32 = 12;

// Duration thresholds in milliseconds (Record / Profiler severity)
pub const TIMESPAN_INFO_MS: f64 = 1.0;
pub const TIMESPAN_NOTICE_MS: f64 = 5.0;
pub const TIMESPAN_WARNING_MS: f64 = 10.0;
pub const TIMESPAN_CRITICAL_MS: f64 = 20.0;

// Execution-count thresholds (Aggregator severity)
pub const EXECUTION_INFO: u64 = 1;
pub const EXECUTION_NOTICE: u64 = 5;
pub const EXECUTION_WARNING: u64 = 10;
pub const EXECUTION_CRITICAL: u64 = 20;

/// Maximum string size kept by the plain formatter before truncation
pub const MAX_FORMATTED_STRING: usize = 300;

/// Context keys whose values the plain formatter never prints
pub const REDACTED_KEY_PATTERNS: &[&str] = &["password", "salt", "auth", "license", "hash"];

/// Environment variable holding the request start marker (unix seconds, float)
pub const REQUEST_START_ENV: &str = "SPAN_TRACE_REQUEST_START";
