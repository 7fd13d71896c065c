//! Shared timing, memory and severity arithmetic.
//!
//! Records, groups and the profiler each store their own marks; everything
//! derived from them (durations, used memory, severity) is computed here so
//! the three owners agree on the rules.

use crate::utils::config::{
    EXECUTION_CRITICAL, EXECUTION_INFO, EXECUTION_NOTICE, EXECUTION_WARNING, TIMESPAN_CRITICAL_MS,
    TIMESPAN_INFO_MS, TIMESPAN_NOTICE_MS, TIMESPAN_WARNING_MS,
};
use crate::utils::error::ConfigError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Classification tier, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    None,
    Info,
    Notice,
    Warning,
    Critical,
}

impl Severity {
    /// Classify a duration in milliseconds. Highest tier wins.
    pub fn from_duration(duration_ms: f64) -> Self {
        if duration_ms >= TIMESPAN_CRITICAL_MS {
            Severity::Critical
        } else if duration_ms >= TIMESPAN_WARNING_MS {
            Severity::Warning
        } else if duration_ms >= TIMESPAN_NOTICE_MS {
            Severity::Notice
        } else if duration_ms >= TIMESPAN_INFO_MS {
            Severity::Info
        } else {
            Severity::None
        }
    }

    /// Classify an execution count against aggregator thresholds
    pub fn from_executions(count: u64, thresholds: &ExecutionThresholds) -> Self {
        if count >= thresholds.critical {
            Severity::Critical
        } else if count >= thresholds.warning {
            Severity::Warning
        } else if count >= thresholds.notice {
            Severity::Notice
        } else if count >= thresholds.info {
            Severity::Info
        } else {
            Severity::None
        }
    }

    /// Numeric code written into snapshots.
    ///
    /// These are the codes existing snapshot viewers bucket on
    /// (slow = 1/3, average = 3/5, fast = 6/0).
    pub fn wire_code(self) -> u8 {
        match self {
            Severity::None => 0,
            Severity::Critical => 1,
            Severity::Warning => 3,
            Severity::Notice => 5,
            Severity::Info => 6,
        }
    }

    pub fn from_wire_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Severity::None),
            1 => Some(Severity::Critical),
            3 => Some(Severity::Warning),
            5 => Some(Severity::Notice),
            6 => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.wire_code())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Severity::from_wire_code(code)
            .ok_or_else(|| D::Error::custom(format!("unknown severity code {}", code)))
    }
}

/// Execution-count thresholds used by aggregators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionThresholds {
    info: u64,
    notice: u64,
    warning: u64,
    critical: u64,
}

impl Default for ExecutionThresholds {
    fn default() -> Self {
        Self {
            info: EXECUTION_INFO,
            notice: EXECUTION_NOTICE,
            warning: EXECUTION_WARNING,
            critical: EXECUTION_CRITICAL,
        }
    }
}

impl ExecutionThresholds {
    /// Build custom thresholds.
    ///
    /// # Errors
    /// * `ConfigError::InvalidThresholds` - tiers are not non-decreasing
    pub fn new(info: u64, notice: u64, warning: u64, critical: u64) -> Result<Self, ConfigError> {
        if info > notice || notice > warning || warning > critical {
            return Err(ConfigError::InvalidThresholds {
                info,
                notice,
                warning,
                critical,
            });
        }
        Ok(Self {
            info,
            notice,
            warning,
            critical,
        })
    }

    pub fn info(&self) -> u64 {
        self.info
    }

    pub fn notice(&self) -> u64 {
        self.notice
    }

    pub fn warning(&self) -> u64 {
        self.warning
    }

    pub fn critical(&self) -> u64 {
        self.critical
    }
}

/// One memory reading in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySample {
    /// Memory in use by the process
    pub memory: u64,
    /// Memory reserved from the system
    pub real_memory: u64,
}

/// A point in time together with the memory reading taken at that moment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Mark {
    /// Milliseconds on the profiler clock
    pub time: f64,
    pub memory: MemorySample,
}

/// Elapsed milliseconds between two clock readings, never negative
pub fn elapsed_ms(start: f64, end: f64) -> f64 {
    (end - start).max(0.0)
}

/// Memory grown between two readings, floored at zero
pub fn grown_bytes(start: u64, end: u64) -> u64 {
    end.saturating_sub(start)
}

/// Anything with a start mark and a (possibly still open) end mark.
///
/// Implementors provide the two marks; durations, used memory and the
/// duration-based severity come for free.
pub trait Measured {
    fn start_mark(&self) -> Mark;

    /// The frozen end mark, or a live sample when still running
    fn end_mark(&self) -> Mark;

    fn start_time(&self) -> f64 {
        self.start_mark().time
    }

    fn end_time(&self) -> f64 {
        self.end_mark().time
    }

    fn duration(&self) -> f64 {
        elapsed_ms(self.start_time(), self.end_time())
    }

    fn start_memory(&self) -> u64 {
        self.start_mark().memory.memory
    }

    fn end_memory(&self) -> u64 {
        self.end_mark().memory.memory
    }

    fn used_memory(&self) -> u64 {
        grown_bytes(self.start_memory(), self.end_memory())
    }

    fn start_real_memory(&self) -> u64 {
        self.start_mark().memory.real_memory
    }

    fn end_real_memory(&self) -> u64 {
        self.end_mark().memory.real_memory
    }

    fn used_real_memory(&self) -> u64 {
        grown_bytes(self.start_real_memory(), self.end_real_memory())
    }

    fn severity(&self) -> Severity {
        Severity::from_duration(self.duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_severity_boundaries() {
        assert_eq!(Severity::from_duration(0.5), Severity::None);
        assert_eq!(Severity::from_duration(1.0), Severity::Info);
        assert_eq!(Severity::from_duration(4.99), Severity::Info);
        assert_eq!(Severity::from_duration(5.0), Severity::Notice);
        assert_eq!(Severity::from_duration(10.0), Severity::Warning);
        assert_eq!(Severity::from_duration(20.0), Severity::Critical);
        assert_eq!(Severity::from_duration(500.0), Severity::Critical);
    }

    #[test]
    fn test_execution_severity_is_monotonic() {
        let thresholds = ExecutionThresholds::default();
        let mut previous = Severity::None;
        for count in 0..40 {
            let current = Severity::from_executions(count, &thresholds);
            assert!(current >= previous, "severity dropped at {}", count);
            previous = current;
        }
        assert_eq!(Severity::from_executions(0, &thresholds), Severity::None);
        assert_eq!(Severity::from_executions(20, &thresholds), Severity::Critical);
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        assert!(ExecutionThresholds::new(1, 2, 3, 4).is_ok());
        assert!(ExecutionThresholds::new(2, 2, 2, 2).is_ok());
        assert_eq!(
            ExecutionThresholds::new(5, 1, 10, 20),
            Err(ConfigError::InvalidThresholds {
                info: 5,
                notice: 1,
                warning: 10,
                critical: 20
            })
        );
    }

    #[test]
    fn test_wire_codes_round_trip() {
        for severity in [
            Severity::None,
            Severity::Info,
            Severity::Notice,
            Severity::Warning,
            Severity::Critical,
        ] {
            assert_eq!(Severity::from_wire_code(severity.wire_code()), Some(severity));
        }
        assert_eq!(Severity::from_wire_code(2), None);
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "3");
    }

    #[test]
    fn test_grown_bytes_floors_at_zero() {
        assert_eq!(grown_bytes(100, 40), 0);
        assert_eq!(grown_bytes(40, 100), 60);
        assert_eq!(elapsed_ms(10.0, 4.0), 0.0);
    }
}
