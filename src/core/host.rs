//! Host time and memory sources.
//!
//! The profiler never reads the host directly: it asks an `Environment`,
//! which pairs a `Clock` with a `MemorySource`. Production code uses the
//! process defaults; tests swap in `ManualClock` and `FixedMemory` to get
//! exact durations.

use super::measure::{Mark, MemorySample};
use log::warn;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Millisecond time source
pub trait Clock {
    /// Current time in milliseconds since the unix epoch
    fn now_ms(&self) -> f64;
}

/// Process memory readings
pub trait MemorySource {
    fn current(&self) -> MemorySample;

    /// Highest readings observed so far
    fn peak(&self) -> MemorySample;

    /// Memory limit in bytes, `-1` when unlimited, `0` when unknown
    fn limit(&self) -> i64;
}

/// Wall clock anchored once per process, then advanced by `Instant`.
///
/// Readings are comparable with unix timestamps yet never go backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

struct ClockAnchor {
    unix_ms: f64,
    instant: Instant,
}

static ANCHOR: OnceLock<ClockAnchor> = OnceLock::new();

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        let anchor = ANCHOR.get_or_init(|| ClockAnchor {
            unix_ms: unix_now_ms(),
            instant: Instant::now(),
        });
        anchor.unix_ms + anchor.instant.elapsed().as_secs_f64() * 1000.0
    }
}

fn unix_now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Manually driven clock for tests and replays
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

static PEAK_MEMORY: AtomicU64 = AtomicU64::new(0);
static PEAK_REAL_MEMORY: AtomicU64 = AtomicU64::new(0);
static MEMORY_LIMIT: OnceLock<i64> = OnceLock::new();

/// Memory readings of the running process via `memory-stats`.
///
/// Physical memory maps to `memory`, virtual memory to `real_memory`.
/// An unavailable reading degrades to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessMemory;

impl MemorySource for ProcessMemory {
    fn current(&self) -> MemorySample {
        let sample = match memory_stats::memory_stats() {
            Some(stats) => MemorySample {
                memory: stats.physical_mem as u64,
                real_memory: stats.virtual_mem as u64,
            },
            None => MemorySample::default(),
        };
        PEAK_MEMORY.fetch_max(sample.memory, Ordering::Relaxed);
        PEAK_REAL_MEMORY.fetch_max(sample.real_memory, Ordering::Relaxed);
        sample
    }

    fn peak(&self) -> MemorySample {
        self.current();
        MemorySample {
            memory: PEAK_MEMORY.load(Ordering::Relaxed),
            real_memory: PEAK_REAL_MEMORY.load(Ordering::Relaxed),
        }
    }

    fn limit(&self) -> i64 {
        *MEMORY_LIMIT.get_or_init(read_address_space_limit)
    }
}

fn read_address_space_limit() -> i64 {
    match std::fs::read_to_string("/proc/self/limits") {
        Ok(content) => parse_limits_table(&content),
        Err(e) => {
            warn!("Memory limit unavailable: {}", e);
            0
        }
    }
}

/// Extract the soft address-space limit from a `/proc/<pid>/limits` table
fn parse_limits_table(content: &str) -> i64 {
    content
        .lines()
        .find_map(|line| line.strip_prefix("Max address space"))
        .and_then(|rest| rest.split_whitespace().next())
        .map(parse_memory_limit)
        .unwrap_or(0)
}

/// Parse a memory limit written as bytes or with a size suffix.
///
/// Accepts `unlimited`, `-1` and any negative value as unlimited (`-1`);
/// `512`, `64k`, `128M`, `2gb`, `1T` as sizes. Anything else is unknown (`0`).
pub fn parse_memory_limit(value: &str) -> i64 {
    let value = value.trim();
    if value.eq_ignore_ascii_case("unlimited") {
        return -1;
    }
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let digits_end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits_end == 0 {
        return 0;
    }
    let amount: i64 = match unsigned[..digits_end].parse() {
        Ok(amount) => amount,
        Err(_) => return 0,
    };
    if negative {
        return -1;
    }
    let unit = unsigned[digits_end..].trim().to_ascii_lowercase();
    let multiplier: i64 = match unit.as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        "t" | "tb" => 1 << 40,
        _ => return 0,
    };
    amount.saturating_mul(multiplier)
}

/// Fixed memory readings for tests; peaks follow whatever was set
#[derive(Debug, Clone, Default)]
pub struct FixedMemory {
    current: Rc<Cell<MemorySample>>,
    peak: Rc<Cell<MemorySample>>,
    limit: i64,
}

impl FixedMemory {
    pub fn new(memory: u64, real_memory: u64) -> Self {
        let fixed = Self::default();
        fixed.set(memory, real_memory);
        fixed
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn set(&self, memory: u64, real_memory: u64) {
        self.current.set(MemorySample {
            memory,
            real_memory,
        });
        let peak = self.peak.get();
        self.peak.set(MemorySample {
            memory: peak.memory.max(memory),
            real_memory: peak.real_memory.max(real_memory),
        });
    }
}

impl MemorySource for FixedMemory {
    fn current(&self) -> MemorySample {
        self.current.get()
    }

    fn peak(&self) -> MemorySample {
        self.peak.get()
    }

    fn limit(&self) -> i64 {
        self.limit
    }
}

/// Clock and memory source shared by one profiler and everything it creates
#[derive(Clone)]
pub struct Environment {
    clock: Rc<dyn Clock>,
    memory: Rc<dyn MemorySource>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(SystemClock, ProcessMemory)
    }
}

impl Environment {
    pub fn new(clock: impl Clock + 'static, memory: impl MemorySource + 'static) -> Self {
        Self {
            clock: Rc::new(clock),
            memory: Rc::new(memory),
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn memory(&self) -> MemorySample {
        self.memory.current()
    }

    pub fn peak_memory(&self) -> MemorySample {
        self.memory.peak()
    }

    pub fn memory_limit(&self) -> i64 {
        self.memory.limit()
    }

    /// Sample time and memory together
    pub fn mark(&self) -> Mark {
        Mark {
            time: self.now_ms(),
            memory: self.memory(),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_limit_units() {
        assert_eq!(parse_memory_limit("512"), 512);
        assert_eq!(parse_memory_limit("512b"), 512);
        assert_eq!(parse_memory_limit("64k"), 64 * 1024);
        assert_eq!(parse_memory_limit("128M"), 128 * 1024 * 1024);
        assert_eq!(parse_memory_limit("2gb"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_memory_limit(" 1 T "), 1 << 40);
    }

    #[test]
    fn test_parse_memory_limit_unlimited_and_unknown() {
        assert_eq!(parse_memory_limit("-1"), -1);
        assert_eq!(parse_memory_limit("unlimited"), -1);
        assert_eq!(parse_memory_limit("-20M"), -1);
        assert_eq!(parse_memory_limit("lots"), 0);
        assert_eq!(parse_memory_limit("12q"), 0);
        assert_eq!(parse_memory_limit(""), 0);
    }

    #[test]
    fn test_parse_limits_table() {
        let table = "Limit                     Soft Limit           Hard Limit           Units\n\
                     Max cpu time              unlimited            unlimited            seconds\n\
                     Max address space         4294967296           unlimited            bytes\n";
        assert_eq!(parse_limits_table(table), 4294967296);
        assert_eq!(parse_limits_table("Max open files 1024 1024 files"), 0);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(100.0);
        let env = Environment::new(clock.clone(), FixedMemory::new(10, 20));
        clock.advance(2.5);
        assert_eq!(env.now_ms(), 102.5);
        assert_eq!(env.mark().memory.real_memory, 20);
    }

    #[test]
    fn test_fixed_memory_tracks_peak() {
        let memory = FixedMemory::new(100, 200);
        memory.set(50, 300);
        assert_eq!(memory.current().memory, 50);
        assert_eq!(memory.peak(), MemorySample { memory: 100, real_memory: 300 });
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(a > 1_000_000_000_000.0);
    }
}
