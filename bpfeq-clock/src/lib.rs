//! Clock abstraction for bpfeq.
//!
//! Provides a trait for getting the current time and the run identifiers
//! derived from it. Every equivalence run gets its own identifier so scratch
//! output from one run never lands in the directory of another.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{TimeZone, Utc};

/// Prefix shared by every run identifier.
pub const RUN_ID_PREFIX: &str = "bpfeq";

/// Trait for getting the current Unix timestamp.
pub trait Clock: Send + Sync {
    /// Returns the current time as Unix seconds since epoch.
    fn now_unix_sec(&self) -> u64;
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_sec(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Mock clock for testing with a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    timestamp: u64,
}

impl MockClock {
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp }
    }
}

impl Clock for MockClock {
    fn now_unix_sec(&self) -> u64 {
        self.timestamp
    }
}

/// Mock clock that advances by a fixed step on every read.
#[derive(Debug)]
pub struct AdvancingClock {
    timestamp: AtomicU64,
    increment: u64,
}

impl AdvancingClock {
    pub fn new(timestamp: u64, increment: u64) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
            increment,
        }
    }
}

impl Clock for AdvancingClock {
    fn now_unix_sec(&self) -> u64 {
        self.timestamp.fetch_add(self.increment, Ordering::SeqCst)
    }
}

/// Identifier of one equivalence run.
///
/// Format: `bpfeq-YYYYMMDD-HHMMSSZ` (UTC). Sorts chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId {
    value: String,
    started_at: u64,
}

impl RunId {
    /// Build a run identifier from the clock's current reading.
    pub fn from_clock<C: Clock + ?Sized>(clock: &C) -> Self {
        Self::from_timestamp(clock.now_unix_sec())
    }

    /// Build a run identifier for a given Unix timestamp.
    pub fn from_timestamp(ts_unix: u64) -> Self {
        let value = i64::try_from(ts_unix)
            .ok()
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .map(|dt| format!("{}-{}", RUN_ID_PREFIX, dt.format("%Y%m%d-%H%M%SZ")))
            .unwrap_or_else(|| format!("{}-{}", RUN_ID_PREFIX, ts_unix));

        Self {
            value,
            started_at: ts_unix,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Unix timestamp the run started at.
    pub fn started_at(&self) -> u64 {
        self.started_at
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
