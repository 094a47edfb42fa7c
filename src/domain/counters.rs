//! Run counters.
//!
//! `RunCounters` is owned by exactly one orchestration run and mutated only by
//! it. `LiveProgress` is the lock-free mirror a completion handle exposes to
//! callers polling for progress.

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-run bookkeeping, reset at the start of every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub cycles: u32,
    pub excuses: u32,
    pub executed: bool,
    pub triggered: bool,
    pub abandoned: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunCounters {
    /// Zero everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time copy of a run's live progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub cycles: u32,
    pub excuses: u32,
}

/// Progress counters shared between a run and its handle.
#[derive(Debug, Default)]
pub struct LiveProgress {
    cycles: AtomicU32,
    excuses: AtomicU32,
}

impl LiveProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self) -> u32 {
        self.cycles.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn record_excuse(&self) -> u32 {
        self.excuses.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            cycles: self.cycles.load(Ordering::Acquire),
            excuses: self.excuses.load(Ordering::Acquire),
        }
    }
}
