//! Process-wide diagnostics sink.
//!
//! A fixed low-level feed that sits beside the per-run observer list. Every
//! lifecycle notification increments exactly one counter keyed by metric name
//! and mode, and is mirrored as a `tracing` event tagged with the correlation
//! id.

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use super::event::{LifecycleEvent, LifecycleKind};
use crate::domain::DeferralMode;

static COUNTERS: LazyLock<Mutex<HashMap<(LifecycleKind, DeferralMode), u64>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Record one lifecycle notification.
pub fn record(event: &LifecycleEvent) {
    {
        let mut counters = COUNTERS.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry((event.kind, event.mode)).or_insert(0) += 1;
    }

    tracing::debug!(
        target: "deferral::diagnostics",
        metric = event.kind.metric_name(),
        mode = %event.mode,
        correlation_id = %event.correlation_id,
        cycles = event.cycles,
        excuses = event.excuses,
        "lifecycle"
    );
}

/// Current value of one counter.
pub fn counter(kind: LifecycleKind, mode: DeferralMode) -> u64 {
    COUNTERS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(&(kind, mode))
        .copied()
        .unwrap_or(0)
}

/// Totals per metric name across all modes.
pub fn snapshot() -> HashMap<&'static str, u64> {
    let counters = COUNTERS.lock().unwrap_or_else(|e| e.into_inner());
    let mut totals: HashMap<&'static str, u64> = LifecycleKind::ALL
        .iter()
        .map(|kind| (kind.metric_name(), 0))
        .collect();
    for ((kind, _), value) in counters.iter() {
        *totals.entry(kind.metric_name()).or_insert(0) += value;
    }
    totals
}
