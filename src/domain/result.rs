//! Run result - the immutable snapshot produced once per run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::DeferralMode;

/// Final outcome of one deferral run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferralResult {
    /// Strategy family that produced this result
    pub mode: DeferralMode,
    /// Whether the real unit of work ran to completion
    pub executed: bool,
    /// Wall time between run start and run end
    pub total_deferral: Duration,
    /// Number of excuses fetched
    pub excuse_count: u32,
    /// Number of completed deferral cycles
    pub cycles: u32,
    /// Whether a force-now request was honored
    pub triggered: bool,
    /// Whether an abandon request was honored
    pub abandoned: bool,
    /// Correlation id shared with the middleware context and diagnostics
    pub correlation_id: String,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
    /// When the run finished
    pub ended_at: Option<DateTime<Utc>>,
    /// `round(1 / (1 + excuses + cycles), 4)` when executed, else 0
    pub productivity_index: f64,
}

impl DeferralResult {
    /// Build a result with no activity recorded.
    pub fn new(mode: DeferralMode, correlation_id: impl Into<String>) -> Self {
        Self {
            mode,
            executed: false,
            total_deferral: Duration::ZERO,
            excuse_count: 0,
            cycles: 0,
            triggered: false,
            abandoned: false,
            correlation_id: correlation_id.into(),
            started_at: None,
            ended_at: None,
            productivity_index: 0.0,
        }
    }

    /// Result for a run that never got to finalize itself (e.g. cancelled before start).
    pub fn not_executed(mode: DeferralMode, correlation_id: impl Into<String>) -> Self {
        Self::new(mode, correlation_id)
    }

    /// Recompute the derived productivity index from the counters.
    pub fn with_productivity(mut self) -> Self {
        self.productivity_index = productivity_index(self.executed, self.excuse_count, self.cycles);
        self
    }
}

/// Toy scoring function: fewer cycles and excuses before executing scores higher.
pub fn productivity_index(executed: bool, excuses: u32, cycles: u32) -> f64 {
    if !executed {
        return 0.0;
    }
    let raw = 1.0 / (1.0 + f64::from(excuses) + f64::from(cycles));
    (raw * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_productivity_index_executed() {
        assert_eq!(productivity_index(true, 2, 3), 0.1667);
        assert_eq!(productivity_index(true, 0, 0), 1.0);
        assert_eq!(productivity_index(true, 1, 1), 0.3333);
    }

    #[test]
    fn test_productivity_index_not_executed() {
        assert_eq!(productivity_index(false, 2, 3), 0.0);
        assert_eq!(productivity_index(false, 0, 0), 0.0);
    }

    #[test]
    fn test_new_result_is_idle() {
        let result = DeferralResult::new(DeferralMode::PerpetualDefer, "run-1");
        assert!(!result.executed);
        assert_eq!(result.cycles, 0);
        assert_eq!(result.correlation_id, "run-1");
        assert_eq!(result.productivity_index, 0.0);
    }

    #[test]
    fn test_with_productivity() {
        let mut result = DeferralResult::new(DeferralMode::ImmediateEscalating, "run-2");
        result.executed = true;
        result.cycles = 3;
        result.excuse_count = 2;
        let result = result.with_productivity();
        assert_eq!(result.productivity_index, 0.1667);
    }

    #[test]
    fn test_result_serializes_mode_and_flags() {
        let result = DeferralResult::new(DeferralMode::ThresholdGated, "run-3");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["mode"], "threshold-gated");
        assert_eq!(json["executed"], false);
        assert_eq!(json["correlation_id"], "run-3");
    }
}
