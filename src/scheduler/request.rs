//! Scheduling requests.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::coordination::SafetyPolicy;
use crate::domain::DeferralMode;

/// Which strategy to build for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKey {
    Mode(DeferralMode),
    /// Registered factory key, or a mode name
    Named(String),
}

impl fmt::Display for StrategyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKey::Mode(mode) => write!(f, "{mode}"),
            StrategyKey::Named(key) => write!(f, "{key}"),
        }
    }
}

impl From<DeferralMode> for StrategyKey {
    fn from(mode: DeferralMode) -> Self {
        StrategyKey::Mode(mode)
    }
}

/// Everything the scheduler needs to start one run, apart from the work.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub strategy: StrategyKey,
    /// Pacing hint handed to the strategy
    pub initial_delay: Duration,
    pub cancel: CancellationToken,
    /// Explicit cap for this run; beats every other safety source
    pub max_cycles: Option<u32>,
    /// Reuse a caller-supplied correlation id instead of generating one
    pub correlation_id: Option<String>,
}

impl ScheduleRequest {
    pub fn new(mode: DeferralMode) -> Self {
        Self::for_key(StrategyKey::Mode(mode))
    }

    pub fn named(key: impl Into<String>) -> Self {
        Self::for_key(StrategyKey::Named(key.into()))
    }

    fn for_key(strategy: StrategyKey) -> Self {
        Self {
            strategy,
            initial_delay: Duration::ZERO,
            cancel: CancellationToken::new(),
            max_cycles: None,
            correlation_id: None,
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub(crate) fn safety_override(&self) -> Option<SafetyPolicy> {
        self.max_cycles.map(SafetyPolicy::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ScheduleRequest::new(DeferralMode::ThresholdGated);
        assert_eq!(request.strategy, StrategyKey::Mode(DeferralMode::ThresholdGated));
        assert_eq!(request.initial_delay, Duration::ZERO);
        assert!(request.max_cycles.is_none());
        assert!(request.safety_override().is_none());
        assert!(!request.cancel.is_cancelled());
    }

    #[test]
    fn test_request_builders() {
        let token = CancellationToken::new();
        let request = ScheduleRequest::named("slow-burn")
            .with_initial_delay(Duration::from_millis(5))
            .with_cancel(token.clone())
            .with_max_cycles(12)
            .with_correlation_id("run-req");
        token.cancel();
        assert!(request.cancel.is_cancelled());
        assert_eq!(request.strategy.to_string(), "slow-burn");
        assert_eq!(request.safety_override(), Some(SafetyPolicy::new(12)));
        assert_eq!(request.correlation_id.as_deref(), Some("run-req"));
    }
}
