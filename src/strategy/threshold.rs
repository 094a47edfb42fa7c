//! Threshold-gated strategy.
//!
//! Polls a clock gate. The work runs as soon as the gate opens or the elapsed
//! ceiling is hit, whichever comes first.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use tracing::Instrument;

use super::{RunBinding, Strategy, StrategyBase, Work};
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::{DeferralError, Result};
use crate::pacing::Pacing;

/// Condition on the current time that releases the work.
#[derive(Clone, Default)]
pub enum Gate {
    /// Never opens; only the elapsed ceiling releases the work
    #[default]
    Never,
    /// Opens at or after this instant
    Deadline(DateTime<Utc>),
    /// Open on any of these days (UTC)
    Weekdays(Vec<Weekday>),
    /// Open while the UTC hour is in `start..end`; wraps past midnight when `start > end`
    HourWindow { start: u32, end: u32 },
    Custom(Arc<dyn Fn(DateTime<Utc>) -> bool + Send + Sync>),
}

impl Gate {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> bool + Send + Sync + 'static,
    {
        Gate::Custom(Arc::new(f))
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self {
            Gate::Never => false,
            Gate::Deadline(at) => now >= *at,
            Gate::Weekdays(days) => days.contains(&now.weekday()),
            Gate::HourWindow { start, end } => {
                let hour = now.hour();
                if start <= end {
                    (*start..*end).contains(&hour)
                } else {
                    hour >= *start || hour < *end
                }
            }
            Gate::Custom(f) => f(now),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Gate::HourWindow { start, end } = self
            && (*start > 23 || *end > 24)
        {
            return Err(DeferralError::Configuration(format!(
                "hour window {start}..{end} is out of range"
            )));
        }
        Ok(())
    }
}

/// Custom gates compare by identity.
impl PartialEq for Gate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Gate::Never, Gate::Never) => true,
            (Gate::Deadline(a), Gate::Deadline(b)) => a == b,
            (Gate::Weekdays(a), Gate::Weekdays(b)) => a == b,
            (Gate::HourWindow { start: s1, end: e1 }, Gate::HourWindow { start: s2, end: e2 }) => {
                s1 == s2 && e1 == e2
            }
            (Gate::Custom(a), Gate::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Never => write!(f, "Never"),
            Gate::Deadline(at) => write!(f, "Deadline({at})"),
            Gate::Weekdays(days) => write!(f, "Weekdays({days:?})"),
            Gate::HourWindow { start, end } => write!(f, "HourWindow({start}..{end})"),
            Gate::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Polling parameters for the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTuning {
    pub poll_interval: Duration,
    pub jitter: f64,
    /// Elapsed time after which the work runs even with the gate closed
    pub max_elapsed: Duration,
}

impl Default for ThresholdTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            jitter: 0.1,
            max_elapsed: Duration::from_secs(5),
        }
    }
}

impl ThresholdTuning {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(DeferralError::Configuration(
                "threshold poll interval must be positive".to_string(),
            ));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(DeferralError::Configuration(format!(
                "threshold jitter must be finite and not negative, got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

pub struct ThresholdGated {
    base: StrategyBase,
    gate: Gate,
    tuning: ThresholdTuning,
}

impl ThresholdGated {
    pub fn new(gate: Gate, tuning: ThresholdTuning) -> Result<Self> {
        gate.validate()?;
        tuning.validate()?;
        Ok(Self {
            base: StrategyBase::new(DeferralMode::ThresholdGated),
            gate,
            tuning,
        })
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    async fn wait_for_gate(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let started = self.base.counters().started_at.unwrap_or_else(|| pacing.clock.now());

        loop {
            if self.base.safety_cap_reached() {
                return Ok(());
            }
            pacing.ensure_active()?;
            let now = pacing.clock.now();
            let elapsed = (now - started).to_std().unwrap_or_default();
            if self.gate.is_open(now) || elapsed >= self.tuning.max_elapsed {
                tracing::debug!(gate = ?self.gate, elapsed_ms = elapsed.as_millis() as u64, "Gate released");
                self.base.mark_threshold_reached();
                break;
            }
            pacing
                .pause(pacing.jittered(self.tuning.poll_interval, self.tuning.jitter))
                .await?;
            self.base.increment_cycle();
            self.base.invoke_excuse(pacing.excuses.as_deref()).await;
            if self.base.check_for_external_override(&work).await? {
                return Ok(());
            }
        }

        self.base.execute_work(&work).await?;
        Ok(())
    }
}

#[async_trait]
impl Strategy for ThresholdGated {
    fn mode(&self) -> DeferralMode {
        DeferralMode::ThresholdGated
    }

    fn bind(&mut self, binding: RunBinding) {
        self.base.bind(binding);
    }

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let span = self.base.begin(pacing);
        let outcome = self.wait_for_gate(work, pacing).instrument(span).await;
        self.base.finish(pacing, outcome)
    }

    fn last_result(&self) -> Option<DeferralResult> {
        self.base.last_result()
    }
}
