//! Immediate escalating strategy.
//!
//! Starts with a short delay and multiplies it (plus jitter) every cycle.
//! Once the next delay would reach the ceiling the work runs.

use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::{RunBinding, Strategy, StrategyBase, Work};
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::{DeferralError, Result};
use crate::pacing::Pacing;

/// Growth parameters for the escalating delay.
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationTuning {
    /// Used when the pacing hint is zero
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub ceiling: Duration,
    /// Extra stretch per step, as a fraction of the step
    pub jitter: f64,
}

impl Default for EscalationTuning {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            multiplier: 2.0,
            ceiling: Duration::from_secs(1),
            jitter: 0.1,
        }
    }
}

impl EscalationTuning {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(DeferralError::Configuration(
                "immediate initial delay must be positive".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Err(DeferralError::Configuration(format!(
                "immediate multiplier must be a finite number greater than 1, got {}",
                self.multiplier
            )));
        }
        if self.ceiling.is_zero() {
            return Err(DeferralError::Configuration(
                "immediate ceiling must be positive".to_string(),
            ));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(DeferralError::Configuration(format!(
                "immediate jitter must be finite and not negative, got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

pub struct ImmediateEscalating {
    base: StrategyBase,
    tuning: EscalationTuning,
}

impl ImmediateEscalating {
    pub fn new(tuning: EscalationTuning) -> Result<Self> {
        tuning.validate()?;
        Ok(Self {
            base: StrategyBase::new(DeferralMode::ImmediateEscalating),
            tuning,
        })
    }

    pub fn tuning(&self) -> &EscalationTuning {
        &self.tuning
    }

    fn first_delay(&self, pacing: &Pacing) -> Duration {
        if pacing.initial_delay.is_zero() {
            self.tuning.initial_delay
        } else {
            pacing.initial_delay
        }
    }

    /// Next step, never past the ceiling.
    fn next_delay(&self, delay: Duration, pacing: &Pacing) -> Duration {
        let ceiling = self.tuning.ceiling;
        let scaled = Duration::try_from_secs_f64(delay.as_secs_f64() * self.tuning.multiplier)
            .unwrap_or(ceiling)
            .min(ceiling);
        pacing.jittered(scaled, self.tuning.jitter).min(ceiling)
    }

    async fn escalate(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let mut delay = self.first_delay(pacing);

        while delay < self.tuning.ceiling {
            if self.base.safety_cap_reached() {
                return Ok(());
            }
            pacing.pause(delay).await?;
            self.base.increment_cycle();
            self.base.invoke_excuse(pacing.excuses.as_deref()).await;
            if self.base.check_for_external_override(&work).await? {
                return Ok(());
            }
            delay = self.next_delay(delay, pacing);
            tracing::trace!(next_delay_ms = delay.as_millis() as u64, "Escalated delay");
        }

        // the last permitted cycle may also be the one that reached the ceiling
        if self.base.safety_cap_reached() {
            return Ok(());
        }
        pacing.ensure_active()?;
        self.base.execute_work(&work).await?;
        Ok(())
    }
}

impl Default for ImmediateEscalating {
    fn default() -> Self {
        Self {
            base: StrategyBase::new(DeferralMode::ImmediateEscalating),
            tuning: EscalationTuning::default(),
        }
    }
}

#[async_trait]
impl Strategy for ImmediateEscalating {
    fn mode(&self) -> DeferralMode {
        DeferralMode::ImmediateEscalating
    }

    fn bind(&mut self, binding: RunBinding) {
        self.base.bind(binding);
    }

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let span = self.base.begin(pacing);
        let outcome = self.escalate(work, pacing).instrument(span).await;
        self.base.finish(pacing, outcome)
    }

    fn last_result(&self) -> Option<DeferralResult> {
        self.base.last_result()
    }
}
