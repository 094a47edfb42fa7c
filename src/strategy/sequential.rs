//! Sequential composite: run phases in order, real work only in the last.
//!
//! Earlier phases are rehearsals and receive a no-op work. Every phase shares
//! the composite's handle, observers and correlation id, and is capped at the
//! cycles the composite has left, so the whole sequence honors one safety
//! budget.
//!
//! Executed resolution once the phases are done:
//! - any reporting phase executed (rehearsal or final): executed
//! - no phase reported a result: executed anyway
//! - the final phase reported a stop at the safety cap: not executed

use async_trait::async_trait;
use tracing::Instrument;

use super::{RunBinding, Strategy, StrategyBase, Work, noop_work};
use crate::coordination::SafetyPolicy;
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::{DeferralError, Result};
use crate::pacing::Pacing;

pub struct SequentialComposite {
    base: StrategyBase,
    phases: Vec<Box<dyn Strategy>>,
}

impl SequentialComposite {
    /// At least one phase is required.
    pub fn new(phases: Vec<Box<dyn Strategy>>) -> Result<Self> {
        if phases.is_empty() {
            return Err(DeferralError::Configuration(
                "sequential composite needs at least one phase".to_string(),
            ));
        }
        Ok(Self {
            base: StrategyBase::new(DeferralMode::SequentialComposite),
            phases,
        })
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn phase_modes(&self) -> Vec<DeferralMode> {
        self.phases.iter().map(|p| p.mode()).collect()
    }

    async fn run_phases(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let last = self.phases.len() - 1;
        let handle = self.base.handle().cloned();
        let mut any_reported = false;
        let mut any_executed = false;
        let mut final_capped = false;

        for index in 0..self.phases.len() {
            let is_final = index == last;

            if let Some(handle) = &handle {
                if handle.abandon_requested() {
                    self.base.mark_abandoned();
                    return Ok(());
                }
                if !is_final && handle.trigger_requested() {
                    tracing::debug!(phase = index, "Force-now pending, skipping rehearsal");
                    continue;
                }
            }
            if self.base.safety_cap_reached() {
                return Ok(());
            }
            pacing.ensure_active()?;

            let budget = SafetyPolicy::new(self.base.remaining_cycles());
            let binding = self.base.nested_binding(budget);
            let phase = &mut self.phases[index];
            phase.bind(binding);
            let phase_work = if is_final { work.clone() } else { noop_work() };
            tracing::debug!(phase = index, mode = %phase.mode(), budget = budget.max_cycles, "Starting phase");

            let outcome = phase.execute(phase_work, pacing).await;

            if let Some(result) = phase.last_result() {
                any_reported = true;
                any_executed |= result.executed;
                if is_final && !result.executed && budget.is_reached(result.cycles) {
                    final_capped = true;
                }
                self.base.absorb(&result);
            }
            outcome?;

            if self.base.counters().abandoned {
                return Ok(());
            }
        }

        if final_capped {
            return Ok(());
        }
        if any_executed || !any_reported {
            self.base.mark_executed();
        }
        Ok(())
    }
}

#[async_trait]
impl Strategy for SequentialComposite {
    fn mode(&self) -> DeferralMode {
        DeferralMode::SequentialComposite
    }

    fn bind(&mut self, binding: RunBinding) {
        self.base.bind(binding);
    }

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let span = self.base.begin(pacing);
        let outcome = self.run_phases(work, pacing).instrument(span).await;
        self.base.finish(pacing, outcome)
    }

    fn last_result(&self) -> Option<DeferralResult> {
        self.base.last_result()
    }
}
