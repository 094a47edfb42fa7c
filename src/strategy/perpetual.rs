//! Perpetual deferral: wait a fixed interval, forever.
//!
//! Never runs the work on its own. It ends through a force-now request, an
//! abandon request, cancellation, or the safety cap.

use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use super::{RunBinding, Strategy, StrategyBase, Work};
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::{DeferralError, Result};
use crate::pacing::Pacing;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

pub struct PerpetualDefer {
    base: StrategyBase,
    interval: Duration,
}

impl PerpetualDefer {
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(DeferralError::Configuration(
                "perpetual interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            base: StrategyBase::new(DeferralMode::PerpetualDefer),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn defer(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let interval = if pacing.initial_delay.is_zero() {
            self.interval
        } else {
            pacing.initial_delay
        };

        loop {
            if self.base.safety_cap_reached() {
                return Ok(());
            }
            pacing.pause(interval).await?;
            self.base.increment_cycle();
            self.base.invoke_excuse(pacing.excuses.as_deref()).await;
            if self.base.check_for_external_override(&work).await? {
                return Ok(());
            }
        }
    }
}

impl Default for PerpetualDefer {
    fn default() -> Self {
        Self {
            base: StrategyBase::new(DeferralMode::PerpetualDefer),
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[async_trait]
impl Strategy for PerpetualDefer {
    fn mode(&self) -> DeferralMode {
        DeferralMode::PerpetualDefer
    }

    fn bind(&mut self, binding: RunBinding) {
        self.base.bind(binding);
    }

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let span = self.base.begin(pacing);
        let outcome = self.defer(work, pacing).instrument(span).await;
        self.base.finish(pacing, outcome)
    }

    fn last_result(&self) -> Option<DeferralResult> {
        self.base.last_result()
    }
}
