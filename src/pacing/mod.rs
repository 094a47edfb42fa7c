//! Pacing collaborators
//!
//! Everything a strategy consumes but does not own: how to wait, where
//! randomness and time come from, and where excuses come from. `Pacing`
//! bundles them with the initial delay hint and the cancellation token so a
//! strategy's `execute` takes a single input value.

pub mod delay;
pub mod excuse;
pub mod random;
pub mod time;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use delay::{DelayPolicy, InstantDelay, RecordingDelay, TokioDelay};
pub use excuse::{CannedExcuses, ExcuseContext, ExcuseSource};
pub use random::{FixedRandom, RandomSource, SeededRandom, ThreadRandom};
pub use time::{ManualClock, SystemClock, TimeSource};

use crate::error::{DeferralError, Result};

/// Inputs to one strategy execution.
#[derive(Clone)]
pub struct Pacing {
    /// Seed delay; each strategy decides what it means
    pub initial_delay: Duration,
    pub excuses: Option<Arc<dyn ExcuseSource>>,
    pub delay: Arc<dyn DelayPolicy>,
    pub random: Arc<dyn RandomSource>,
    pub clock: Arc<dyn TimeSource>,
    pub cancel: CancellationToken,
}

impl Pacing {
    /// Real-time pacing with no excuses and a fresh cancellation token.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            excuses: None,
            delay: Arc::new(TokioDelay),
            random: Arc::new(ThreadRandom),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_excuses(mut self, excuses: Arc<dyn ExcuseSource>) -> Self {
        self.excuses = Some(excuses);
        self
    }

    pub fn with_delay_policy(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fail with `Cancelled` if the token has fired.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DeferralError::Cancelled);
        }
        Ok(())
    }

    /// One suspension point: cancellation is checked before and after the wait.
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        self.ensure_active()?;
        self.delay.delay(duration, &self.cancel).await?;
        self.ensure_active()
    }

    /// Stretch `base` by up to `jitter` (a fraction) using the random source.
    pub fn jittered(&self, base: Duration, jitter: f64) -> Duration {
        if jitter <= 0.0 {
            return base;
        }
        let stretched = base.as_secs_f64() * (1.0 + jitter * self.random.next_f64());
        Duration::try_from_secs_f64(stretched).unwrap_or(Duration::MAX)
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new()
    }
}
