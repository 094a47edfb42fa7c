//! Pacing strategies
//!
//! A strategy decides how long to put off a unit of work and whether it ever
//! runs. Every variant embeds a [`StrategyBase`] that owns the bookkeeping
//! (counters, safety cap, handle polling, observer fan-out); the variant only
//! supplies its pacing loop.

pub mod base;
pub mod factory;
pub mod immediate;
pub mod perpetual;
pub mod predicate;
pub mod sequential;
pub mod threshold;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

pub use base::StrategyBase;
pub use factory::{DefaultStrategyFactory, StrategyBuilder, StrategyFactory, StrategyTuning};
pub use immediate::{EscalationTuning, ImmediateEscalating};
pub use perpetual::PerpetualDefer;
pub use predicate::{Predicate, PredicateSelected, is_weekend};
pub use sequential::SequentialComposite;
pub use threshold::{Gate, ThresholdGated, ThresholdTuning};

use crate::coordination::{CompletionHandle, SafetyPolicy};
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::Result;
use crate::observer::ObserverSet;
use crate::pacing::Pacing;

/// The unit of work being put off. Invoked at most once per run.
pub type Work = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`Work`].
pub fn unit_of_work<F, Fut>(f: F) -> Work
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Work that does nothing. Rehearsal phases of a composite receive this.
pub fn noop_work() -> Work {
    unit_of_work(|| async { Ok(()) })
}

/// Run-scoped collaborators attached to a strategy before `execute`.
#[derive(Clone, Default)]
pub struct RunBinding {
    /// Correlation id to reuse; generated at run start when absent
    pub correlation_id: Option<String>,
    pub handle: Option<CompletionHandle>,
    pub observers: ObserverSet,
    /// Explicit cap for this run
    pub safety_override: Option<SafetyPolicy>,
    /// Cap supplied by the composition root, used when nothing else applies
    pub injected_safety: Option<SafetyPolicy>,
    /// Sub-strategy of a composite; suppresses the executed notification
    pub nested: bool,
}

impl RunBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_handle(mut self, handle: CompletionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn with_observers(mut self, observers: ObserverSet) -> Self {
        self.observers = observers;
        self
    }

    pub fn with_safety(mut self, safety: SafetyPolicy) -> Self {
        self.safety_override = Some(safety);
        self
    }

    pub fn with_injected_safety(mut self, safety: SafetyPolicy) -> Self {
        self.injected_safety = Some(safety);
        self
    }

    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }
}

/// A pacing strategy.
///
/// `execute` returns `Ok` when the run ends normally (executed, abandoned or
/// stopped by the safety cap), `Cancelled` when the token fires, and the work's
/// own error when the work fails. The result is available from `last_result`
/// on every one of those paths.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn mode(&self) -> DeferralMode;

    /// Attach run-scoped collaborators. Strategies that keep no run state may ignore this.
    fn bind(&mut self, _binding: RunBinding) {}

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()>;

    /// Result of the last run, if this strategy reports one.
    fn last_result(&self) -> Option<DeferralResult> {
        None
    }
}
