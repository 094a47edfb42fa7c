//! Scheduler
//!
//! The single entry point callers use. A scheduler builds a fresh strategy per
//! request, binds the run-scoped collaborators, wraps the execution in the
//! middleware pipeline and reports the outcome one of three ways:
//!
//! - `run`: fire-and-forget, errors (including cancellation) propagate
//! - `run_for_result`: cancellation becomes an executed=false result
//! - `schedule`: returns a [`CompletionHandle`] immediately; the run happens on
//!   a tokio task and settles the handle exactly once
//!
//! # Example
//!
//! ```ignore
//! let scheduler = SchedulerBuilder::new().build();
//! let handle = scheduler.schedule(ScheduleRequest::new(DeferralMode::PerpetualDefer), work)?;
//! handle.trigger_now();
//! let result = handle.completion().await?;
//! ```

mod builder;
mod request;

use std::sync::Arc;

pub use builder::SchedulerBuilder;
pub use request::{ScheduleRequest, StrategyKey};

use crate::coordination::{CompletionHandle, SafetyPolicy};
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::{DeferralError, Result};
use crate::id::generate_correlation_id;
use crate::middleware::{DeferralContext, Pipeline};
use crate::observer::ObserverSet;
use crate::pacing::{DelayPolicy, ExcuseSource, Pacing, RandomSource, TimeSource};
use crate::strategy::{RunBinding, Strategy, StrategyFactory, Work};

/// Composition root for deferral runs. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    factory: Arc<dyn StrategyFactory>,
    pipeline: Pipeline,
    observers: ObserverSet,
    excuses: Option<Arc<dyn ExcuseSource>>,
    delay: Arc<dyn DelayPolicy>,
    random: Arc<dyn RandomSource>,
    clock: Arc<dyn TimeSource>,
    default_safety: Option<SafetyPolicy>,
}

/// A strategy built and ready to run.
struct PreparedRun {
    strategy: Box<dyn Strategy>,
    mode: DeferralMode,
    correlation_id: String,
    pacing: Pacing,
    safety_override: Option<SafetyPolicy>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn middleware_names(&self) -> Vec<String> {
        self.pipeline.names()
    }

    pub fn default_safety(&self) -> Option<SafetyPolicy> {
        self.default_safety
    }

    /// Run to completion. Cancellation surfaces as `DeferralError::Cancelled`.
    pub async fn run(&self, request: ScheduleRequest, work: Work) -> Result<()> {
        let prepared = self.prepare(request)?;
        let (outcome, _) = self.drive(prepared, work, None).await;
        outcome
    }

    /// Run to completion and return the result.
    ///
    /// Cancellation is not an error here: it yields a result with
    /// `executed == false`. Work failures still propagate.
    pub async fn run_for_result(&self, request: ScheduleRequest, work: Work) -> Result<DeferralResult> {
        let prepared = self.prepare(request)?;
        // private handle: status and progress are tracked even though no caller holds it
        let handle = CompletionHandle::new(prepared.mode, prepared.correlation_id.clone());
        let (outcome, mut result) = self.drive(prepared, work, Some(handle)).await;
        match outcome {
            Ok(()) => Ok(result),
            Err(DeferralError::Cancelled) => {
                result.executed = false;
                result.productivity_index = 0.0;
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a run in the background and hand back its control surface.
    ///
    /// The strategy is built before returning, so configuration errors fail
    /// here rather than through the handle. Must be called inside a tokio
    /// runtime.
    pub fn schedule(&self, request: ScheduleRequest, work: Work) -> Result<CompletionHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DeferralError::Configuration(format!("schedule needs a tokio runtime: {e}")))?;
        let prepared = self.prepare(request)?;
        let handle = CompletionHandle::new(prepared.mode, prepared.correlation_id.clone());

        let scheduler = self.clone();
        let run_handle = handle.clone();
        let task = runtime.spawn(async move {
            let (outcome, result) = scheduler.drive(prepared, work, Some(run_handle.clone())).await;
            settle(&run_handle, outcome, result);
        });

        let watcher = handle.clone();
        runtime.spawn(async move {
            if let Err(e) = task.await {
                tracing::error!(correlation_id = %watcher.correlation_id(), error = ?e, "Deferral task panicked");
                watcher.fail(DeferralError::Aborted(format!("run task failed: {e}")));
            }
        });

        Ok(handle)
    }

    fn prepare(&self, request: ScheduleRequest) -> Result<PreparedRun> {
        let strategy = match &request.strategy {
            StrategyKey::Mode(mode) => self.factory.create(*mode)?,
            StrategyKey::Named(key) => self.factory.create_named(key)?,
        };
        let mode = strategy.mode();
        let safety_override = request.safety_override();
        let correlation_id = request.correlation_id.unwrap_or_else(generate_correlation_id);
        let pacing = Pacing {
            initial_delay: request.initial_delay,
            excuses: self.excuses.clone(),
            delay: self.delay.clone(),
            random: self.random.clone(),
            clock: self.clock.clone(),
            cancel: request.cancel,
        };
        tracing::debug!(
            strategy = %request.strategy,
            mode = %mode,
            correlation_id = %correlation_id,
            "Prepared deferral run"
        );
        Ok(PreparedRun {
            strategy,
            mode,
            correlation_id,
            pacing,
            safety_override,
        })
    }

    async fn drive(
        &self,
        prepared: PreparedRun,
        work: Work,
        handle: Option<CompletionHandle>,
    ) -> (Result<()>, DeferralResult) {
        let PreparedRun {
            mut strategy,
            mode,
            correlation_id,
            pacing,
            safety_override,
        } = prepared;

        strategy.bind(RunBinding {
            correlation_id: Some(correlation_id.clone()),
            handle,
            observers: self.observers.clone(),
            safety_override,
            injected_safety: self.default_safety,
            nested: false,
        });

        let mut ctx = DeferralContext::new(mode, correlation_id.clone());
        let outcome = self
            .pipeline
            .execute(&mut ctx, strategy.as_mut(), work, &pacing)
            .await;

        let result = strategy
            .last_result()
            .or(ctx.provisional)
            .unwrap_or_else(|| DeferralResult::not_executed(mode, correlation_id));
        (outcome, result)
    }
}

fn settle(handle: &CompletionHandle, outcome: Result<()>, result: DeferralResult) {
    let settled = match outcome {
        Ok(()) => handle.complete(result),
        Err(DeferralError::Cancelled) => handle.cancel(result),
        Err(e) => {
            tracing::warn!(correlation_id = %handle.correlation_id(), error = %e, "Deferral run failed");
            handle.fail(e)
        }
    };
    if !settled {
        tracing::debug!(correlation_id = %handle.correlation_id(), "Handle already settled");
    }
}
