//! Base orchestrator shared by every strategy.
//!
//! A concrete strategy embeds a `StrategyBase` and wraps its own pacing loop
//! between `begin` and `finish`:
//!
//! ```ignore
//! let span = self.base.begin(pacing);
//! let outcome = self.pacing_loop(work, pacing).instrument(span).await;
//! self.base.finish(pacing, outcome)
//! ```
//!
//! `begin` stamps the start, resets counters and resolves the safety cap;
//! `finish` stamps the end, builds the result on every path (success,
//! cancellation, work failure) and only then hands the outcome back. In
//! between, the loop uses the primitives below for bookkeeping and for polling
//! the completion handle.

use tracing::Span;

use super::{RunBinding, Work};
use crate::coordination::{CompletionHandle, SafetyPolicy};
use crate::domain::{DeferralMode, DeferralResult, HandleStatus, RunCounters};
use crate::error::Result;
use crate::id::generate_correlation_id;
use crate::observer::{LifecycleEvent, LifecycleKind, diagnostics};
use crate::pacing::{ExcuseContext, ExcuseSource, Pacing};

/// Per-run bookkeeping and control-surface integration.
pub struct StrategyBase {
    mode: DeferralMode,
    binding: RunBinding,
    counters: RunCounters,
    correlation_id: String,
    effective_safety: SafetyPolicy,
    work_invoked: bool,
    span: Span,
    result: Option<DeferralResult>,
}

impl StrategyBase {
    pub fn new(mode: DeferralMode) -> Self {
        Self {
            mode,
            binding: RunBinding::default(),
            counters: RunCounters::default(),
            correlation_id: String::new(),
            effective_safety: SafetyPolicy::default(),
            work_invoked: false,
            span: Span::none(),
            result: None,
        }
    }

    pub fn mode(&self) -> DeferralMode {
        self.mode
    }

    /// Attach handle, observers, correlation id and safety for the next run.
    pub fn bind(&mut self, binding: RunBinding) {
        self.binding = binding;
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn handle(&self) -> Option<&CompletionHandle> {
        self.binding.handle.as_ref()
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn effective_safety(&self) -> SafetyPolicy {
        self.effective_safety
    }

    /// Result of the most recent finished run.
    pub fn last_result(&self) -> Option<DeferralResult> {
        self.result.clone()
    }

    /// Start a run. Returns the span the pacing loop should run in.
    pub fn begin(&mut self, pacing: &Pacing) -> Span {
        self.counters.reset();
        self.work_invoked = false;
        self.result = None;
        self.counters.started_at = Some(pacing.clock.now());
        self.correlation_id = self
            .binding
            .correlation_id
            .clone()
            .unwrap_or_else(generate_correlation_id);
        self.effective_safety = SafetyPolicy::resolve(self.binding.safety_override, self.binding.injected_safety);

        if let Some(handle) = &self.binding.handle {
            handle.set_status(HandleStatus::Deferring);
        }

        self.span = tracing::info_span!(
            "deferral.run",
            mode = %self.mode,
            correlation_id = %self.correlation_id,
            nested = self.binding.nested,
            max_cycles = self.effective_safety.max_cycles,
            cycles = tracing::field::Empty,
            excuses = tracing::field::Empty,
            executed = tracing::field::Empty,
        );
        self.span.clone()
    }

    /// Finalize the result, then hand back the loop's outcome untouched.
    pub fn finish(&mut self, pacing: &Pacing, outcome: Result<()>) -> Result<()> {
        let ended_at = pacing.clock.now();
        self.counters.ended_at = Some(ended_at);
        let total_deferral = self
            .counters
            .started_at
            .and_then(|started| (ended_at - started).to_std().ok())
            .unwrap_or_default();

        let result = DeferralResult {
            mode: self.mode,
            executed: self.counters.executed,
            total_deferral,
            excuse_count: self.counters.excuses,
            cycles: self.counters.cycles,
            triggered: self.counters.triggered,
            abandoned: self.counters.abandoned,
            correlation_id: self.correlation_id.clone(),
            started_at: self.counters.started_at,
            ended_at: self.counters.ended_at,
            productivity_index: 0.0,
        }
        .with_productivity();

        self.span.record("cycles", result.cycles);
        self.span.record("excuses", result.excuse_count);
        self.span.record("executed", result.executed);
        self.result = Some(result);

        match &outcome {
            Ok(()) => tracing::debug!(
                parent: &self.span,
                executed = self.counters.executed,
                cycles = self.counters.cycles,
                "Run finished"
            ),
            Err(e) if e.is_cancelled() => {
                tracing::debug!(parent: &self.span, cycles = self.counters.cycles, "Run cancelled")
            }
            Err(e) => tracing::warn!(parent: &self.span, error = %e, "Run failed"),
        }

        if self.counters.executed && !self.binding.nested {
            self.notify(LifecycleKind::Executed, None);
        }
        outcome
    }

    /// Count one finished deferral cycle.
    pub fn increment_cycle(&mut self) {
        self.counters.cycles += 1;
        if let Some(handle) = &self.binding.handle {
            handle.live_progress().record_cycle();
        }
        self.notify(LifecycleKind::Cycle, None);
    }

    /// Fetch and publish one excuse. Does nothing without a source.
    pub async fn invoke_excuse(&mut self, source: Option<&dyn ExcuseSource>) {
        let Some(source) = source else {
            return;
        };
        self.counters.excuses += 1;
        if let Some(handle) = &self.binding.handle {
            handle.live_progress().record_excuse();
        }
        let ctx = ExcuseContext {
            mode: self.mode,
            cycle: self.counters.cycles,
            correlation_id: self.correlation_id.clone(),
        };
        let text = source.excuse(&ctx).await;
        self.notify(LifecycleKind::Excuse, Some(text));
    }

    pub fn mark_executed(&mut self) {
        self.counters.executed = true;
    }

    pub fn mark_triggered(&mut self) {
        self.counters.triggered = true;
        if let Some(handle) = &self.binding.handle {
            handle.set_status(HandleStatus::Triggered);
        }
        self.notify(LifecycleKind::Triggered, None);
    }

    pub fn mark_abandoned(&mut self) {
        if self.counters.abandoned {
            return;
        }
        self.counters.abandoned = true;
        if let Some(handle) = &self.binding.handle {
            handle.set_status(HandleStatus::Abandoned);
        }
        self.notify(LifecycleKind::Abandoned, None);
    }

    pub fn mark_threshold_reached(&mut self) {
        if let Some(handle) = &self.binding.handle {
            handle.set_status(HandleStatus::ThresholdReached);
        }
        tracing::debug!(parent: &self.span, cycles = self.counters.cycles, "Threshold reached");
    }

    pub fn safety_cap_reached(&self) -> bool {
        let reached = self.effective_safety.is_reached(self.counters.cycles);
        if reached {
            tracing::debug!(
                parent: &self.span,
                max_cycles = self.effective_safety.max_cycles,
                "Safety cap reached"
            );
        }
        reached
    }

    pub fn remaining_cycles(&self) -> u32 {
        self.effective_safety.remaining(self.counters.cycles)
    }

    /// Honor a pending abandon or force-now request from the attached handle.
    ///
    /// Abandon is checked first and always wins. Returns true when the run
    /// should stop looping.
    pub async fn check_for_external_override(&mut self, work: &Work) -> Result<bool> {
        let Some(handle) = self.binding.handle.clone() else {
            return Ok(false);
        };
        if handle.abandon_requested() {
            self.mark_abandoned();
            return Ok(true);
        }
        if handle.trigger_requested() {
            self.mark_triggered();
            self.execute_work(work).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Run the unit of work at most once per run; never after an abandon.
    ///
    /// Returns whether the work ran (now or earlier in this run).
    pub async fn execute_work(&mut self, work: &Work) -> Result<bool> {
        if self.work_invoked {
            return Ok(self.counters.executed);
        }
        if self.binding.handle.as_ref().is_some_and(|h| h.abandon_requested()) {
            self.mark_abandoned();
            return Ok(false);
        }
        self.work_invoked = true;
        (work)().await?;
        self.mark_executed();
        Ok(true)
    }

    /// Fold a sub-strategy's counters and control flags into this run.
    pub fn absorb(&mut self, result: &DeferralResult) {
        self.counters.cycles += result.cycles;
        self.counters.excuses += result.excuse_count;
        self.counters.triggered |= result.triggered;
        self.counters.abandoned |= result.abandoned;
    }

    /// Binding for a sub-strategy: same handle, observers and correlation id,
    /// nested, capped at `safety`.
    pub fn nested_binding(&self, safety: SafetyPolicy) -> RunBinding {
        RunBinding {
            correlation_id: Some(self.correlation_id.clone()),
            handle: self.binding.handle.clone(),
            observers: self.binding.observers.clone(),
            safety_override: Some(safety),
            injected_safety: self.binding.injected_safety,
            nested: true,
        }
    }

    fn notify(&self, kind: LifecycleKind, excuse: Option<String>) {
        let event = LifecycleEvent {
            kind,
            correlation_id: self.correlation_id.clone(),
            mode: self.mode,
            cycles: self.counters.cycles,
            excuses: self.counters.excuses,
            excuse,
        };
        self.binding.observers.publish(&event);
        diagnostics::record(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::DeferralError;
    use crate::observer::{ObserverSet, RecordingObserver};
    use crate::pacing::{CannedExcuses, InstantDelay};
    use crate::strategy::unit_of_work;

    fn pacing() -> Pacing {
        Pacing::new().with_delay_policy(Arc::new(InstantDelay))
    }

    fn counting_work(counter: Arc<AtomicU32>) -> Work {
        unit_of_work(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[test]
    fn test_begin_resets_and_resolves_safety() {
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(RunBinding::new().with_safety(SafetyPolicy::new(4)).with_correlation_id("run-x"));
        let pacing = pacing();
        base.begin(&pacing);
        base.increment_cycle();
        base.begin(&pacing);
        assert_eq!(base.counters().cycles, 0);
        assert!(base.counters().started_at.is_some());
        assert_eq!(base.effective_safety().max_cycles, 4);
        assert_eq!(base.correlation_id(), "run-x");
    }

    #[test]
    fn test_begin_generates_correlation_id_when_unbound() {
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.begin(&pacing());
        assert!(base.correlation_id().starts_with("run-"));
    }

    #[test]
    fn test_safety_cap() {
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(RunBinding::new().with_safety(SafetyPolicy::new(2)));
        base.begin(&pacing());
        assert!(!base.safety_cap_reached());
        base.increment_cycle();
        assert_eq!(base.remaining_cycles(), 1);
        base.increment_cycle();
        assert!(base.safety_cap_reached());
        assert_eq!(base.remaining_cycles(), 0);
    }

    #[tokio::test]
    async fn test_invoke_excuse_without_source_is_noop() {
        let recorder = Arc::new(RecordingObserver::new());
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(RunBinding::new().with_observers(ObserverSet::new().with(recorder.clone())));
        base.begin(&pacing());
        base.invoke_excuse(None).await;
        assert_eq!(base.counters().excuses, 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_invoke_excuse_counts_mirrors_and_notifies() {
        let recorder = Arc::new(RecordingObserver::new());
        let handle = CompletionHandle::new(DeferralMode::PerpetualDefer, "run-e");
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(
            RunBinding::new()
                .with_handle(handle.clone())
                .with_observers(ObserverSet::new().with(recorder.clone())),
        );
        base.begin(&pacing());
        let excuses = CannedExcuses::default();
        base.increment_cycle();
        base.invoke_excuse(Some(&excuses as &dyn ExcuseSource)).await;

        assert_eq!(base.counters().excuses, 1);
        assert_eq!(handle.progress().excuses, 1);
        assert_eq!(handle.progress().cycles, 1);
        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, LifecycleKind::Excuse);
        assert!(events[1].excuse.is_some());
    }

    #[tokio::test]
    async fn test_execute_work_runs_at_most_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let work = counting_work(counter.clone());
        let mut base = StrategyBase::new(DeferralMode::ImmediateEscalating);
        base.begin(&pacing());
        assert!(base.execute_work(&work).await.unwrap());
        assert!(base.execute_work(&work).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(base.counters().executed);
    }

    #[tokio::test]
    async fn test_execute_work_refuses_after_abandon() {
        let counter = Arc::new(AtomicU32::new(0));
        let work = counting_work(counter.clone());
        let handle = CompletionHandle::new(DeferralMode::ImmediateEscalating, "run-a");
        handle.abandon();
        let mut base = StrategyBase::new(DeferralMode::ImmediateEscalating);
        base.bind(RunBinding::new().with_handle(handle.clone()));
        base.begin(&pacing());
        assert!(!base.execute_work(&work).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(base.counters().abandoned);
        assert_eq!(handle.status(), HandleStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_override_without_handle() {
        let work = counting_work(Arc::new(AtomicU32::new(0)));
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.begin(&pacing());
        assert!(!base.check_for_external_override(&work).await.unwrap());
    }

    #[tokio::test]
    async fn test_override_trigger_executes() {
        let counter = Arc::new(AtomicU32::new(0));
        let work = counting_work(counter.clone());
        let handle = CompletionHandle::new(DeferralMode::PerpetualDefer, "run-t");
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(RunBinding::new().with_handle(handle.clone()));
        base.begin(&pacing());

        assert!(!base.check_for_external_override(&work).await.unwrap());
        assert!(handle.trigger_now());
        assert!(base.check_for_external_override(&work).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(base.counters().triggered);
        assert!(base.counters().executed);
    }

    #[tokio::test]
    async fn test_override_abandon_beats_trigger() {
        let counter = Arc::new(AtomicU32::new(0));
        let work = counting_work(counter.clone());
        let handle = CompletionHandle::new(DeferralMode::PerpetualDefer, "run-p");
        handle.trigger_now();
        handle.abandon();
        let mut base = StrategyBase::new(DeferralMode::PerpetualDefer);
        base.bind(RunBinding::new().with_handle(handle));
        base.begin(&pacing());

        assert!(base.check_for_external_override(&work).await.unwrap());
        assert!(base.counters().abandoned);
        assert!(!base.counters().triggered);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_finish_builds_result_on_failure() {
        let failing: Work = unit_of_work(|| async { Err(DeferralError::Work("boom".to_string())) });
        let mut base = StrategyBase::new(DeferralMode::ImmediateEscalating);
        let pacing = pacing();
        base.begin(&pacing);
        base.increment_cycle();
        let outcome = base.execute_work(&failing).await.map(|_| ());
        let outcome = base.finish(&pacing, outcome);

        assert_eq!(outcome.unwrap_err(), DeferralError::Work("boom".to_string()));
        let result = base.last_result().unwrap();
        assert!(!result.executed);
        assert_eq!(result.cycles, 1);
        assert_eq!(result.productivity_index, 0.0);
    }

    #[tokio::test]
    async fn test_finish_notifies_executed_last_unless_nested() {
        let recorder = Arc::new(RecordingObserver::new());
        let work = counting_work(Arc::new(AtomicU32::new(0)));
        let pacing = pacing();

        let mut base = StrategyBase::new(DeferralMode::ImmediateEscalating);
        base.bind(RunBinding::new().with_observers(ObserverSet::new().with(recorder.clone())));
        base.begin(&pacing);
        base.increment_cycle();
        base.execute_work(&work).await.unwrap();
        base.finish(&pacing, Ok(())).unwrap();
        assert_eq!(
            recorder.kinds(),
            vec![LifecycleKind::Cycle, LifecycleKind::Executed]
        );

        let nested_recorder = Arc::new(RecordingObserver::new());
        let mut nested = StrategyBase::new(DeferralMode::ImmediateEscalating);
        nested.bind(
            RunBinding::new()
                .with_observers(ObserverSet::new().with(nested_recorder.clone()))
                .nested(),
        );
        nested.begin(&pacing);
        nested.execute_work(&work).await.unwrap();
        nested.finish(&pacing, Ok(())).unwrap();
        assert_eq!(nested_recorder.count(LifecycleKind::Executed), 0);
        assert!(nested.last_result().unwrap().executed);
    }

    #[test]
    fn test_absorb_sums_counters() {
        let mut base = StrategyBase::new(DeferralMode::SequentialComposite);
        base.begin(&pacing());
        let mut phase = DeferralResult::new(DeferralMode::PerpetualDefer, "x");
        phase.cycles = 3;
        phase.excuse_count = 2;
        phase.triggered = true;
        base.absorb(&phase);
        base.absorb(&phase);
        assert_eq!(base.counters().cycles, 6);
        assert_eq!(base.counters().excuses, 4);
        assert!(base.counters().triggered);
        assert!(!base.counters().abandoned);
    }

    #[test]
    fn test_nested_binding_shares_correlation() {
        let mut base = StrategyBase::new(DeferralMode::SequentialComposite);
        base.bind(RunBinding::new().with_correlation_id("run-parent"));
        base.begin(&pacing());
        let binding = base.nested_binding(SafetyPolicy::new(9));
        assert_eq!(binding.correlation_id.as_deref(), Some("run-parent"));
        assert!(binding.nested);
        assert_eq!(binding.safety_override, Some(SafetyPolicy::new(9)));
    }
}
