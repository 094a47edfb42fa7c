//! Predicate-selected strategy: choose one of two delegates up front.
//!
//! The predicate is evaluated exactly once per run. The chosen delegate runs
//! nested under this strategy's handle, observers, correlation id and safety
//! cap; its counters and flags are folded into this run's result. A delegate
//! that reports no result leaves the run not executed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Weekday};
use tracing::Instrument;

use super::{RunBinding, Strategy, StrategyBase, Work};
use crate::coordination::SafetyPolicy;
use crate::domain::{DeferralMode, DeferralResult};
use crate::error::Result;
use crate::pacing::Pacing;

/// Selection predicate. Sees the run's pacing (clock, random source, hint).
pub type Predicate = Arc<dyn Fn(&Pacing) -> bool + Send + Sync>;

/// True on Saturday and Sunday according to the pacing clock.
pub fn is_weekend() -> Predicate {
    Arc::new(|pacing: &Pacing| matches!(pacing.clock.now().weekday(), Weekday::Sat | Weekday::Sun))
}

pub struct PredicateSelected {
    base: StrategyBase,
    predicate: Predicate,
    when_true: Box<dyn Strategy>,
    when_false: Box<dyn Strategy>,
    last_choice: Option<bool>,
}

impl PredicateSelected {
    pub fn new(predicate: Predicate, when_true: Box<dyn Strategy>, when_false: Box<dyn Strategy>) -> Self {
        Self {
            base: StrategyBase::new(DeferralMode::PredicateSelected),
            predicate,
            when_true,
            when_false,
            last_choice: None,
        }
    }

    /// Predicate outcome of the most recent run.
    pub fn last_choice(&self) -> Option<bool> {
        self.last_choice
    }

    async fn delegate(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let choice = (self.predicate)(pacing);
        self.last_choice = Some(choice);

        let binding = self.base.nested_binding(SafetyPolicy::new(self.base.remaining_cycles()));
        let chosen = if choice {
            &mut self.when_true
        } else {
            &mut self.when_false
        };
        tracing::debug!(choice, delegate = %chosen.mode(), "Predicate evaluated");
        chosen.bind(binding);

        let outcome = chosen.execute(work, pacing).await;
        if let Some(result) = chosen.last_result() {
            self.base.absorb(&result);
            if result.executed {
                self.base.mark_executed();
            }
        }
        outcome
    }
}

#[async_trait]
impl Strategy for PredicateSelected {
    fn mode(&self) -> DeferralMode {
        DeferralMode::PredicateSelected
    }

    fn bind(&mut self, binding: RunBinding) {
        self.base.bind(binding);
    }

    async fn execute(&mut self, work: Work, pacing: &Pacing) -> Result<()> {
        let span = self.base.begin(pacing);
        let outcome = self.delegate(work, pacing).instrument(span).await;
        self.base.finish(pacing, outcome)
    }

    fn last_result(&self) -> Option<DeferralResult> {
        self.base.last_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use crate::coordination::CompletionHandle;
    use crate::observer::{LifecycleKind, ObserverSet, RecordingObserver};
    use crate::pacing::{InstantDelay, ManualClock};
    use crate::strategy::{EscalationTuning, ImmediateEscalating, PerpetualDefer, unit_of_work};

    fn counting_work(counter: Arc<AtomicU32>) -> Work {
        unit_of_work(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn immediate() -> Box<dyn Strategy> {
        Box::new(
            ImmediateEscalating::new(EscalationTuning {
                initial_delay: Duration::from_millis(100),
                multiplier: 2.0,
                ceiling: Duration::from_millis(400),
                jitter: 0.0,
            })
            .unwrap(),
        )
    }

    struct Silent;

    #[async_trait]
    impl Strategy for Silent {
        fn mode(&self) -> DeferralMode {
            DeferralMode::ImmediateEscalating
        }

        async fn execute(&mut self, work: Work, _pacing: &Pacing) -> Result<()> {
            (work)().await
        }
    }

    #[tokio::test]
    async fn test_predicate_evaluated_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let predicate: Predicate = Arc::new(move |_: &Pacing| {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });
        let mut strategy = PredicateSelected::new(predicate, immediate(), Box::new(PerpetualDefer::default()));
        let pacing = Pacing::new().with_delay_policy(Arc::new(InstantDelay));
        strategy.execute(counting_work(Arc::new(AtomicU32::new(0))), &pacing).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(strategy.last_choice(), Some(true));
        let result = strategy.last_result().unwrap();
        assert!(result.executed);
        assert_eq!(result.cycles, 2);
        assert_eq!(result.mode, DeferralMode::PredicateSelected);
    }

    #[tokio::test]
    async fn test_false_branch_runs_other_delegate() {
        let handle = CompletionHandle::new(DeferralMode::PredicateSelected, "run-pred");
        handle.trigger_now();
        let recorder = Arc::new(RecordingObserver::new());
        let counter = Arc::new(AtomicU32::new(0));
        let mut strategy =
            PredicateSelected::new(Arc::new(|_: &Pacing| false), immediate(), Box::new(PerpetualDefer::default()));
        strategy.bind(
            RunBinding::new()
                .with_handle(handle)
                .with_correlation_id("run-pred")
                .with_observers(ObserverSet::new().with(recorder.clone())),
        );
        let pacing = Pacing::new().with_delay_policy(Arc::new(InstantDelay));
        strategy.execute(counting_work(counter.clone()), &pacing).await.unwrap();

        assert_eq!(strategy.last_choice(), Some(false));
        let result = strategy.last_result().unwrap();
        assert!(result.executed);
        assert!(result.triggered);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.count(LifecycleKind::Executed), 1);
        assert!(recorder.events().iter().all(|e| e.correlation_id == "run-pred"));
    }

    #[tokio::test]
    async fn test_non_reporting_delegate_is_not_executed() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut strategy = PredicateSelected::new(Arc::new(|_: &Pacing| true), Box::new(Silent), Box::new(Silent));
        let pacing = Pacing::new().with_delay_policy(Arc::new(InstantDelay));
        strategy.execute(counting_work(counter.clone()), &pacing).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!strategy.last_result().unwrap().executed);
    }

    #[test]
    fn test_is_weekend() {
        let saturday = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let predicate = is_weekend();
        assert!(predicate(&Pacing::new().with_clock(Arc::new(ManualClock::new(saturday)))));
        assert!(!predicate(&Pacing::new().with_clock(Arc::new(ManualClock::new(monday)))));
    }
}
