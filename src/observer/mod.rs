//! Lifecycle observation
//!
//! Observers are ad hoc listeners attached per run. Every hook has a no-op
//! default so an implementation only overrides what it cares about. The
//! `ObserverSet` fans each event out and isolates every call: an observer that
//! returns an error or panics is logged and skipped, and the rest still see
//! the event.

pub mod diagnostics;
pub mod event;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

pub use event::{LifecycleEvent, LifecycleKind};

use crate::error::Result;

/// Lifecycle listener with five optional hooks.
pub trait Observer: Send + Sync {
    fn on_cycle(&self, _event: &LifecycleEvent) -> Result<()> {
        Ok(())
    }

    fn on_excuse(&self, _event: &LifecycleEvent) -> Result<()> {
        Ok(())
    }

    fn on_triggered(&self, _event: &LifecycleEvent) -> Result<()> {
        Ok(())
    }

    fn on_abandoned(&self, _event: &LifecycleEvent) -> Result<()> {
        Ok(())
    }

    fn on_executed(&self, _event: &LifecycleEvent) -> Result<()> {
        Ok(())
    }

    /// Name used when reporting a misbehaving observer
    fn name(&self) -> &str {
        "observer"
    }
}

fn dispatch(observer: &dyn Observer, event: &LifecycleEvent) -> Result<()> {
    match event.kind {
        LifecycleKind::Cycle => observer.on_cycle(event),
        LifecycleKind::Excuse => observer.on_excuse(event),
        LifecycleKind::Triggered => observer.on_triggered(event),
        LifecycleKind::Abandoned => observer.on_abandoned(event),
        LifecycleKind::Executed => observer.on_executed(event),
    }
}

/// Ordered fan-out list of observers.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer (builder pattern)
    pub fn with(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    /// Add a shared observer
    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver an event to every observer, in registration order.
    pub fn publish(&self, event: &LifecycleEvent) {
        for observer in &self.observers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| dispatch(observer.as_ref(), event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    observer = observer.name(),
                    kind = ?event.kind,
                    correlation_id = %event.correlation_id,
                    error = %e,
                    "Observer failed"
                ),
                Err(_) => tracing::warn!(
                    observer = observer.name(),
                    kind = ?event.kind,
                    correlation_id = %event.correlation_id,
                    "Observer panicked"
                ),
            }
        }
    }
}

/// Logs every lifecycle event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_cycle(&self, event: &LifecycleEvent) -> Result<()> {
        tracing::debug!(correlation_id = %event.correlation_id, mode = %event.mode, cycle = event.cycles, "Deferral cycle");
        Ok(())
    }

    fn on_excuse(&self, event: &LifecycleEvent) -> Result<()> {
        tracing::info!(
            correlation_id = %event.correlation_id,
            excuse = event.excuse.as_deref().unwrap_or(""),
            "Excuse"
        );
        Ok(())
    }

    fn on_triggered(&self, event: &LifecycleEvent) -> Result<()> {
        tracing::info!(correlation_id = %event.correlation_id, cycle = event.cycles, "Forced to run now");
        Ok(())
    }

    fn on_abandoned(&self, event: &LifecycleEvent) -> Result<()> {
        tracing::info!(correlation_id = %event.correlation_id, cycle = event.cycles, "Abandoned");
        Ok(())
    }

    fn on_executed(&self, event: &LifecycleEvent) -> Result<()> {
        tracing::info!(
            correlation_id = %event.correlation_id,
            mode = %event.mode,
            cycles = event.cycles,
            excuses = event.excuses,
            "Work executed"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Keeps every event it sees. Useful for progress displays and tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn kinds(&self) -> Vec<LifecycleKind> {
        self.events().into_iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: LifecycleKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }

    fn record(&self, event: &LifecycleEvent) -> Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

impl Observer for RecordingObserver {
    fn on_cycle(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event)
    }

    fn on_excuse(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event)
    }

    fn on_triggered(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event)
    }

    fn on_abandoned(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event)
    }

    fn on_executed(&self, event: &LifecycleEvent) -> Result<()> {
        self.record(event)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

impl<T: Observer + ?Sized> Observer for Arc<T> {
    fn on_cycle(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).on_cycle(event)
    }

    fn on_excuse(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).on_excuse(event)
    }

    fn on_triggered(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).on_triggered(event)
    }

    fn on_abandoned(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).on_abandoned(event)
    }

    fn on_executed(&self, event: &LifecycleEvent) -> Result<()> {
        (**self).on_executed(event)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeferralMode;
    use crate::error::DeferralError;

    fn event(kind: LifecycleKind) -> LifecycleEvent {
        LifecycleEvent {
            kind,
            correlation_id: "run-obs".to_string(),
            mode: DeferralMode::PerpetualDefer,
            cycles: 2,
            excuses: 1,
            excuse: None,
        }
    }

    struct OnlyCycles;

    impl Observer for OnlyCycles {
        fn on_cycle(&self, _event: &LifecycleEvent) -> Result<()> {
            Ok(())
        }
    }

    struct Failing;

    impl Observer for Failing {
        fn on_cycle(&self, _event: &LifecycleEvent) -> Result<()> {
            Err(DeferralError::Work("observer broke".to_string()))
        }
    }

    struct Panicking;

    impl Observer for Panicking {
        fn on_cycle(&self, _event: &LifecycleEvent) -> Result<()> {
            panic!("observer exploded");
        }
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let observer = OnlyCycles;
        for kind in LifecycleKind::ALL {
            assert!(dispatch(&observer, &event(kind)).is_ok());
        }
        assert_eq!(observer.name(), "observer");
    }

    #[test]
    fn test_recording_observer_records_in_order() {
        let recorder = RecordingObserver::new();
        recorder.on_cycle(&event(LifecycleKind::Cycle)).unwrap();
        recorder.on_excuse(&event(LifecycleKind::Excuse)).unwrap();
        recorder.on_executed(&event(LifecycleKind::Executed)).unwrap();
        assert_eq!(
            recorder.kinds(),
            vec![LifecycleKind::Cycle, LifecycleKind::Excuse, LifecycleKind::Executed]
        );
        assert_eq!(recorder.count(LifecycleKind::Cycle), 1);
    }

    #[test]
    fn test_failing_observers_are_isolated() {
        let recorder = Arc::new(RecordingObserver::new());
        let set = ObserverSet::new()
            .with(Failing)
            .with(Panicking)
            .with(recorder.clone());
        assert_eq!(set.len(), 3);

        set.publish(&event(LifecycleKind::Cycle));
        set.publish(&event(LifecycleKind::Cycle));

        assert_eq!(recorder.count(LifecycleKind::Cycle), 2);
    }

    #[test]
    fn test_empty_set_publish() {
        let set = ObserverSet::new();
        assert!(set.is_empty());
        set.publish(&event(LifecycleKind::Executed));
    }

    #[test]
    fn test_logging_observer_never_fails() {
        let observer = LoggingObserver;
        for kind in LifecycleKind::ALL {
            assert!(dispatch(&observer, &event(kind)).is_ok());
        }
    }
}
