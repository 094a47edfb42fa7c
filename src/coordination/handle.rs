//! Completion handle - the caller's side of an in-flight run.
//!
//! The caller flips two one-way latches (force-now, abandon); the run polls
//! them cooperatively, advances the live progress counters, and settles the
//! completion signal exactly once. Latches are plain atomics so the polling
//! path never takes a lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tokio::sync::watch;

use crate::domain::{DeferralMode, DeferralResult, HandleStatus, LiveProgress, ProgressSnapshot};
use crate::error::{DeferralError, Result};

type Settled = Option<Result<DeferralResult>>;

struct HandleInner {
    mode: DeferralMode,
    correlation_id: String,
    trigger_requested: AtomicBool,
    abandon_requested: AtomicBool,
    status: AtomicU8,
    progress: LiveProgress,
    completion: watch::Sender<Settled>,
}

/// Shared, cloneable handle to one scheduled run.
#[derive(Clone)]
pub struct CompletionHandle {
    inner: Arc<HandleInner>,
}

impl CompletionHandle {
    pub fn new(mode: DeferralMode, correlation_id: impl Into<String>) -> Self {
        let (completion, _) = watch::channel(None);
        Self {
            inner: Arc::new(HandleInner {
                mode,
                correlation_id: correlation_id.into(),
                trigger_requested: AtomicBool::new(false),
                abandon_requested: AtomicBool::new(false),
                status: AtomicU8::new(HandleStatus::Pending.as_u8()),
                progress: LiveProgress::new(),
                completion,
            }),
        }
    }

    pub fn mode(&self) -> DeferralMode {
        self.inner.mode
    }

    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    /// Ask the run to execute the work at its next check.
    ///
    /// Returns true only for the call that actually set the latch.
    pub fn trigger_now(&self) -> bool {
        self.inner
            .trigger_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Ask the run to give up without executing. Idempotent.
    pub fn abandon(&self) {
        self.inner.abandon_requested.store(true, Ordering::Release);
    }

    pub fn trigger_requested(&self) -> bool {
        self.inner.trigger_requested.load(Ordering::Acquire)
    }

    pub fn abandon_requested(&self) -> bool {
        self.inner.abandon_requested.load(Ordering::Acquire)
    }

    pub fn status(&self) -> HandleStatus {
        HandleStatus::from_u8(self.inner.status.load(Ordering::Acquire))
    }

    /// Live cycle and excuse counts of the run.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.progress.snapshot()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.completion.borrow().is_some()
    }

    /// The outcome, if the run has settled.
    pub fn try_result(&self) -> Option<Result<DeferralResult>> {
        self.inner.completion.borrow().clone()
    }

    /// Wait for the run to settle. Every clone sees the same outcome.
    pub async fn completion(&self) -> Result<DeferralResult> {
        let mut rx = self.inner.completion.subscribe();
        let settled = rx
            .wait_for(|slot| slot.is_some())
            .await
            .map_err(|_| DeferralError::Aborted("completion signal dropped".to_string()))?;
        match &*settled {
            Some(outcome) => outcome.clone(),
            None => Err(DeferralError::Aborted("completion signal empty".to_string())),
        }
    }

    pub(crate) fn live_progress(&self) -> &LiveProgress {
        &self.inner.progress
    }

    /// Move to a non-terminal status; ignored once settled.
    pub(crate) fn set_status(&self, status: HandleStatus) {
        if self.is_settled() {
            return;
        }
        self.inner.status.store(status.as_u8(), Ordering::Release);
    }

    /// Fulfill with a finished result. No-op (returns false) if already settled.
    pub(crate) fn complete(&self, result: DeferralResult) -> bool {
        let status = if result.executed {
            HandleStatus::Executed
        } else {
            HandleStatus::Completed
        };
        self.settle(Ok(result), status)
    }

    /// Fulfill after cancellation with an executed=false result.
    pub(crate) fn cancel(&self, mut result: DeferralResult) -> bool {
        result.executed = false;
        result.productivity_index = 0.0;
        self.settle(Ok(result), HandleStatus::Cancelled)
    }

    /// Fail the completion future.
    pub(crate) fn fail(&self, error: DeferralError) -> bool {
        self.settle(Err(error), HandleStatus::Faulted)
    }

    fn settle(&self, outcome: Result<DeferralResult>, status: HandleStatus) -> bool {
        self.inner.completion.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            self.inner.status.store(status.as_u8(), Ordering::Release);
            *slot = Some(outcome);
            true
        })
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("mode", &self.inner.mode)
            .field("correlation_id", &self.inner.correlation_id)
            .field("status", &self.status())
            .field("trigger_requested", &self.trigger_requested())
            .field("abandon_requested", &self.abandon_requested())
            .finish()
    }
}
