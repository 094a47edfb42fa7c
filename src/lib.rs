//! Deferral - a deferred-execution orchestration engine
//!
//! Given a unit of work, drive it through a pluggable pacing strategy before
//! (maybe) running it, with force-now and abandon controls, lifecycle
//! observers, a middleware pipeline and a runaway safety cap.

pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod id;
pub mod middleware;
pub mod observer;
pub mod pacing;
pub mod scheduler;
pub mod strategy;

pub use coordination::{CompletionHandle, DEFAULT_MAX_CYCLES, SafetyPolicy};
pub use domain::{DeferralMode, DeferralResult, HandleStatus, ProgressSnapshot};
pub use error::{DeferralError, Result};
pub use middleware::{DeferralContext, Middleware, Next, Pipeline, TimingMiddleware, TracingMiddleware};
pub use observer::{LifecycleEvent, LifecycleKind, LoggingObserver, Observer, ObserverSet, RecordingObserver};
pub use pacing::{
    CannedExcuses, DelayPolicy, ExcuseSource, InstantDelay, ManualClock, Pacing, RandomSource, SeededRandom,
    SystemClock, ThreadRandom, TimeSource, TokioDelay,
};
pub use scheduler::{ScheduleRequest, Scheduler, SchedulerBuilder, StrategyKey};
pub use strategy::{
    DefaultStrategyFactory, RunBinding, Strategy, StrategyFactory, Work, noop_work, unit_of_work,
};
