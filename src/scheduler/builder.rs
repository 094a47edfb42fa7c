//! Scheduler builder - the composition root.
//!
//! Anything not supplied is resolved to the real-time default: `TokioDelay`,
//! `ThreadRandom`, `SystemClock`, and a `DefaultStrategyFactory` built from the
//! configured tuning.

use std::sync::Arc;

use super::Scheduler;
use crate::config::EngineConfig;
use crate::coordination::SafetyPolicy;
use crate::middleware::{Middleware, Pipeline};
use crate::observer::{Observer, ObserverSet};
use crate::pacing::{DelayPolicy, ExcuseSource, RandomSource, SystemClock, ThreadRandom, TimeSource, TokioDelay};
use crate::strategy::{DefaultStrategyFactory, StrategyFactory, StrategyTuning};

#[derive(Default)]
pub struct SchedulerBuilder {
    factory: Option<Arc<dyn StrategyFactory>>,
    tuning: StrategyTuning,
    pipeline: Pipeline,
    observers: ObserverSet,
    excuses: Option<Arc<dyn ExcuseSource>>,
    delay: Option<Arc<dyn DelayPolicy>>,
    random: Option<Arc<dyn RandomSource>>,
    clock: Option<Arc<dyn TimeSource>>,
    default_safety: Option<SafetyPolicy>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from loaded configuration: strategy tuning and the default safety cap.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tuning: config.strategy_tuning(),
            default_safety: Some(config.safety_policy()),
            ..Self::default()
        }
    }

    /// Replace the built-in factory. Tuning is ignored when a factory is supplied.
    pub fn with_factory(mut self, factory: Arc<dyn StrategyFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn with_tuning(mut self, tuning: StrategyTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Append a middleware layer; earlier layers wrap later ones.
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.pipeline = self.pipeline.with(middleware);
        self
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers = self.observers.with(observer);
        self
    }

    pub fn with_observers(mut self, observers: ObserverSet) -> Self {
        self.observers = observers;
        self
    }

    pub fn with_excuses(mut self, excuses: Arc<dyn ExcuseSource>) -> Self {
        self.excuses = Some(excuses);
        self
    }

    pub fn with_delay_policy(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Safety cap used when a request carries no explicit one.
    pub fn with_default_safety(mut self, safety: SafetyPolicy) -> Self {
        self.default_safety = Some(safety);
        self
    }

    pub fn build(self) -> Scheduler {
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(DefaultStrategyFactory::new(self.tuning)));
        let delay = self.delay.unwrap_or_else(|| Arc::new(TokioDelay));
        tracing::debug!(
            delay = delay.name(),
            middleware = ?self.pipeline.names(),
            observers = self.observers.len(),
            "Scheduler built"
        );
        Scheduler {
            factory,
            pipeline: self.pipeline,
            observers: self.observers,
            excuses: self.excuses,
            delay,
            random: self.random.unwrap_or_else(|| Arc::new(ThreadRandom)),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            default_safety: self.default_safety,
        }
    }
}
