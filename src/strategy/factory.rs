//! Strategy factory
//!
//! Builds a fresh strategy per run, either by mode or by a registered name.
//! Registered builders are checked before mode names so a deployment can
//! publish its own composites under friendly keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::perpetual::DEFAULT_INTERVAL;
use super::{
    EscalationTuning, Gate, ImmediateEscalating, PerpetualDefer, PredicateSelected, SequentialComposite, Strategy,
    ThresholdGated, ThresholdTuning, is_weekend,
};
use crate::domain::DeferralMode;
use crate::error::{DeferralError, Result};

/// Builds one strategy instance.
pub type StrategyBuilder = Arc<dyn Fn() -> Result<Box<dyn Strategy>> + Send + Sync>;

/// Source of strategy instances for the scheduler.
pub trait StrategyFactory: Send + Sync {
    fn create(&self, mode: DeferralMode) -> Result<Box<dyn Strategy>>;

    /// Build by a free-form key. Defaults to parsing the key as a mode name.
    fn create_named(&self, key: &str) -> Result<Box<dyn Strategy>> {
        let mode: DeferralMode = key.parse()?;
        self.create(mode)
    }
}

/// Parameters for the built-in variants.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTuning {
    pub escalation: EscalationTuning,
    pub perpetual_interval: Duration,
    pub threshold: ThresholdTuning,
    /// Gate used by every threshold strategy the factory builds, composites included
    pub gate: Gate,
}

impl Default for StrategyTuning {
    fn default() -> Self {
        Self {
            escalation: EscalationTuning::default(),
            perpetual_interval: DEFAULT_INTERVAL,
            threshold: ThresholdTuning::default(),
            gate: Gate::Never,
        }
    }
}

/// Built-in variants plus a registry of named builders.
///
/// Composites are assembled from the same tuning:
/// - sequential: immediate escalation rehearsal, then a threshold gate
/// - predicate: threshold gate on weekends, immediate escalation otherwise
#[derive(Clone, Default)]
pub struct DefaultStrategyFactory {
    tuning: StrategyTuning,
    registry: HashMap<String, StrategyBuilder>,
}

impl DefaultStrategyFactory {
    pub fn new(tuning: StrategyTuning) -> Self {
        Self {
            tuning,
            registry: HashMap::new(),
        }
    }

    pub fn tuning(&self) -> &StrategyTuning {
        &self.tuning
    }

    /// Publish a builder under `key`.
    ///
    /// Keys are trimmed. Empty keys, duplicates, and keys that would shadow a
    /// built-in mode name are rejected.
    pub fn register(&mut self, key: &str, builder: StrategyBuilder) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(DeferralError::Configuration("strategy key must not be empty".to_string()));
        }
        if key.parse::<DeferralMode>().is_ok() {
            return Err(DeferralError::Configuration(format!(
                "strategy key '{key}' shadows a built-in mode"
            )));
        }
        if self.registry.contains_key(key) {
            return Err(DeferralError::Configuration(format!(
                "strategy key '{key}' is already registered"
            )));
        }
        tracing::debug!(key, "Registered strategy builder");
        self.registry.insert(key.to_string(), builder);
        Ok(())
    }

    /// Register a builder (builder pattern)
    pub fn with_registered(mut self, key: &str, builder: StrategyBuilder) -> Result<Self> {
        self.register(key, builder)?;
        Ok(self)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn immediate(&self) -> Result<Box<dyn Strategy>> {
        Ok(Box::new(ImmediateEscalating::new(self.tuning.escalation.clone())?))
    }

    fn threshold(&self) -> Result<Box<dyn Strategy>> {
        Ok(Box::new(ThresholdGated::new(self.tuning.gate.clone(), self.tuning.threshold.clone())?))
    }
}

impl StrategyFactory for DefaultStrategyFactory {
    fn create(&self, mode: DeferralMode) -> Result<Box<dyn Strategy>> {
        let strategy: Box<dyn Strategy> = match mode {
            DeferralMode::ImmediateEscalating => self.immediate()?,
            DeferralMode::PerpetualDefer => Box::new(PerpetualDefer::new(self.tuning.perpetual_interval)?),
            DeferralMode::ThresholdGated => self.threshold()?,
            DeferralMode::SequentialComposite => {
                Box::new(SequentialComposite::new(vec![self.immediate()?, self.threshold()?])?)
            }
            DeferralMode::PredicateSelected => {
                Box::new(PredicateSelected::new(is_weekend(), self.threshold()?, self.immediate()?))
            }
        };
        Ok(strategy)
    }

    fn create_named(&self, key: &str) -> Result<Box<dyn Strategy>> {
        if let Some(builder) = self.registry.get(key.trim()) {
            return builder();
        }
        let mode: DeferralMode = key.parse()?;
        self.create(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc, Weekday};

    use crate::pacing::{InstantDelay, ManualClock, Pacing};
    use crate::strategy::noop_work;

    #[test]
    fn test_creates_every_mode() {
        let factory = DefaultStrategyFactory::default();
        for mode in DeferralMode::ALL {
            let strategy = factory.create(mode).unwrap();
            assert_eq!(strategy.mode(), mode);
        }
    }

    #[test]
    fn test_create_named_parses_modes() {
        let factory = DefaultStrategyFactory::default();
        assert_eq!(
            factory.create_named("perpetual-defer").unwrap().mode(),
            DeferralMode::PerpetualDefer
        );
        let err = factory.create_named("procrastinate-harder").err().unwrap();
        assert!(matches!(err, DeferralError::UnknownStrategy(_)));
    }

    #[test]
    fn test_registry_lookup_first() {
        let builder: StrategyBuilder = Arc::new(|| -> Result<Box<dyn Strategy>> {
            Ok(Box::new(PerpetualDefer::new(Duration::from_millis(1))?))
        });
        let factory = DefaultStrategyFactory::default()
            .with_registered("slow-burn", builder)
            .unwrap();
        assert_eq!(factory.keys(), vec!["slow-burn".to_string()]);
        assert_eq!(
            factory.create_named(" slow-burn ").unwrap().mode(),
            DeferralMode::PerpetualDefer
        );
    }

    #[test]
    fn test_register_rejects_bad_keys() {
        let builder: StrategyBuilder = Arc::new(|| -> Result<Box<dyn Strategy>> { Ok(Box::new(PerpetualDefer::default())) });
        let mut factory = DefaultStrategyFactory::default();
        assert!(factory.register("  ", builder.clone()).is_err());
        assert!(factory.register("threshold-gated", builder.clone()).is_err());
        factory.register("custom", builder.clone()).unwrap();
        assert!(factory.register("custom", builder).is_err());
    }

    #[test]
    fn test_invalid_tuning_surfaces_on_create() {
        let mut tuning = StrategyTuning::default();
        tuning.perpetual_interval = Duration::ZERO;
        let factory = DefaultStrategyFactory::new(tuning);
        assert!(factory.create(DeferralMode::PerpetualDefer).is_err());
        assert!(factory.create(DeferralMode::ImmediateEscalating).is_ok());

        let mut tuning = StrategyTuning::default();
        tuning.gate = Gate::HourWindow { start: 30, end: 2 };
        let factory = DefaultStrategyFactory::new(tuning);
        assert!(factory.create(DeferralMode::ThresholdGated).is_err());
        assert!(factory.create(DeferralMode::SequentialComposite).is_err());
    }

    #[tokio::test]
    async fn test_configured_gate_releases_on_first_check() {
        let mut tuning = StrategyTuning::default();
        tuning.gate = Gate::Weekdays(vec![Weekday::Mon]);
        let factory = DefaultStrategyFactory::new(tuning);
        let monday = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let pacing = Pacing::new()
            .with_delay_policy(Arc::new(InstantDelay))
            .with_clock(Arc::new(ManualClock::new(monday)));

        let mut strategy = factory.create(DeferralMode::ThresholdGated).unwrap();
        strategy.execute(noop_work(), &pacing).await.unwrap();

        let result = strategy.last_result().unwrap();
        assert!(result.executed);
        assert_eq!(result.cycles, 0);
    }
}
