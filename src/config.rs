use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc, Weekday};

use crate::coordination::{DEFAULT_MAX_CYCLES, SafetyPolicy};
use crate::error::DeferralError;
use crate::pacing::{CannedExcuses, ExcuseSource};
use crate::strategy::{EscalationTuning, Gate, StrategyTuning, ThresholdTuning};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: Option<String>,
    pub safety: SafetyConfig,
    pub immediate: ImmediateConfig,
    pub perpetual: PerpetualConfig,
    pub threshold: ThresholdConfig,
    pub excuses: ExcusesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub max_cycles: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmediateConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub ceiling_ms: u64,
    pub jitter: f64,
}

impl Default for ImmediateConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 50,
            multiplier: 2.0,
            ceiling_ms: 1000,
            jitter: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerpetualConfig {
    pub interval_ms: u64,
}

impl Default for PerpetualConfig {
    fn default() -> Self {
        Self { interval_ms: 250 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub poll_interval_ms: u64,
    pub jitter: f64,
    pub max_elapsed_ms: u64,
    pub gate: GateConfig,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            jitter: 0.1,
            max_elapsed_ms: 5000,
            gate: GateConfig::default(),
        }
    }
}

/// Clock condition that releases threshold-gated work (times are UTC).
///
/// ```yaml
/// threshold:
///   gate:
///     kind: hour-window
///     start: 9
///     end: 17
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum GateConfig {
    #[default]
    Never,
    Deadline {
        at: DateTime<Utc>,
    },
    Weekdays {
        days: Vec<Weekday>,
    },
    HourWindow {
        start: u32,
        end: u32,
    },
}

impl GateConfig {
    pub fn to_gate(&self) -> Gate {
        match self {
            GateConfig::Never => Gate::Never,
            GateConfig::Deadline { at } => Gate::Deadline(*at),
            GateConfig::Weekdays { days } => Gate::Weekdays(days.clone()),
            GateConfig::HourWindow { start, end } => Gate::HourWindow {
                start: *start,
                end: *end,
            },
        }
    }
}

/// Excuse text fetched once per cycle. Empty `list` means the built-in set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcusesConfig {
    pub enabled: bool,
    pub list: Vec<String>,
}

impl Default for ExcusesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            list: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            safety: SafetyConfig::default(),
            immediate: ImmediateConfig::default(),
            perpetual: PerpetualConfig::default(),
            threshold: ThresholdConfig::default(),
            excuses: ExcusesConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values no strategy can run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.safety.max_cycles == 0 {
            return Err(DeferralError::Configuration(
                "safety.max_cycles must be positive".to_string(),
            ));
        }
        let tuning = self.strategy_tuning();
        tuning.escalation.validate()?;
        if tuning.perpetual_interval.is_zero() {
            return Err(DeferralError::Configuration(
                "perpetual.interval_ms must be positive".to_string(),
            ));
        }
        tuning.threshold.validate()?;
        tuning.gate.validate()?;
        if let GateConfig::Weekdays { days } = &self.threshold.gate
            && days.is_empty()
        {
            return Err(DeferralError::Configuration(
                "threshold.gate.days must name at least one day".to_string(),
            ));
        }
        if self.excuses.list.iter().any(|e| e.trim().is_empty()) {
            return Err(DeferralError::Configuration(
                "excuses.list must not contain blank entries".to_string(),
            ));
        }
        Ok(())
    }

    pub fn safety_policy(&self) -> SafetyPolicy {
        SafetyPolicy::new(self.safety.max_cycles)
    }

    pub fn strategy_tuning(&self) -> StrategyTuning {
        StrategyTuning {
            escalation: EscalationTuning {
                initial_delay: Duration::from_millis(self.immediate.initial_delay_ms),
                multiplier: self.immediate.multiplier,
                ceiling: Duration::from_millis(self.immediate.ceiling_ms),
                jitter: self.immediate.jitter,
            },
            perpetual_interval: Duration::from_millis(self.perpetual.interval_ms),
            threshold: ThresholdTuning {
                poll_interval: Duration::from_millis(self.threshold.poll_interval_ms),
                jitter: self.threshold.jitter,
                max_elapsed: Duration::from_millis(self.threshold.max_elapsed_ms),
            },
            gate: self.threshold.gate.to_gate(),
        }
    }

    /// Excuse source for the scheduler, or `None` when excuses are disabled.
    pub fn excuse_source(&self) -> crate::error::Result<Option<Arc<dyn ExcuseSource>>> {
        if !self.excuses.enabled {
            return Ok(None);
        }
        let source: Arc<dyn ExcuseSource> = if self.excuses.list.is_empty() {
            Arc::new(CannedExcuses::default())
        } else {
            Arc::new(CannedExcuses::new(self.excuses.list.clone())?)
        };
        Ok(Some(source))
    }
}
