//! Deferral mode - which pacing strategy drives a run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeferralError;

/// The pacing strategy family a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeferralMode {
    /// Delay grows multiplicatively until a ceiling, then the work runs
    ImmediateEscalating,
    /// Fixed-interval delays forever; runs only when forced
    PerpetualDefer,
    /// Runs once a clock gate opens or an elapsed ceiling is hit
    ThresholdGated,
    /// Ordered phases; only the last one gets the real work
    SequentialComposite,
    /// Picks one of two strategies up front
    PredicateSelected,
}

impl DeferralMode {
    /// All modes, in declaration order.
    pub const ALL: [DeferralMode; 5] = [
        DeferralMode::ImmediateEscalating,
        DeferralMode::PerpetualDefer,
        DeferralMode::ThresholdGated,
        DeferralMode::SequentialComposite,
        DeferralMode::PredicateSelected,
    ];

    /// Canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferralMode::ImmediateEscalating => "immediate-escalating",
            DeferralMode::PerpetualDefer => "perpetual-defer",
            DeferralMode::ThresholdGated => "threshold-gated",
            DeferralMode::SequentialComposite => "sequential-composite",
            DeferralMode::PredicateSelected => "predicate-selected",
        }
    }

    /// Short alias accepted on the command line.
    pub fn alias(&self) -> &'static str {
        match self {
            DeferralMode::ImmediateEscalating => "immediate",
            DeferralMode::PerpetualDefer => "perpetual",
            DeferralMode::ThresholdGated => "threshold",
            DeferralMode::SequentialComposite => "sequential",
            DeferralMode::PredicateSelected => "predicate",
        }
    }

    /// Whether this mode is built out of other strategies.
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            DeferralMode::SequentialComposite | DeferralMode::PredicateSelected
        )
    }
}

impl fmt::Display for DeferralMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeferralMode {
    type Err = DeferralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        DeferralMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted || mode.alias() == wanted)
            .ok_or_else(|| DeferralError::UnknownStrategy(s.to_string()))
    }
}
