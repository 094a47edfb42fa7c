//! Lifecycle events published by the base orchestrator.

use serde::{Deserialize, Serialize};

use crate::domain::DeferralMode;

/// Which lifecycle hook an event is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Cycle,
    Excuse,
    Triggered,
    Abandoned,
    Executed,
}

impl LifecycleKind {
    pub const ALL: [LifecycleKind; 5] = [
        LifecycleKind::Cycle,
        LifecycleKind::Excuse,
        LifecycleKind::Triggered,
        LifecycleKind::Abandoned,
        LifecycleKind::Executed,
    ];

    /// Diagnostics counter this kind increments.
    pub fn metric_name(&self) -> &'static str {
        match self {
            LifecycleKind::Cycle => "deferral.cycles",
            LifecycleKind::Excuse => "deferral.excuses",
            LifecycleKind::Executed => "deferral.executions",
            LifecycleKind::Triggered => "deferral.triggered",
            LifecycleKind::Abandoned => "deferral.abandoned",
        }
    }
}

/// Snapshot of a run at the moment a lifecycle hook fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub correlation_id: String,
    pub mode: DeferralMode,
    pub cycles: u32,
    pub excuses: u32,
    /// Only set for excuse events
    pub excuse: Option<String>,
}
