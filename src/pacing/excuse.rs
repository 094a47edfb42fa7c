//! Excuse sources - purely observational text fetched once per cycle.

use std::sync::Arc;

use async_trait::async_trait;

use super::random::{RandomSource, ThreadRandom};
use crate::domain::DeferralMode;
use crate::error::{DeferralError, Result};

/// What an excuse source gets to look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcuseContext {
    pub mode: DeferralMode,
    /// Cycle the excuse is attached to (1-based)
    pub cycle: u32,
    pub correlation_id: String,
}

/// Produces a textual justification for not running the work yet.
#[async_trait]
pub trait ExcuseSource: Send + Sync {
    async fn excuse(&self, ctx: &ExcuseContext) -> String;
}

const DEFAULT_EXCUSES: &[&str] = &[
    "Waiting for the coffee to kick in",
    "The build cache is still warming up",
    "Blocked on a meeting about meetings",
    "Mercury is in retrograde",
    "Letting the requirements settle",
    "Someone might change their mind",
    "The network looked tired",
];

/// Picks from a fixed list using a random source.
pub struct CannedExcuses {
    excuses: Vec<String>,
    random: Arc<dyn RandomSource>,
}

impl CannedExcuses {
    /// Build from a custom list. An empty list is a configuration error.
    pub fn new(excuses: Vec<String>) -> Result<Self> {
        if excuses.is_empty() {
            return Err(DeferralError::Configuration(
                "excuse list must not be empty".to_string(),
            ));
        }
        Ok(Self {
            excuses,
            random: Arc::new(ThreadRandom),
        })
    }

    /// Use a specific random source for selection
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn len(&self) -> usize {
        self.excuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excuses.is_empty()
    }
}

impl Default for CannedExcuses {
    fn default() -> Self {
        Self {
            excuses: DEFAULT_EXCUSES.iter().map(|s| s.to_string()).collect(),
            random: Arc::new(ThreadRandom),
        }
    }
}

#[async_trait]
impl ExcuseSource for CannedExcuses {
    async fn excuse(&self, _ctx: &ExcuseContext) -> String {
        let index = self.random.next_u32(self.excuses.len() as u32) as usize;
        self.excuses[index.min(self.excuses.len() - 1)].clone()
    }
}
