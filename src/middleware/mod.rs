//! Middleware pipeline
//!
//! An onion around every scheduled strategy execution. The first registered
//! layer is the outermost: "before" sections run in registration order and
//! "after" sections unwind in reverse, on failure too. Each layer receives a
//! [`Next`] it can run at most once.
//!
//! The innermost link runs the strategy and copies its result into
//! `ctx.provisional` whether the strategy succeeded or not, so outer layers can
//! inspect the result even when the work or an inner layer failed.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub use builtin::{TimingMiddleware, TracingMiddleware};

use crate::domain::{DeferralMode, DeferralResult};
use crate::error::Result;
use crate::pacing::Pacing;
use crate::strategy::{Strategy, Work};

/// Per-call state shared by every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferralContext {
    /// Same id as the run's result
    pub correlation_id: String,
    pub mode: DeferralMode,
    /// Set by the terminal link once the strategy reports a result
    pub provisional: Option<DeferralResult>,
    pub attributes: HashMap<String, String>,
}

impl DeferralContext {
    pub fn new(mode: DeferralMode, correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            mode,
            provisional: None,
            attributes: HashMap::new(),
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One layer of the onion.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut DeferralContext, next: Next<'_>) -> Result<()>;

    fn name(&self) -> &str {
        "middleware"
    }
}

/// The rest of the chain, consumed by `run`.
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    terminal: Terminal<'a>,
}

impl Next<'_> {
    pub async fn run(self, ctx: &mut DeferralContext) -> Result<()> {
        match self.layers.split_first() {
            Some((layer, rest)) => {
                let next = Next {
                    layers: rest,
                    terminal: self.terminal,
                };
                layer.handle(ctx, next).await
            }
            None => self.terminal.run(ctx).await,
        }
    }
}

struct Terminal<'a> {
    strategy: &'a mut dyn Strategy,
    work: Work,
    pacing: &'a Pacing,
}

impl Terminal<'_> {
    async fn run(self, ctx: &mut DeferralContext) -> Result<()> {
        let outcome = self.strategy.execute(self.work, self.pacing).await;
        if let Some(result) = self.strategy.last_result() {
            ctx.provisional = Some(result);
        }
        outcome
    }
}

/// Ordered middleware chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer (builder pattern). Appended layers sit inside earlier ones.
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.layers.push(middleware);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.layers.iter().map(|m| m.name().to_string()).collect()
    }

    /// Run `strategy` wrapped in every layer.
    pub async fn execute(
        &self,
        ctx: &mut DeferralContext,
        strategy: &mut dyn Strategy,
        work: Work,
        pacing: &Pacing,
    ) -> Result<()> {
        let next = Next {
            layers: &self.layers,
            terminal: Terminal { strategy, work, pacing },
        };
        next.run(ctx).await
    }
}
