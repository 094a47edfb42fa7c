//! Built-in middleware layers.

use std::time::Instant;

use async_trait::async_trait;

use super::{DeferralContext, Middleware, Next};
use crate::error::Result;

/// Logs entry and exit of every scheduled execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn handle(&self, ctx: &mut DeferralContext, next: Next<'_>) -> Result<()> {
        tracing::info!(correlation_id = %ctx.correlation_id, mode = %ctx.mode, "Deferral starting");
        let outcome = next.run(ctx).await;

        let (executed, cycles, excuses) = ctx
            .provisional
            .as_ref()
            .map(|r| (r.executed, r.cycles, r.excuse_count))
            .unwrap_or_default();
        match &outcome {
            Ok(()) => tracing::info!(
                correlation_id = %ctx.correlation_id,
                executed,
                cycles,
                excuses,
                "Deferral finished"
            ),
            Err(e) => tracing::warn!(
                correlation_id = %ctx.correlation_id,
                executed,
                cycles,
                error = %e,
                "Deferral failed"
            ),
        }
        outcome
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Records wall time of the inner chain as the `elapsed_ms` attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingMiddleware;

pub const ELAPSED_MS: &str = "elapsed_ms";

#[async_trait]
impl Middleware for TimingMiddleware {
    async fn handle(&self, ctx: &mut DeferralContext, next: Next<'_>) -> Result<()> {
        let started = Instant::now();
        let outcome = next.run(ctx).await;
        ctx.set_attribute(ELAPSED_MS, started.elapsed().as_millis().to_string());
        outcome
    }

    fn name(&self) -> &str {
        "timing"
    }
}
