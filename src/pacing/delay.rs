//! Delay policies - the only place a strategy actually waits.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DeferralError, Result};

/// Abstracts "wait for this long, unless cancelled".
#[async_trait]
pub trait DelayPolicy: Send + Sync {
    /// Wait for `duration`, returning `Cancelled` as soon as the token fires.
    async fn delay(&self, duration: Duration, cancel: &CancellationToken) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &str {
        "delay"
    }
}

/// Real wall-clock waiting on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait]
impl DelayPolicy for TokioDelay {
    async fn delay(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(DeferralError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DeferralError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

/// Yields to the runtime instead of sleeping. For tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantDelay;

#[async_trait]
impl DelayPolicy for InstantDelay {
    async fn delay(&self, _duration: Duration, cancel: &CancellationToken) -> Result<()> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(DeferralError::Cancelled);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "instant"
    }
}

/// Instant delay that remembers every duration it was asked to wait.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    requested: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order.
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl DelayPolicy for RecordingDelay {
    async fn delay(&self, duration: Duration, cancel: &CancellationToken) -> Result<()> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        InstantDelay.delay(duration, cancel).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_tokio_delay_waits() {
        let token = CancellationToken::new();
        let start = Instant::now();
        TokioDelay.delay(Duration::from_millis(20), &token).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_tokio_delay_precancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let err = TokioDelay
            .delay(Duration::from_secs(60), &token)
            .await
            .unwrap_err();
        assert_eq!(err, DeferralError::Cancelled);
    }

    #[tokio::test]
    async fn test_tokio_delay_cancelled_midway() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let err = TokioDelay
            .delay(Duration::from_secs(60), &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_instant_delay() {
        let token = CancellationToken::new();
        InstantDelay.delay(Duration::from_secs(3600), &token).await.unwrap();
        token.cancel();
        assert!(InstantDelay.delay(Duration::ZERO, &token).await.is_err());
    }

    #[tokio::test]
    async fn test_recording_delay_records() {
        let token = CancellationToken::new();
        let delay = RecordingDelay::new();
        delay.delay(Duration::from_millis(5), &token).await.unwrap();
        delay.delay(Duration::from_millis(10), &token).await.unwrap();
        assert_eq!(
            delay.requested(),
            vec![Duration::from_millis(5), Duration::from_millis(10)]
        );
        assert_eq!(delay.name(), "recording");
    }
}
