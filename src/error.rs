//! Error types for deferral
//!
//! Centralized error handling using thiserror. Every variant carries plain
//! strings so a settled completion handle can hand the same outcome to every
//! awaiter.

use thiserror::Error;

/// All error types that can occur while scheduling or running deferred work
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeferralError {
    /// Invalid strategy or engine configuration, detected at build time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Factory was asked for a strategy key it does not know
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Cooperative cancellation observed at a suspension point
    #[error("Run cancelled")]
    Cancelled,

    /// The unit of work itself failed
    #[error("Work failed: {0}")]
    Work(String),

    /// A middleware layer failed on its own account
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// The background run died without producing an outcome
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl DeferralError {
    /// Build a work failure from any displayable error
    pub fn work(err: impl std::fmt::Display) -> Self {
        DeferralError::Work(err.to_string())
    }

    /// Whether this error is the cooperative cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DeferralError::Cancelled)
    }
}

impl From<std::io::Error> for DeferralError {
    fn from(err: std::io::Error) -> Self {
        DeferralError::Work(err.to_string())
    }
}

/// Result type alias for deferral operations
pub type Result<T> = std::result::Result<T, DeferralError>;
