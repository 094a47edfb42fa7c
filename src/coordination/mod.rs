//! Run coordination module
//!
//! Implements the caller/run control surface: the completion handle with its
//! force-now and abandon latches, and the safety policy that caps runaway
//! deferral.

pub mod handle;
pub mod safety;

pub use handle::CompletionHandle;
pub use safety::{DEFAULT_MAX_CYCLES, SafetyPolicy, reset_test_ambient_safety, set_test_ambient_safety};
