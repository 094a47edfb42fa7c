//! Domain types for deferral
//!
//! This module contains the core value types shared by every layer:
//! - DeferralMode: which strategy family drives a run
//! - DeferralResult: the immutable per-run outcome
//! - HandleStatus: lifecycle status visible through a completion handle
//! - RunCounters / LiveProgress: per-run bookkeeping and its lock-free mirror

pub mod counters;
pub mod mode;
pub mod result;
pub mod status;

pub use counters::{LiveProgress, ProgressSnapshot, RunCounters};
pub use mode::DeferralMode;
pub use result::{DeferralResult, productivity_index};
pub use status::HandleStatus;
