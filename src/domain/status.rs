//! Handle status - where a scheduled run currently is in its lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a run as seen through its completion handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HandleStatus {
    /// Scheduled, first cycle not started yet
    Pending = 0,
    /// Inside the pacing loop
    Deferring = 1,
    /// A force-now request was observed
    Triggered = 2,
    /// An abandon request was observed
    Abandoned = 3,
    /// The gate opened or the elapsed ceiling was hit
    ThresholdReached = 4,
    /// Finished and the work ran
    Executed = 5,
    /// Finished without running the work
    Completed = 6,
    /// Finished because the cancellation token fired
    Cancelled = 7,
    /// Finished with an error
    Faulted = 8,
}

impl HandleStatus {
    /// Whether the run has settled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandleStatus::Executed | HandleStatus::Completed | HandleStatus::Cancelled | HandleStatus::Faulted
        )
    }

    /// Encode for atomic storage.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode from atomic storage; unknown values read as Faulted.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HandleStatus::Pending,
            1 => HandleStatus::Deferring,
            2 => HandleStatus::Triggered,
            3 => HandleStatus::Abandoned,
            4 => HandleStatus::ThresholdReached,
            5 => HandleStatus::Executed,
            6 => HandleStatus::Completed,
            7 => HandleStatus::Cancelled,
            _ => HandleStatus::Faulted,
        }
    }
}
