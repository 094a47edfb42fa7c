//! Safety policy - the runaway cap on deferral cycles.
//!
//! Resolution order at run start:
//! 1. Explicit per-run override
//! 2. Ambient test override (only set through `set_test_ambient_safety`)
//! 3. Default injected by the composition root
//! 4. `DEFAULT_MAX_CYCLES`

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Cap used when nothing else is configured.
pub const DEFAULT_MAX_CYCLES: u32 = 1_000;

/// Zero means "no ambient override".
static TEST_AMBIENT_MAX_CYCLES: AtomicU32 = AtomicU32::new(0);

/// Maximum number of deferral cycles a run may complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    pub max_cycles: u32,
}

impl SafetyPolicy {
    pub fn new(max_cycles: u32) -> Self {
        Self { max_cycles }
    }

    /// Whether `cycles` has hit the cap.
    pub fn is_reached(&self, cycles: u32) -> bool {
        cycles >= self.max_cycles
    }

    /// Cycles left before the cap.
    pub fn remaining(&self, cycles: u32) -> u32 {
        self.max_cycles.saturating_sub(cycles)
    }

    /// The ambient policy in effect right now, given the injected default.
    pub fn ambient(injected: Option<SafetyPolicy>) -> SafetyPolicy {
        match TEST_AMBIENT_MAX_CYCLES.load(Ordering::Acquire) {
            0 => injected.unwrap_or_default(),
            max_cycles => SafetyPolicy::new(max_cycles),
        }
    }

    /// Effective policy for a run starting now.
    pub fn resolve(explicit: Option<SafetyPolicy>, injected: Option<SafetyPolicy>) -> SafetyPolicy {
        explicit.unwrap_or_else(|| Self::ambient(injected))
    }
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CYCLES)
    }
}

/// Test support: override the ambient cap process-wide. Returns the previous override.
pub fn set_test_ambient_safety(max_cycles: u32) -> Option<u32> {
    match TEST_AMBIENT_MAX_CYCLES.swap(max_cycles.max(1), Ordering::AcqRel) {
        0 => None,
        previous => Some(previous),
    }
}

/// Test support: drop the ambient override.
pub fn reset_test_ambient_safety() {
    TEST_AMBIENT_MAX_CYCLES.store(0, Ordering::Release);
}
