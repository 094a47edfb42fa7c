//! ID generation utilities for deferral
//!
//! Provides functions for generating correlation identifiers for runs.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a correlation ID for one scheduling call
///
/// Format: `run-{timestamp_ms}-{random_hex}`
/// Example: `run-1738300800123-a1b2c3d4`
pub fn generate_correlation_id() -> String {
    let timestamp = now_ms();
    let random: u32 = rand::rng().random();
    format!("run-{}-{:08x}", timestamp, random)
}
