//! Common helper functions for Stratus.

use std::time::Instant;

/// Parse a boolean environment flag, accepting `1/true/yes/on`.
pub fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Milliseconds elapsed between `epoch` and `now`, saturating at zero.
pub fn elapsed_ms(epoch: Instant, now: Instant) -> f64 {
    now.saturating_duration_since(epoch).as_secs_f64() * 1000.0
}
