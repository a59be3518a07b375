//! ID generation utilities for Loopr
//!
//! Provides timestamps and the identifiers used to name agent sessions.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Length in characters of the random session suffix.
pub const SESSION_SUFFIX_LEN: usize = 6;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Generate the short random suffix that disambiguates sessions started
/// within the same second.
///
/// Format: six lowercase hex characters, e.g. `a1b2c3`
pub fn generate_session_suffix() -> String {
    let bytes: [u8; SESSION_SUFFIX_LEN / 2] = rand::rng().random();
    hex::encode(bytes)
}

/// Generate a session identifier from a start time and a suffix.
///
/// Format: `session-{YYYYMMDD-HHMMSS}-{suffix}`
/// Example: `session-20260126-120000-a1b2c3`
pub fn session_id(started: DateTime<Utc>, suffix: &str) -> String {
    format!("session-{}-{}", started.format("%Y%m%d-%H%M%S"), suffix)
}
