//! The externally observable status snapshot.
//!
//! Written after every iteration (and while waiting on the rate limiter) for
//! monitors to poll. It is a projection only; control state is never
//! reconstructed from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::{DisplayState, ExitReason};

/// Contents of `status.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub state: DisplayState,
    pub iteration: u64,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_reset_at: Option<DateTime<Utc>>,
}

impl LoopStatus {
    /// Create a snapshot stamped with the current time.
    pub fn new(state: DisplayState, iteration: u64) -> Self {
        Self {
            state,
            iteration,
            updated_at: Utc::now(),
            exit_reason: None,
            last_summary: None,
            last_error: None,
            call_count: None,
            next_reset_at: None,
        }
    }

    pub fn with_exit_reason(mut self, reason: Option<ExitReason>) -> Self {
        self.exit_reason = reason;
        self
    }

    /// Set the summary; empty text is dropped.
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.last_summary = non_empty(summary);
        self
    }

    /// Set the error; empty text is dropped.
    pub fn with_error(mut self, error: &str) -> Self {
        self.last_error = non_empty(error);
        self
    }

    pub fn with_budget(mut self, call_count: u32, next_reset_at: DateTime<Utc>) -> Self {
        self.call_count = Some(call_count);
        self.next_reset_at = Some(next_reset_at);
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
