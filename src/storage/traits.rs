//! Storage trait definitions and record types.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{LoopState, LoopStatus};
use crate::error::Result;

/// Persisted rate-limit counters. Either half may be missing on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Calls made in the current window
    pub call_count: Option<u32>,
    /// When the current window started
    pub window_start: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// True when both halves are present.
    pub fn is_complete(&self) -> bool {
        self.call_count.is_some() && self.window_start.is_some()
    }
}

/// One line of the append-only `loop.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLogEntry {
    pub timestamp: DateTime<Utc>,
    pub iteration: u64,
    pub state: String,
    pub reason: String,
    pub summary: String,
    pub error: String,
}

impl LoopLogEntry {
    /// Build an entry from a snapshot.
    pub fn from_status(status: &LoopStatus) -> Self {
        Self {
            timestamp: status.updated_at,
            iteration: status.iteration,
            state: status.state.to_string(),
            reason: status.exit_reason.map(|r| r.code().to_string()).unwrap_or_default(),
            summary: status.last_summary.clone().unwrap_or_default(),
            error: status.last_error.clone().unwrap_or_default(),
        }
    }

    /// Tab-separated rendering; empty fields are omitted.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}\titer={}\tstate={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.iteration,
            self.state
        );
        if !self.reason.is_empty() {
            line.push_str(&format!("\treason={}", self.reason));
        }
        if !self.summary.is_empty() {
            line.push_str(&format!("\tsummary={}", sanitize_value(&self.summary)));
        }
        if !self.error.is_empty() {
            line.push_str(&format!("\terror={}", sanitize_value(&self.error)));
        }
        line
    }
}

/// Flatten a value onto one line: newlines and tabs become spaces.
pub fn sanitize_value(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ").trim().to_string()
}

/// Persistence boundary for everything the controller keeps across
/// iterations. A single controller process per store is assumed; no locking
/// is performed.
pub trait StateStore: Send + Sync {
    /// Load loop state, or a zeroed state when none was saved.
    fn load_state(&self) -> Result<LoopState>;

    /// Durably replace the loop state.
    fn save_state(&self, state: &LoopState) -> Result<()>;

    /// Load rate-limit counters as found.
    fn load_rate_limit(&self) -> Result<RateLimitRecord>;

    /// Durably replace both rate-limit counters.
    fn save_rate_limit(&self, call_count: u32, window_start: DateTime<Utc>) -> Result<()>;

    /// Durably replace the call count only.
    fn save_call_count(&self, call_count: u32) -> Result<()>;

    /// Replace the externally visible snapshot.
    fn write_status(&self, status: &LoopStatus) -> Result<()>;

    /// Read the snapshot back (monitors only).
    fn read_status(&self) -> Result<Option<LoopStatus>>;

    /// Append one line to the iteration log.
    fn append_log(&self, entry: &LoopLogEntry) -> Result<()>;

    /// Forget loop state and rate-limit counters.
    fn reset(&self) -> Result<()>;
}
