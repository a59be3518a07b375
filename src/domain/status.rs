//! The per-iteration status report an agent emits.
//!
//! A `LooprStatus` is derived from a single transcript and discarded once it
//! has been folded into [`LoopState`](super::LoopState).

use serde::{Deserialize, Serialize};

/// The `STATUS:` word of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusWord {
    InProgress,
    Complete,
    Blocked,
    Error,
    /// Absent or unrecognised
    #[default]
    Unknown,
}

impl StatusWord {
    /// Parse a status word, case-insensitively. Anything unrecognised is `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => StatusWord::InProgress,
            "COMPLETE" => StatusWord::Complete,
            "BLOCKED" => StatusWord::Blocked,
            "ERROR" => StatusWord::Error,
            _ => StatusWord::Unknown,
        }
    }

    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusWord::InProgress => "IN_PROGRESS",
            StatusWord::Complete => "COMPLETE",
            StatusWord::Blocked => "BLOCKED",
            StatusWord::Error => "ERROR",
            StatusWord::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for StatusWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields parsed from one status block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LooprStatus {
    pub status: StatusWord,
    pub exit_signal: bool,
    /// Lower-cased work tag such as "tests", "code" or "docs"
    pub work_type: String,
    /// `None` when the block omitted `FILES_MODIFIED`
    pub files_modified: Option<u32>,
    pub error_count: u32,
    pub summary: String,
    pub permission_denied: bool,
}

impl LooprStatus {
    /// Fold an invocation failure into this report so it flows through the
    /// same breaker bookkeeping as an agent-reported error.
    pub fn absorb_invocation_error(&mut self, message: &str) {
        if self.summary.is_empty() {
            self.summary = message.to_string();
        }
        if self.error_count == 0 {
            self.error_count = 1;
        }
        self.status = StatusWord::Error;
        self.exit_signal = false;
    }

    /// True when the agent reported any error.
    pub fn has_error(&self) -> bool {
        self.error_count > 0 || self.status == StatusWord::Error
    }

    /// Signature used to detect the same error repeating: the summary, or the
    /// status word when the summary is empty.
    pub fn error_signature(&self) -> String {
        if self.summary.is_empty() {
            self.status.as_str().to_string()
        } else {
            self.summary.clone()
        }
    }
}
