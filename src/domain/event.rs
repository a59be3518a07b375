//! Progress events emitted by the loop driver.

use serde::{Deserialize, Serialize};

use crate::id::now_ms;

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopEventKind {
    /// About to acquire budget for a new iteration
    Start,
    /// Sleeping for the rate limiter
    Waiting,
    /// Iteration finished and the loop continues
    Done,
    /// Loop stopped; details carry the exit reason
    Exit,
    /// Loop aborted on an error; details carry the message
    Error,
}

impl LoopEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopEventKind::Start => "start",
            LoopEventKind::Waiting => "waiting",
            LoopEventKind::Done => "done",
            LoopEventKind::Exit => "exit",
            LoopEventKind::Error => "error",
        }
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopEvent {
    pub iteration: u64,
    pub kind: LoopEventKind,
    pub details: String,
    /// Unix timestamp in milliseconds
    pub created_at: u64,
}

impl LoopEvent {
    pub fn new(iteration: u64, kind: LoopEventKind, details: impl Into<String>) -> Self {
        Self {
            iteration,
            kind,
            details: details.into(),
            created_at: now_ms(),
        }
    }

    pub fn start(iteration: u64) -> Self {
        Self::new(iteration, LoopEventKind::Start, "")
    }

    pub fn waiting(iteration: u64, details: impl Into<String>) -> Self {
        Self::new(iteration, LoopEventKind::Waiting, details)
    }

    pub fn done(iteration: u64) -> Self {
        Self::new(iteration, LoopEventKind::Done, "")
    }

    pub fn exit(iteration: u64, reason: impl Into<String>) -> Self {
        Self::new(iteration, LoopEventKind::Exit, reason)
    }

    pub fn error(iteration: u64, message: impl Into<String>) -> Self {
        Self::new(iteration, LoopEventKind::Error, message)
    }
}
