//! Session runner.
//!
//! A session is one bounded agent invocation with its own transcript
//! (`<id>.log`) and metadata record stream (`<id>.jsonl`) under
//! `.loopr/transcripts/`. Process failures are reported in [`SessionRun`];
//! only failures to set a session up at all are returned as errors.

mod metadata;
mod runner;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use metadata::{
    EndRecord, MAX_SESSION_ATTEMPTS, SessionPaths, StartRecord, allocate_session, append_record, prompt_sha256,
    shell_join,
};
pub use runner::{ProcessRunner, find_on_path, humanize_duration};

/// One agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Working root the agent ran in
    pub root: PathBuf,
    pub id: String,
    pub transcript_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Full argv, binary first
    pub command: Vec<String>,
    pub started: DateTime<Utc>,
}

impl Session {
    /// Bare file name of the transcript.
    pub fn transcript_file_name(&self) -> String {
        self.transcript_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub root: PathBuf,
    /// Passthrough arguments placed before the prompt
    pub args: Vec<String>,
    pub prompt: String,
    /// Kill the agent after this long
    pub timeout: Option<Duration>,
}

/// Result of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRun {
    pub exit_code: i32,
    pub session: Session,
    /// Non-zero exit, timeout or spawn failure
    pub error: Option<String>,
    pub timed_out: bool,
}

/// Invokes the agent. Implemented by [`ProcessRunner`] and by test doubles.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: &AgentRequest) -> Result<SessionRun>;
}
