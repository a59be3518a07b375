//! Loop driver.
//!
//! Each iteration acquires call budget, invokes the agent, parses its status
//! block, evaluates the breakers and persists the outcome:
//!
//! ```text
//! ACQUIRE_BUDGET -> INVOKE -> PARSE -> EVALUATE -> PERSIST -> (CONTINUE | STOP)
//! ```
//!
//! All state is loaded from the store at start, so a killed controller
//! resumes from the last persisted iteration.

mod loop_driver;

use std::fmt;
use std::path::PathBuf;

use crate::config::LoopConfig;
use crate::domain::{ExitReason, LoopEvent};
use crate::prompt::RunStep;
use crate::session::Session;

pub use loop_driver::{LoopDriver, MISSING_STATUS_ERROR};

/// Callback receiving progress events.
pub type ProgressFn = Box<dyn Fn(&LoopEvent) + Send + Sync>;

/// Fixed inputs of one controller run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Working root the agent runs in
    pub root: PathBuf,
    /// Handoff note, relative to the root
    pub handoff_path: PathBuf,
    pub loop_config: LoopConfig,
    pub step: RunStep,
}

impl DriverConfig {
    pub fn new(root: impl Into<PathBuf>, loop_config: LoopConfig) -> Self {
        Self {
            root: root.into(),
            handoff_path: PathBuf::from("specs/.loopr/handoff.md"),
            loop_config,
            step: RunStep::execute(),
        }
    }

    pub fn with_handoff_path(mut self, handoff_path: impl Into<PathBuf>) -> Self {
        self.handoff_path = handoff_path.into();
        self
    }
}

/// Per-run options supplied by the caller.
#[derive(Default)]
pub struct LoopOptions {
    /// Overrides `MAX_ITERATIONS` when set and non-zero
    pub max_iterations: Option<u32>,
    /// Passed to the agent before the prompt
    pub agent_args: Vec<String>,
    pub progress: Option<ProgressFn>,
}

impl fmt::Debug for LoopOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopOptions")
            .field("max_iterations", &self.max_iterations)
            .field("agent_args", &self.agent_args)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl LoopOptions {
    pub fn with_progress(mut self, progress: impl Fn(&LoopEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(progress) = &self.progress {
            progress(&event);
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    /// Iteration counter when the run stopped
    pub iterations: u64,
    pub exit_reason: Option<ExitReason>,
    pub last_session: Option<Session>,
}
