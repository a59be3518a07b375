//! Durable loop counters.
//!
//! `LoopState` survives process restarts so that a killed controller resumes
//! where it stopped. Counters only ever increment or reset to zero on
//! contrary evidence; the iteration counter never decreases.

use serde::{Deserialize, Serialize};

use crate::error::{LooprError, Result};

/// Cross-invocation state, persisted as `loop-state.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopState {
    /// Iterations started so far
    pub iteration: u64,
    pub consecutive_done_signals: u32,
    pub consecutive_test_loops: u32,
    pub no_progress_count: u32,
    pub same_error_count: u32,
    pub missing_status_count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_error_signature: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_completion_indicator: String,
}

impl LoopState {
    /// Advance the iteration counter and return the new iteration number.
    pub fn advance_iteration(&mut self) -> u64 {
        self.iteration += 1;
        self.iteration
    }

    /// Check that `next` may replace `self` without moving the iteration
    /// counter backwards.
    pub fn ensure_successor(&self, next: &LoopState) -> Result<()> {
        if next.iteration < self.iteration {
            return Err(LooprError::InvalidState(format!(
                "iteration would decrease from {} to {}",
                self.iteration, next.iteration
            )));
        }
        Ok(())
    }
}
