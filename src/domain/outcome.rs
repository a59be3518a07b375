//! Loop outcome types.
//!
//! The breaker evaluator produces a [`LoopPhase`]; terminal phases carry an
//! [`ExitReason`] whose code is what external observers see.

use serde::{Deserialize, Serialize};

/// Which circuit breaker opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breaker {
    /// No status block for too many iterations
    MissingStatus,
    /// No file changes for too many iterations
    NoProgress,
    /// The same error signature kept repeating
    RepeatedError,
    /// Only test work for too many iterations
    TestOnly,
}

/// Why a loop stopped. Exactly one is active per terminal iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "max_iterations")]
    MaxIterations,
    #[serde(rename = "permission_denied")]
    PermissionDenied,
    #[serde(rename = "missing_status")]
    MissingStatus,
    #[serde(rename = "circuit_open_no_progress")]
    NoProgress,
    #[serde(rename = "circuit_open_repeated_error")]
    RepeatedError,
    #[serde(rename = "circuit_open_test_only")]
    TestOnly,
}

impl ExitReason {
    /// Stable code written to `status.json` and `loop.log`.
    pub fn code(&self) -> &'static str {
        match self {
            ExitReason::Completed => "completed",
            ExitReason::MaxIterations => "max_iterations",
            ExitReason::PermissionDenied => "permission_denied",
            ExitReason::MissingStatus => "missing_status",
            ExitReason::NoProgress => "circuit_open_no_progress",
            ExitReason::RepeatedError => "circuit_open_repeated_error",
            ExitReason::TestOnly => "circuit_open_test_only",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<Breaker> for ExitReason {
    fn from(breaker: Breaker) -> Self {
        match breaker {
            Breaker::MissingStatus => ExitReason::MissingStatus,
            Breaker::NoProgress => ExitReason::NoProgress,
            Breaker::RepeatedError => ExitReason::RepeatedError,
            Breaker::TestOnly => ExitReason::TestOnly,
        }
    }
}

/// Externally visible controller state, as written to `status.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    Running,
    Waiting,
    Complete,
    Blocked,
    CircuitOpen,
    Error,
}

impl DisplayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayState::Running => "running",
            DisplayState::Waiting => "waiting",
            DisplayState::Complete => "complete",
            DisplayState::Blocked => "blocked",
            DisplayState::CircuitOpen => "circuit_open",
            DisplayState::Error => "error",
        }
    }
}

impl std::fmt::Display for DisplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controller phase after an iteration has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Keep iterating
    Running,
    /// Sleeping for the rate limiter
    Waiting,
    /// Completion confirmed (or iteration cap reached)
    Complete(ExitReason),
    /// Agent hit a permission denial
    Blocked,
    /// A breaker opened
    CircuitOpen(Breaker),
    /// Invocation failed and no breaker fired
    Error,
}

impl LoopPhase {
    /// Returns true if the loop must stop in this phase
    pub fn is_terminal(&self) -> bool {
        self.exit_reason().is_some()
    }

    /// The exit reason for terminal phases.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        match self {
            LoopPhase::Complete(reason) => Some(*reason),
            LoopPhase::Blocked => Some(ExitReason::PermissionDenied),
            LoopPhase::CircuitOpen(breaker) => Some((*breaker).into()),
            LoopPhase::Running | LoopPhase::Waiting | LoopPhase::Error => None,
        }
    }

    /// Snapshot projection of this phase.
    pub fn display_state(&self) -> DisplayState {
        match self {
            LoopPhase::Running => DisplayState::Running,
            LoopPhase::Waiting => DisplayState::Waiting,
            LoopPhase::Complete(_) => DisplayState::Complete,
            LoopPhase::Blocked => DisplayState::Blocked,
            LoopPhase::CircuitOpen(_) => DisplayState::CircuitOpen,
            LoopPhase::Error => DisplayState::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_reason_codes_match_serde() {
        let all = [
            ExitReason::Completed,
            ExitReason::MaxIterations,
            ExitReason::PermissionDenied,
            ExitReason::MissingStatus,
            ExitReason::NoProgress,
            ExitReason::RepeatedError,
            ExitReason::TestOnly,
        ];
        for reason in all {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.code()));
        }
    }

    #[test]
    fn test_display_state_serde() {
        assert_eq!(serde_json::to_string(&DisplayState::CircuitOpen).unwrap(), "\"circuit_open\"");
        let state: DisplayState = serde_json::from_str("\"waiting\"").unwrap();
        assert_eq!(state, DisplayState::Waiting);
    }

    #[test]
    fn test_phase_projection() {
        assert_eq!(LoopPhase::Running.exit_reason(), None);
        assert!(!LoopPhase::Error.is_terminal());
        assert_eq!(LoopPhase::Blocked.exit_reason(), Some(ExitReason::PermissionDenied));
        assert_eq!(LoopPhase::Blocked.display_state(), DisplayState::Blocked);

        let phase = LoopPhase::CircuitOpen(Breaker::NoProgress);
        assert!(phase.is_terminal());
        assert_eq!(phase.exit_reason().unwrap().code(), "circuit_open_no_progress");
        assert_eq!(phase.display_state(), DisplayState::CircuitOpen);

        let phase = LoopPhase::Complete(ExitReason::MaxIterations);
        assert_eq!(phase.display_state(), DisplayState::Complete);
        assert_eq!(phase.exit_reason(), Some(ExitReason::MaxIterations));
    }
}
