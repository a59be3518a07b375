//! Circuit-breaker evaluation.
//!
//! [`evaluate`] folds one iteration's report into [`LoopState`] and decides
//! whether the loop continues. Counters are updated in a fixed order because
//! later exit checks read counters set by earlier updates.

use crate::config::LoopConfig;
use crate::domain::{Breaker, ExitReason, LoopPhase, LoopState, LooprStatus, StatusWord};

/// Summary words that count as a completion claim when paired with an exit signal.
pub const COMPLETION_KEYWORDS: &[&str] = &["complete", "done", "ready"];

/// Update `state` with this iteration's evidence and return the resulting phase.
///
/// `files_modified` is the effective change count: the reported value, or
/// a source-control count when the report omitted it.
pub fn evaluate(
    config: &LoopConfig,
    status: &LooprStatus,
    status_found: bool,
    files_modified: u32,
    state: &mut LoopState,
) -> LoopPhase {
    if status.permission_denied {
        return LoopPhase::Blocked;
    }

    track_missing_status(status_found, state);
    track_completion(status, status_found, state);
    track_test_loops(status, state);
    track_progress(files_modified, state);
    track_errors(status, state);

    if status.exit_signal && state.consecutive_done_signals >= config.max_consecutive_done_signals {
        return LoopPhase::Complete(ExitReason::Completed);
    }
    if state.missing_status_count >= config.max_missing_status {
        return LoopPhase::CircuitOpen(Breaker::MissingStatus);
    }
    if state.no_progress_count >= config.max_no_progress {
        return LoopPhase::CircuitOpen(Breaker::NoProgress);
    }
    if state.same_error_count >= config.max_same_error {
        return LoopPhase::CircuitOpen(Breaker::RepeatedError);
    }
    if state.consecutive_test_loops >= config.max_consecutive_test_loops {
        return LoopPhase::CircuitOpen(Breaker::TestOnly);
    }
    LoopPhase::Running
}

fn track_missing_status(status_found: bool, state: &mut LoopState) {
    if status_found {
        state.missing_status_count = 0;
    } else {
        state.missing_status_count += 1;
    }
}

fn track_completion(status: &LooprStatus, status_found: bool, state: &mut LoopState) {
    let indicated = status_found
        && status.exit_signal
        && (status.status == StatusWord::Complete || contains_completion_keyword(&status.summary));
    if indicated {
        state.consecutive_done_signals += 1;
        state.last_completion_indicator = status.summary.clone();
    } else {
        state.consecutive_done_signals = 0;
        state.last_completion_indicator.clear();
    }
}

fn track_test_loops(status: &LooprStatus, state: &mut LoopState) {
    if status.work_type.starts_with("test") {
        state.consecutive_test_loops += 1;
    } else {
        state.consecutive_test_loops = 0;
    }
}

fn track_progress(files_modified: u32, state: &mut LoopState) {
    if files_modified == 0 {
        state.no_progress_count += 1;
    } else {
        state.no_progress_count = 0;
    }
}

fn track_errors(status: &LooprStatus, state: &mut LoopState) {
    if !status.has_error() {
        state.same_error_count = 0;
        state.last_error_signature.clear();
        return;
    }
    let signature = status.error_signature();
    if signature == state.last_error_signature {
        state.same_error_count += 1;
    } else {
        state.same_error_count = 1;
        state.last_error_signature = signature;
    }
}

/// Case-insensitive substring match against [`COMPLETION_KEYWORDS`].
pub fn contains_completion_keyword(summary: &str) -> bool {
    let lower = summary.to_lowercase();
    COMPLETION_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoopConfig {
        LoopConfig {
            max_consecutive_done_signals: 2,
            max_missing_status: 2,
            max_no_progress: 3,
            max_same_error: 2,
            max_consecutive_test_loops: 3,
            ..Default::default()
        }
    }

    fn complete() -> LooprStatus {
        LooprStatus {
            status: StatusWord::Complete,
            exit_signal: true,
            work_type: "code".to_string(),
            files_modified: Some(1),
            summary: "all tasks complete".to_string(),
            ..Default::default()
        }
    }

    fn in_progress(summary: &str) -> LooprStatus {
        LooprStatus {
            status: StatusWord::InProgress,
            work_type: "code".to_string(),
            files_modified: Some(2),
            summary: summary.to_string(),
            ..Default::default()
        }
    }

    fn failing(summary: &str) -> LooprStatus {
        LooprStatus {
            status: StatusWord::Error,
            error_count: 1,
            summary: summary.to_string(),
            ..in_progress("")
        }
    }

    #[test]
    fn test_two_completions_complete() {
        let config = config();
        let mut state = LoopState::default();
        assert_eq!(evaluate(&config, &complete(), true, 1, &mut state), LoopPhase::Running);
        assert_eq!(
            evaluate(&config, &complete(), true, 1, &mut state),
            LoopPhase::Complete(ExitReason::Completed)
        );
        assert_eq!(state.last_completion_indicator, "all tasks complete");
    }

    #[test]
    fn test_completion_interrupted_by_no_signal() {
        let config = config();
        let mut state = LoopState::default();
        evaluate(&config, &complete(), true, 1, &mut state);
        let mut no_signal = complete();
        no_signal.exit_signal = false;
        assert_eq!(evaluate(&config, &no_signal, true, 1, &mut state), LoopPhase::Running);
        assert_eq!(state.consecutive_done_signals, 0);
        assert!(state.last_completion_indicator.is_empty());
    }

    #[test]
    fn test_signal_without_completion_wording_resets() {
        let config = config();
        let mut state = LoopState {
            consecutive_done_signals: 1,
            ..Default::default()
        };
        let mut status = in_progress("refactored parser");
        status.exit_signal = true;
        evaluate(&config, &status, true, 1, &mut state);
        assert_eq!(state.consecutive_done_signals, 0);
    }

    #[test]
    fn test_keyword_in_summary_counts() {
        let config = config();
        let mut state = LoopState::default();
        let mut status = in_progress("Everything is READY for review");
        status.exit_signal = true;
        evaluate(&config, &status, true, 1, &mut state);
        assert_eq!(state.consecutive_done_signals, 1);
    }

    #[test]
    fn test_missing_status_opens_breaker() {
        let config = config();
        let mut state = LoopState::default();
        let none = LooprStatus::default();
        assert_eq!(evaluate(&config, &none, false, 1, &mut state), LoopPhase::Running);
        assert_eq!(
            evaluate(&config, &none, false, 1, &mut state),
            LoopPhase::CircuitOpen(Breaker::MissingStatus)
        );
    }

    #[test]
    fn test_missing_then_found_resets() {
        let config = config();
        let mut state = LoopState::default();
        evaluate(&config, &LooprStatus::default(), false, 1, &mut state);
        assert_eq!(state.missing_status_count, 1);
        evaluate(&config, &in_progress("wrote tests"), true, 1, &mut state);
        assert_eq!(state.missing_status_count, 0);
    }

    #[test]
    fn test_repeated_error_opens_breaker() {
        let config = config();
        let mut state = LoopState::default();
        assert_eq!(evaluate(&config, &failing("build broken"), true, 1, &mut state), LoopPhase::Running);
        assert_eq!(
            evaluate(&config, &failing("build broken"), true, 1, &mut state),
            LoopPhase::CircuitOpen(Breaker::RepeatedError)
        );
    }

    #[test]
    fn test_different_error_resets_to_one() {
        let config = config();
        let mut state = LoopState::default();
        evaluate(&config, &failing("build broken"), true, 1, &mut state);
        assert_eq!(evaluate(&config, &failing("tests red"), true, 1, &mut state), LoopPhase::Running);
        assert_eq!(state.same_error_count, 1);
        assert_eq!(state.last_error_signature, "tests red");
    }

    #[test]
    fn test_clean_iteration_clears_error_signature() {
        let config = config();
        let mut state = LoopState::default();
        evaluate(&config, &failing("build broken"), true, 1, &mut state);
        evaluate(&config, &in_progress("fixed build"), true, 1, &mut state);
        assert_eq!(state.same_error_count, 0);
        assert!(state.last_error_signature.is_empty());
    }

    #[test]
    fn test_error_word_without_summary_uses_status_signature() {
        let config = config();
        let mut state = LoopState::default();
        let status = LooprStatus {
            status: StatusWord::Error,
            ..Default::default()
        };
        evaluate(&config, &status, true, 1, &mut state);
        assert_eq!(state.last_error_signature, "ERROR");
        assert_eq!(state.same_error_count, 1);
    }

    #[test]
    fn test_no_progress_opens_breaker() {
        let config = config();
        let mut state = LoopState::default();
        let status = in_progress("thinking");
        evaluate(&config, &status, true, 0, &mut state);
        evaluate(&config, &status, true, 0, &mut state);
        assert_eq!(
            evaluate(&config, &status, true, 0, &mut state),
            LoopPhase::CircuitOpen(Breaker::NoProgress)
        );
    }

    #[test]
    fn test_progress_resets_counter() {
        let config = config();
        let mut state = LoopState {
            no_progress_count: 2,
            ..Default::default()
        };
        evaluate(&config, &in_progress("edited"), true, 4, &mut state);
        assert_eq!(state.no_progress_count, 0);
    }

    #[test]
    fn test_test_only_opens_breaker() {
        let config = config();
        let mut state = LoopState::default();
        let mut status = in_progress("more tests");
        status.work_type = "tests".to_string();
        evaluate(&config, &status, true, 1, &mut state);
        evaluate(&config, &status, true, 1, &mut state);
        assert_eq!(
            evaluate(&config, &status, true, 1, &mut state),
            LoopPhase::CircuitOpen(Breaker::TestOnly)
        );
    }

    #[test]
    fn test_permission_denied_wins_over_everything() {
        let config = config();
        let mut state = LoopState {
            consecutive_done_signals: 5,
            no_progress_count: 9,
            ..Default::default()
        };
        let before = state.clone();
        let mut status = complete();
        status.permission_denied = true;
        assert_eq!(evaluate(&config, &status, true, 0, &mut state), LoopPhase::Blocked);
        assert_eq!(state, before);
    }

    #[test]
    fn test_completion_wins_over_breakers() {
        let config = config();
        let mut state = LoopState {
            consecutive_done_signals: 1,
            no_progress_count: 2,
            consecutive_test_loops: 2,
            ..Default::default()
        };
        let mut status = complete();
        status.work_type = "tests".to_string();
        assert_eq!(
            evaluate(&config, &status, true, 0, &mut state),
            LoopPhase::Complete(ExitReason::Completed)
        );
    }

    #[test]
    fn test_missing_status_checked_before_no_progress() {
        let config = config();
        let mut state = LoopState {
            missing_status_count: 1,
            no_progress_count: 2,
            ..Default::default()
        };
        assert_eq!(
            evaluate(&config, &LooprStatus::default(), false, 0, &mut state),
            LoopPhase::CircuitOpen(Breaker::MissingStatus)
        );
    }

    #[test]
    fn test_no_progress_checked_before_repeated_error() {
        let config = config();
        let mut state = LoopState {
            no_progress_count: 2,
            same_error_count: 1,
            last_error_signature: "boom".to_string(),
            ..Default::default()
        };
        assert_eq!(
            evaluate(&config, &failing("boom"), true, 0, &mut state),
            LoopPhase::CircuitOpen(Breaker::NoProgress)
        );
        assert_eq!(state.same_error_count, 2);
    }

    #[test]
    fn test_contains_completion_keyword() {
        assert!(contains_completion_keyword("Done."));
        assert!(contains_completion_keyword("COMPLETED all tasks"));
        assert!(!contains_completion_keyword("still working"));
        assert!(!contains_completion_keyword(""));
    }
}
