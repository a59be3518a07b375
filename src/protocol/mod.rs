//! Agent-to-controller status protocol.
//!
//! The agent ends each run with a fenced block of `KEY: value` lines:
//!
//! ```text
//! ---LOOPR_STATUS---
//! STATUS: IN_PROGRESS | COMPLETE | BLOCKED | ERROR
//! EXIT_SIGNAL: true | false
//! WORK_TYPE: tests | code | docs | other
//! FILES_MODIFIED: <int>
//! ERRORS: <int>
//! SUMMARY: <short summary>
//! ---END_LOOPR_STATUS---
//! ```
//!
//! The format is versionless and best-effort: unknown keys are ignored.

mod parser;

pub use parser::{STATUS_END, STATUS_START, parse_bool, parse_status, parse_status_file};

/// Lines describing the block format, fences included, for use in prompts.
pub fn status_block_template() -> Vec<String> {
    vec![
        STATUS_START.to_string(),
        "STATUS: IN_PROGRESS | COMPLETE | BLOCKED | ERROR".to_string(),
        "EXIT_SIGNAL: true | false".to_string(),
        "WORK_TYPE: tests | code | docs | other".to_string(),
        "FILES_MODIFIED: <int>".to_string(),
        "ERRORS: <int>".to_string(),
        "SUMMARY: <short summary>".to_string(),
        "PERMISSION_DENIALS: true | false".to_string(),
        STATUS_END.to_string(),
    ]
}
