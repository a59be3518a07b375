//! Status block parser.
//!
//! Agent transcripts are free-form; only the fenced block is contract-bound.
//! The last start marker wins so that example blocks echoed earlier in the
//! transcript (the prompt itself contains one) are never mistaken for the
//! real report.

use std::fs;
use std::path::Path;

use crate::domain::{LooprStatus, StatusWord};
use crate::error::Result;

/// Opening fence of a status block.
pub const STATUS_START: &str = "---LOOPR_STATUS---";

/// Closing fence of a status block.
pub const STATUS_END: &str = "---END_LOOPR_STATUS---";

/// Parse the last status block in `text`.
///
/// Returns `None` when no start marker exists. A block without an end marker
/// runs to the end of the text; unknown keys and malformed lines are skipped.
pub fn parse_status(text: &str) -> Option<LooprStatus> {
    let start = text.rfind(STATUS_START)?;
    let mut segment = &text[start + STATUS_START.len()..];
    if let Some(end) = segment.find(STATUS_END) {
        segment = &segment[..end];
    }

    let mut status = LooprStatus::default();
    for line in segment.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_uppercase().as_str() {
            "STATUS" => status.status = StatusWord::parse(value),
            "EXIT_SIGNAL" => status.exit_signal = parse_bool(value),
            "WORK_TYPE" => status.work_type = value.to_lowercase(),
            "FILES_MODIFIED" => status.files_modified = Some(parse_count(value)),
            "ERRORS" => status.error_count = parse_count(value),
            "SUMMARY" => status.summary = value.to_string(),
            "PERMISSION_DENIALS" => status.permission_denied = parse_bool(value),
            _ => {}
        }
    }
    Some(status)
}

/// Read a transcript file and parse its last status block.
///
/// Transcripts captured through a terminal may contain invalid UTF-8; such
/// bytes are replaced rather than rejected.
pub fn parse_status_file(path: &Path) -> Result<Option<LooprStatus>> {
    let bytes = fs::read(path)?;
    Ok(parse_status(&String::from_utf8_lossy(&bytes)))
}

/// `true`, `yes`, `1` and `y` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1" | "y")
}

fn parse_count(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}
