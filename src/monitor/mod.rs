//! Status monitor.
//!
//! Polls `status.json` and prints one line whenever the rendered status
//! changes. A missing file means the loop has not started yet.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::SecondsFormat;

use crate::domain::LoopStatus;
use crate::error::Result;
use crate::storage::sanitize_value;

/// Render a snapshot as `state=.. iter=.. [reason=..] [summary=..] [error=..] [calls=..] [reset=..]`.
pub fn format_monitor_line(status: &LoopStatus) -> String {
    let mut parts = vec![format!("state={}", status.state), format!("iter={}", status.iteration)];
    if let Some(reason) = status.exit_reason {
        parts.push(format!("reason={}", reason));
    }
    if let Some(summary) = status.last_summary.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("summary={}", sanitize_value(summary)));
    }
    if let Some(error) = status.last_error.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("error={}", sanitize_value(error)));
    }
    if let Some(calls) = status.call_count {
        parts.push(format!("calls={}", calls));
    }
    if let Some(reset) = status.next_reset_at {
        parts.push(format!("reset={}", reset.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    parts.join(" ")
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// Status file absent; `first` is true only the first time in a row
    Missing { first: bool },
    /// Status changed since the last poll
    Changed(String),
    /// Same line as last time
    Unchanged,
    /// File present but not a valid snapshot
    Invalid(String),
}

/// Tracks the last printed line for one status file.
#[derive(Debug, Clone)]
pub struct Monitor {
    status_path: PathBuf,
    last_line: Option<String>,
    warned: bool,
}

impl Monitor {
    pub fn new(status_path: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            last_line: None,
            warned: false,
        }
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    /// Read the status file once.
    pub fn poll(&mut self) -> Poll {
        let raw = match fs::read_to_string(&self.status_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let first = !self.warned;
                self.warned = true;
                return Poll::Missing { first };
            }
            Err(e) => return Poll::Invalid(e.to_string()),
        };
        self.warned = false;

        let status: LoopStatus = match serde_json::from_str(&raw) {
            Ok(status) => status,
            Err(e) => return Poll::Invalid(e.to_string()),
        };
        let line = format_monitor_line(&status);
        if self.last_line.as_deref() == Some(line.as_str()) {
            return Poll::Unchanged;
        }
        self.last_line = Some(line.clone());
        Poll::Changed(line)
    }

    /// Poll forever (or once), printing changes to stdout and notices to stderr.
    pub async fn run(&mut self, interval: Duration, once: bool) -> Result<()> {
        log::info!("Monitoring {} every {:?}", self.status_path.display(), interval);
        loop {
            match self.poll() {
                Poll::Missing { first: true } => {
                    eprintln!("waiting for {} (run loopr loop)", self.status_path.display());
                }
                Poll::Changed(line) => println!("{}", line),
                Poll::Invalid(message) => eprintln!("monitor read error: {}", message),
                Poll::Missing { first: false } | Poll::Unchanged => {}
            }
            if once {
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }
    }
}
