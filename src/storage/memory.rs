//! In-memory state store for tests and dry runs.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::traits::{LoopLogEntry, RateLimitRecord, StateStore};
use crate::domain::{LoopState, LoopStatus};
use crate::error::{LooprError, Result};

#[derive(Debug, Default)]
struct Inner {
    state: Option<LoopState>,
    rate_limit: RateLimitRecord,
    status: Option<LoopStatus>,
    /// Every snapshot written, in order
    status_history: Vec<LoopStatus>,
    log: Vec<String>,
}

/// State store that keeps everything behind a mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> Result<T> {
        let mut inner = self.inner.lock().map_err(|e| LooprError::Storage(e.to_string()))?;
        Ok(f(&mut inner))
    }

    /// All snapshots written so far.
    pub fn status_history(&self) -> Result<Vec<LoopStatus>> {
        self.with(|inner| inner.status_history.clone())
    }

    /// All log lines appended so far.
    pub fn log_lines(&self) -> Result<Vec<String>> {
        self.with(|inner| inner.log.clone())
    }
}

impl StateStore for MemoryStore {
    fn load_state(&self) -> Result<LoopState> {
        self.with(|inner| inner.state.clone().unwrap_or_default())
    }

    fn save_state(&self, state: &LoopState) -> Result<()> {
        self.with(|inner| inner.state = Some(state.clone()))
    }

    fn load_rate_limit(&self) -> Result<RateLimitRecord> {
        self.with(|inner| inner.rate_limit)
    }

    fn save_rate_limit(&self, call_count: u32, window_start: DateTime<Utc>) -> Result<()> {
        self.with(|inner| {
            inner.rate_limit = RateLimitRecord {
                call_count: Some(call_count),
                window_start: Some(window_start),
            }
        })
    }

    fn save_call_count(&self, call_count: u32) -> Result<()> {
        self.with(|inner| inner.rate_limit.call_count = Some(call_count))
    }

    fn write_status(&self, status: &LoopStatus) -> Result<()> {
        self.with(|inner| {
            inner.status = Some(status.clone());
            inner.status_history.push(status.clone());
        })
    }

    fn read_status(&self) -> Result<Option<LoopStatus>> {
        self.with(|inner| inner.status.clone())
    }

    fn append_log(&self, entry: &LoopLogEntry) -> Result<()> {
        self.with(|inner| inner.log.push(entry.to_line()))
    }

    fn reset(&self) -> Result<()> {
        self.with(|inner| {
            inner.state = None;
            inner.rate_limit = RateLimitRecord::default();
        })
    }
}
