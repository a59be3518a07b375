//! Filesystem-backed state store.
//!
//! Layout under the controller directory:
//!
//! ```text
//! .loopr/
//!   loop-state.json   durable counters
//!   status.json       snapshot for monitors
//!   loop.log          one tab-separated line per iteration
//!   .call_count       calls in the current window
//!   .last_reset       window start, RFC3339
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use super::atomic::{append_line, write_file_atomic, write_json_atomic};
use super::traits::{LoopLogEntry, RateLimitRecord, StateStore};
use crate::domain::{LoopState, LoopStatus};
use crate::error::{LooprError, Result};

pub const STATE_FILE: &str = "loop-state.json";
pub const STATUS_FILE: &str = "status.json";
pub const LOG_FILE: &str = "loop.log";
pub const CALL_COUNT_FILE: &str = ".call_count";
pub const LAST_RESET_FILE: &str = ".last_reset";

/// State store rooted at a controller directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| LooprError::Storage(format!("create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    fn call_count_path(&self) -> PathBuf {
        self.dir.join(CALL_COUNT_FILE)
    }

    fn last_reset_path(&self) -> PathBuf {
        self.dir.join(LAST_RESET_FILE)
    }
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LooprError::Storage(format!("read {}: {}", path.display(), e))),
    }
}

fn remove_optional(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LooprError::Storage(format!("remove {}: {}", path.display(), e))),
    }
}

impl StateStore for FileStore {
    fn load_state(&self) -> Result<LoopState> {
        let path = self.state_path();
        match read_optional(&path)? {
            Some(content) if !content.trim().is_empty() => serde_json::from_str(&content)
                .map_err(|e| LooprError::Storage(format!("parse {}: {}", path.display(), e))),
            _ => Ok(LoopState::default()),
        }
    }

    fn save_state(&self, state: &LoopState) -> Result<()> {
        write_json_atomic(&self.state_path(), state)
    }

    fn load_rate_limit(&self) -> Result<RateLimitRecord> {
        // An unreadable count is treated as zero; an unreadable timestamp is not.
        let call_count = read_optional(&self.call_count_path())?.map(|s| s.trim().parse().unwrap_or(0));

        let path = self.last_reset_path();
        let window_start = match read_optional(&path)? {
            Some(content) => Some(
                DateTime::parse_from_rfc3339(content.trim())
                    .map_err(|e| LooprError::Storage(format!("parse {}: {}", path.display(), e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(RateLimitRecord {
            call_count,
            window_start,
        })
    }

    fn save_rate_limit(&self, call_count: u32, window_start: DateTime<Utc>) -> Result<()> {
        self.save_call_count(call_count)?;
        let stamp = window_start.to_rfc3339_opts(SecondsFormat::Nanos, true);
        write_file_atomic(&self.last_reset_path(), format!("{}\n", stamp).as_bytes())
    }

    fn save_call_count(&self, call_count: u32) -> Result<()> {
        write_file_atomic(&self.call_count_path(), format!("{}\n", call_count).as_bytes())
    }

    fn write_status(&self, status: &LoopStatus) -> Result<()> {
        write_json_atomic(&self.status_path(), status)
    }

    fn read_status(&self) -> Result<Option<LoopStatus>> {
        match read_optional(&self.status_path())? {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn append_log(&self, entry: &LoopLogEntry) -> Result<()> {
        append_line(&self.log_path(), &entry.to_line())
    }

    fn reset(&self) -> Result<()> {
        remove_optional(&self.state_path())?;
        remove_optional(&self.call_count_path())?;
        remove_optional(&self.last_reset_path())?;
        log::info!("Reset loop state in {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DisplayState;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join(".loopr")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_missing_state_defaults() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.load_state().unwrap(), LoopState::default());
    }

    #[test]
    fn test_state_persists() {
        let (store, _temp) = create_test_store();
        let state = LoopState {
            iteration: 3,
            no_progress_count: 2,
            ..Default::default()
        };
        store.save_state(&state).unwrap();

        let reopened = FileStore::open(store.dir()).unwrap();
        assert_eq!(reopened.load_state().unwrap(), state);
    }

    #[test]
    fn test_corrupt_state_is_error() {
        let (store, _temp) = create_test_store();
        fs::write(store.state_path(), "{not json").unwrap();
        assert!(matches!(store.load_state(), Err(LooprError::Storage(_))));
    }

    #[test]
    fn test_rate_limit_files() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.load_rate_limit().unwrap(), RateLimitRecord::default());

        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        store.save_rate_limit(4, start).unwrap();
        assert_eq!(fs::read_to_string(store.dir().join(CALL_COUNT_FILE)).unwrap(), "4\n");

        let record = store.load_rate_limit().unwrap();
        assert_eq!(record.call_count, Some(4));
        assert_eq!(record.window_start, Some(start));

        store.save_call_count(5).unwrap();
        assert_eq!(store.load_rate_limit().unwrap().call_count, Some(5));
    }

    #[test]
    fn test_garbage_call_count_reads_as_zero() {
        let (store, _temp) = create_test_store();
        fs::write(store.dir().join(CALL_COUNT_FILE), "lots\n").unwrap();
        assert_eq!(store.load_rate_limit().unwrap().call_count, Some(0));
    }

    #[test]
    fn test_garbage_last_reset_is_error() {
        let (store, _temp) = create_test_store();
        fs::write(store.dir().join(LAST_RESET_FILE), "yesterday\n").unwrap();
        assert!(store.load_rate_limit().is_err());
    }

    #[test]
    fn test_status_roundtrip() {
        let (store, _temp) = create_test_store();
        assert!(store.read_status().unwrap().is_none());

        let status = LoopStatus::new(DisplayState::Running, 1).with_summary("wrote parser");
        store.write_status(&status).unwrap();
        assert_eq!(store.read_status().unwrap(), Some(status));
    }

    #[test]
    fn test_append_log_lines() {
        let (store, _temp) = create_test_store();
        for iteration in 1..=2 {
            let status = LoopStatus::new(DisplayState::Running, iteration);
            store.append_log(&LoopLogEntry::from_status(&status)).unwrap();
        }
        let content = fs::read_to_string(store.log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\titer=2\tstate=running"));
    }

    #[test]
    fn test_reset_removes_state_and_budget() {
        let (store, _temp) = create_test_store();
        store
            .save_state(&LoopState {
                iteration: 9,
                ..Default::default()
            })
            .unwrap();
        store.save_rate_limit(2, Utc::now()).unwrap();
        store.write_status(&LoopStatus::new(DisplayState::Complete, 9)).unwrap();

        store.reset().unwrap();
        assert_eq!(store.load_state().unwrap().iteration, 0);
        assert!(!store.load_rate_limit().unwrap().is_complete());
        // The snapshot stays for monitors until the next run overwrites it.
        assert!(store.read_status().unwrap().is_some());

        // Resetting twice is fine.
        store.reset().unwrap();
    }
}
