//! Storage layer for Loopr.
//!
//! The controller persists its counters, rate-limit budget, snapshot and log
//! behind the [`StateStore`] trait. [`FileStore`] is the on-disk layout under
//! `.loopr/`; [`MemoryStore`] backs tests.

mod atomic;
mod file;
mod memory;
mod traits;

pub use atomic::{append_line, write_file_atomic, write_json_atomic};
pub use file::{CALL_COUNT_FILE, FileStore, LAST_RESET_FILE, LOG_FILE, STATE_FILE, STATUS_FILE};
pub use memory::MemoryStore;
pub use traits::{LoopLogEntry, RateLimitRecord, StateStore, sanitize_value};
