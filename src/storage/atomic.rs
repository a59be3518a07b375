//! Crash-safe file writes.
//!
//! Every controller file is replaced through write-temp-then-rename so that a
//! crash leaves either the old or the new content, never a torn file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{LooprError, Result};
use crate::id::generate_session_suffix;

/// Atomically replace `path` with `data`, creating parent directories.
pub fn write_file_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| LooprError::Storage(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| LooprError::Storage(format!("create dir {}: {}", dir.display(), e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}.tmp-{}", file_name, generate_session_suffix()));

    let result = write_and_sync(&tmp_path, data).and_then(|()| {
        fs::rename(&tmp_path, path)
            .map_err(|e| LooprError::Storage(format!("rename temp for {}: {}", path.display(), e)))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_and_sync(tmp_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(tmp_path)
        .map_err(|e| LooprError::Storage(format!("create temp {}: {}", tmp_path.display(), e)))?;
    file.write_all(data)
        .map_err(|e| LooprError::Storage(format!("write temp {}: {}", tmp_path.display(), e)))?;
    file.sync_all()
        .map_err(|e| LooprError::Storage(format!("sync temp {}: {}", tmp_path.display(), e)))?;
    Ok(())
}

/// Serialize `value` as pretty JSON with a trailing newline and write it atomically.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');
    write_file_atomic(path, &data)
}

/// Append one line to a log file, creating it and its parent as needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| LooprError::Storage(format!("create dir {}: {}", dir.display(), e)))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LooprError::Storage(format!("open {}: {}", path.display(), e)))?;
    writeln!(file, "{}", line).map_err(|e| LooprError::Storage(format!("append {}: {}", path.display(), e)))?;
    Ok(())
}
