//! Session files: allocation, metadata records and command rendering.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{LooprError, Result};
use crate::id::{generate_session_suffix, session_id};
use crate::storage::append_line;

/// Attempts made to find an unused session name.
pub const MAX_SESSION_ATTEMPTS: usize = 10;

/// Freshly reserved session files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub id: String,
    pub transcript_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Reserve `<id>.log` and `<id>.jsonl` in `dir`.
///
/// Both files are created with create-new semantics so two sessions can never
/// share a transcript.
pub fn allocate_session(dir: &Path, started: DateTime<Utc>) -> Result<SessionPaths> {
    allocate_session_with(dir, started, generate_session_suffix)
}

pub(crate) fn allocate_session_with(
    dir: &Path,
    started: DateTime<Utc>,
    mut suffix: impl FnMut() -> String,
) -> Result<SessionPaths> {
    fs::create_dir_all(dir).map_err(|e| LooprError::Agent(format!("create {}: {}", dir.display(), e)))?;

    for _ in 0..MAX_SESSION_ATTEMPTS {
        let id = session_id(started, &suffix());
        let transcript_path = dir.join(format!("{}.log", id));
        let metadata_path = dir.join(format!("{}.jsonl", id));

        if !create_new(&transcript_path)? {
            continue;
        }
        if !create_new(&metadata_path)? {
            let _ = fs::remove_file(&transcript_path);
            continue;
        }
        return Ok(SessionPaths {
            id,
            transcript_path,
            metadata_path,
        });
    }
    Err(LooprError::Agent("unable to allocate unique session paths".to_string()))
}

/// Create an empty file; `Ok(false)` when it already exists.
fn create_new(path: &Path) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(LooprError::Agent(format!("create {}: {}", path.display(), e))),
    }
}

/// First metadata record of a session.
#[derive(Debug, Clone, Serialize)]
pub struct StartRecord {
    pub event: &'static str,
    pub ts: String,
    pub cwd: String,
    pub cmd: Vec<String>,
    pub log: String,
    pub loopr_version: &'static str,
    pub repo_root: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
    pub prompt_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_dirty: Option<bool>,
}

/// Last metadata record of a session, written whatever the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct EndRecord {
    pub event: &'static str,
    pub ts: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl EndRecord {
    pub fn new(exit_code: i32, timed_out: bool) -> Self {
        Self {
            event: "end",
            ts: format_ts(Utc::now()),
            exit_code,
            timed_out,
        }
    }
}

/// Append one JSON record to a metadata file.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    append_line(path, &serde_json::to_string(record)?)
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Hex SHA-256 of the prompt text.
pub fn prompt_sha256(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// Render argv as a POSIX shell command line.
///
/// Arguments made only of shell-safe characters pass through; the rest are
/// single-quoted.
pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            if arg.is_empty() {
                "''".to_string()
            } else if arg.chars().all(is_shell_safe) {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', "'\\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | '=' | ':' | ',' | '+' | '@' | '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 13, 5, 9).unwrap()
    }

    #[test]
    fn test_allocate_session_names() {
        let temp = TempDir::new().unwrap();
        let paths = allocate_session(temp.path(), started()).unwrap();
        assert!(paths.id.starts_with("session-20260402-130509-"));
        assert!(paths.transcript_path.exists());
        assert!(paths.metadata_path.exists());
        assert_eq!(paths.transcript_path.extension().unwrap(), "log");
        assert_eq!(paths.metadata_path.extension().unwrap(), "jsonl");
    }

    #[test]
    fn test_allocate_skips_collisions() {
        let temp = TempDir::new().unwrap();
        let mut suffixes = vec!["bbbbbb", "aaaaaa", "aaaaaa"];
        let first = allocate_session_with(temp.path(), started(), || suffixes.pop().unwrap().to_string()).unwrap();
        let second = allocate_session_with(temp.path(), started(), || suffixes.pop().unwrap().to_string()).unwrap();
        assert!(first.id.ends_with("aaaaaa"));
        assert!(second.id.ends_with("bbbbbb"));
    }

    #[test]
    fn test_allocate_gives_up() {
        let temp = TempDir::new().unwrap();
        allocate_session_with(temp.path(), started(), || "ffffff".to_string()).unwrap();
        let err = allocate_session_with(temp.path(), started(), || "ffffff".to_string()).unwrap_err();
        assert!(matches!(err, LooprError::Agent(_)));
    }

    #[test]
    fn test_shell_join() {
        let args: Vec<String> = ["codex", "exec", "", "two words", "it's"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(shell_join(&args), r#"codex exec '' 'two words' 'it'\''s'"#);
        let args = vec!["--cd".to_string(), "/repo/a".to_string(), "a;b $HOME".to_string()];
        assert_eq!(shell_join(&args), "--cd /repo/a 'a;b $HOME'");
    }

    #[test]
    fn test_prompt_sha256() {
        assert_eq!(
            prompt_sha256("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_append_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meta.jsonl");
        append_record(&path, &EndRecord::new(2, true)).unwrap();
        let line = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(value["event"], "end");
        assert_eq!(value["exit_code"], 2);
        assert_eq!(value["timed_out"], true);
    }
}
