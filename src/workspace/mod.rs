//! Working-root layout and repository helpers.
//!
//! A working root is the directory the agent runs in. The controller keeps
//! its private files in `<root>/.loopr/` (name configurable).

mod git;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::config::LOOP_CONFIG_FILE;
use crate::error::{LooprError, Result};
use crate::storage::write_file_atomic;

pub use git::{GitInfo, git_change_count, git_info};

/// Name of the optional repository identifier file inside the controller directory.
pub const REPO_ID_FILE: &str = "repo-id";

/// Paths of one working root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPaths {
    root: PathBuf,
    dir: PathBuf,
}

impl ControllerPaths {
    pub fn new(root: impl Into<PathBuf>, dir_name: &str) -> Self {
        let root = root.into();
        let dir = root.join(dir_name);
        Self { root, dir }
    }

    /// The working root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The controller-private directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `KEY=VALUE` loop config file.
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(LOOP_CONFIG_FILE)
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.dir.join("transcripts")
    }

    pub fn repo_id_path(&self) -> PathBuf {
        self.dir.join(REPO_ID_FILE)
    }

    /// Repository identifier, when one has been recorded.
    pub fn read_repo_id(&self) -> Option<String> {
        fs::read_to_string(self.repo_id_path())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// Resolve the working root.
///
/// An explicit override must be an existing directory. Otherwise the nearest
/// ancestor of `start` (inclusive) holding a `dir_name` directory wins, falling
/// back to `start` itself.
pub fn resolve_root(start: &Path, override_root: Option<&Path>, dir_name: &str) -> Result<PathBuf> {
    if let Some(root) = override_root {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            start.join(root)
        };
        if !root.is_dir() {
            return Err(LooprError::InvalidState(format!(
                "loopr root {} is not a directory",
                root.display()
            )));
        }
        return Ok(root);
    }

    for candidate in start.ancestors() {
        if candidate.join(dir_name).is_dir() {
            log::debug!("Found controller directory under {}", candidate.display());
            return Ok(candidate.to_path_buf());
        }
    }
    Ok(start.to_path_buf())
}

/// Make sure the shared handoff note exists, returning its path.
///
/// The note belongs to the agent; an existing file is never touched.
pub fn ensure_handoff(root: &Path, relative: &Path) -> Result<PathBuf> {
    let path = root.join(relative);
    if path.exists() {
        return Ok(path);
    }
    let header = format!(
        "# Loopr Handoff\n\nInitialized: {}\n\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    write_file_atomic(&path, header.as_bytes())?;
    log::info!("Created handoff note at {}", path.display());
    Ok(path)
}
