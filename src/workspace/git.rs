//! Best-effort git queries. Every failure degrades to "unknown".

use std::path::Path;

use tokio::process::Command;

/// HEAD commit and worktree cleanliness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInfo {
    pub commit: String,
    /// `None` when `git status` could not be read
    pub dirty: Option<bool>,
}

async fn git_output(root: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").arg("-C").arg(root).args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Number of changed paths reported by `git status --porcelain`.
///
/// Returns 0 when git is missing or `root` is not a repository root.
pub async fn git_change_count(root: &Path) -> u32 {
    if !root.join(".git").exists() {
        return 0;
    }
    match git_output(root, &["status", "--porcelain"]).await {
        Some(out) => out.lines().filter(|line| !line.trim().is_empty()).count() as u32,
        None => 0,
    }
}

/// Current commit and dirty flag, when `root` is inside a repository.
pub async fn git_info(root: &Path) -> Option<GitInfo> {
    let commit = git_output(root, &["rev-parse", "HEAD"]).await?.trim().to_string();
    if commit.is_empty() {
        return None;
    }
    let dirty = git_output(root, &["status", "--porcelain"])
        .await
        .map(|out| !out.trim().is_empty());
    Some(GitInfo { commit, dirty })
}
