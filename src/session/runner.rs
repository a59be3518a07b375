//! Process-backed agent runner.
//!
//! Output is captured through `script(1)` when available so the agent sees an
//! interactive terminal. Without it, stdout and stderr are piped and teed into
//! the transcript, and the agent runs in its own process group so a timeout
//! takes down everything it started.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::metadata::{EndRecord, StartRecord, allocate_session, append_record, format_ts, prompt_sha256, shell_join};
use super::{AgentRequest, AgentRunner, Session, SessionRun};
use crate::config::AgentConfig;
use crate::error::{LooprError, Result};
use crate::workspace::{ControllerPaths, git_info};

/// How long tee tasks may keep reading after the agent has been reaped.
const TEE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// How long script(1) gets after SIGTERM to restore the terminal and exit.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// How the child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outcome {
    exit_code: i32,
    error: Option<String>,
    timed_out: bool,
}

/// Runs the configured agent binary as a child process.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    agent: AgentConfig,
    controller_dir: String,
}

impl ProcessRunner {
    pub fn new(agent: AgentConfig, controller_dir: impl Into<String>) -> Self {
        Self {
            agent,
            controller_dir: controller_dir.into(),
        }
    }

    /// Full argv: binary, configured args, root flag, passthrough args, prompt.
    pub fn command_line(&self, request: &AgentRequest) -> Vec<String> {
        let mut command = Vec::with_capacity(self.agent.args.len() + request.args.len() + 4);
        command.push(self.agent.binary.clone());
        command.extend(self.agent.args.iter().cloned());
        if !self.agent.root_flag.is_empty() {
            command.push(self.agent.root_flag.clone());
            command.push(request.root.display().to_string());
        }
        command.extend(request.args.iter().cloned());
        command.push(request.prompt.clone());
        command
    }

    async fn execute(&self, session: &Session, timeout: Option<Duration>) -> Outcome {
        let script = if self.agent.use_pty && cfg!(target_os = "linux") {
            find_on_path("script")
        } else {
            None
        };
        let result = match script {
            Some(script) => self.execute_pty(&script, session, timeout).await,
            None => self.execute_piped(session, timeout).await,
        };
        match result {
            Ok(outcome) => outcome,
            Err(e) => Outcome {
                exit_code: 1,
                error: Some(e.to_string()),
                timed_out: false,
            },
        }
    }

    async fn execute_pty(&self, script: &Path, session: &Session, timeout: Option<Duration>) -> Result<Outcome> {
        log::debug!("Running agent under {}", script.display());
        let mut child = Command::new(script)
            .arg("-q")
            .arg("-e")
            .arg("-f")
            .arg("-c")
            .arg(shell_join(&session.command))
            .arg(&session.transcript_path)
            .current_dir(&session.root)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LooprError::Agent(format!("failed to start {}: {}", script.display(), e)))?;
        // script stays in the foreground group; the pty hangs up the agent's tree when it dies.
        wait_with_timeout(&mut child, timeout, false).await
    }

    async fn execute_piped(&self, session: &Session, timeout: Option<Duration>) -> Result<Outcome> {
        let Some((program, args)) = session.command.split_first() else {
            return Err(LooprError::Agent("empty agent command".to_string()));
        };
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&session.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LooprError::Agent(format!("failed to start {}: {}", program, e)))?;

        let transcript = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&session.transcript_path)
            .await?;
        let transcript = Arc::new(Mutex::new(transcript));

        let mut tees = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            tees.push(tee(stdout, tokio::io::stdout(), Arc::clone(&transcript)));
        }
        if let Some(stderr) = child.stderr.take() {
            tees.push(tee(stderr, tokio::io::stderr(), Arc::clone(&transcript)));
        }

        let outcome = wait_with_timeout(&mut child, timeout, true).await;
        drain_tees(tees).await;
        outcome
    }
}

#[async_trait]
impl AgentRunner for ProcessRunner {
    async fn run(&self, request: &AgentRequest) -> Result<SessionRun> {
        let paths = ControllerPaths::new(&request.root, &self.controller_dir);
        let started = Utc::now();
        let allocated = allocate_session(&paths.transcripts_dir(), started)?;

        let session = Session {
            root: request.root.clone(),
            id: allocated.id,
            transcript_path: allocated.transcript_path,
            metadata_path: allocated.metadata_path,
            command: self.command_line(request),
            started,
        };

        let git = git_info(&request.root).await;
        let start = StartRecord {
            event: "start",
            ts: format_ts(started),
            cwd: std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            cmd: session.command.clone(),
            log: session.transcript_file_name(),
            loopr_version: env!("CARGO_PKG_VERSION"),
            repo_root: request.root.display().to_string(),
            repo_id: paths.read_repo_id(),
            prompt_sha256: prompt_sha256(&request.prompt),
            git_commit: git.as_ref().map(|g| g.commit.clone()),
            git_dirty: git.as_ref().and_then(|g| g.dirty),
        };
        append_record(&session.metadata_path, &start)
            .map_err(|e| LooprError::Agent(format!("write session metadata: {}", e)))?;

        log::info!("Starting session {}", session.id);
        let outcome = self.execute(&session, request.timeout).await;

        if let Err(e) = append_record(&session.metadata_path, &EndRecord::new(outcome.exit_code, outcome.timed_out)) {
            log::warn!("Failed to write end record for {}: {}", session.id, e);
        }
        log::info!(
            "Session {} finished with exit code {}{}",
            session.id,
            outcome.exit_code,
            if outcome.timed_out { " (timed out)" } else { "" }
        );

        Ok(SessionRun {
            exit_code: outcome.exit_code,
            session,
            error: outcome.error,
            timed_out: outcome.timed_out,
        })
    }
}

/// Wait for `child`, killing it once `timeout` elapses.
///
/// With `group` set the child leads its own process group, and the whole
/// group is killed. Otherwise the child gets SIGTERM and a short grace
/// period before SIGKILL.
async fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>, group: bool) -> Result<Outcome> {
    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    match waited {
        Some(status) => Ok(outcome_from_status(status?)),
        None => {
            let limit = timeout.unwrap_or_default();
            log::warn!("Agent exceeded {}s timeout, killing", limit.as_secs());
            match child.id() {
                Some(pid) if group => signal_process(pid, libc::SIGKILL, true),
                Some(pid) => {
                    signal_process(pid, libc::SIGTERM, false);
                    let _ = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await;
                }
                None => {}
            }
            let _ = child.kill().await;
            let exit_code = child.wait().await.ok().and_then(|s| s.code()).unwrap_or(-1);
            Ok(Outcome {
                exit_code,
                error: Some(format!("agent timed out after {}", humanize_duration(limit))),
                timed_out: true,
            })
        }
    }
}

fn outcome_from_status(status: ExitStatus) -> Outcome {
    let exit_code = status.code().unwrap_or(-1);
    let error = if status.success() {
        None
    } else {
        Some(format!("agent exited with {}", status))
    };
    Outcome {
        exit_code,
        error,
        timed_out: false,
    }
}

/// Deliver `signal` to `pid`, or to the process group it leads.
fn signal_process(pid: u32, signal: libc::c_int, group: bool) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill and killpg take plain integers and only deliver a signal.
    let rc = unsafe {
        if group {
            libc::killpg(pid, signal)
        } else {
            libc::kill(pid, signal)
        }
    };
    if rc != 0 {
        log::debug!("signal {} to {} failed: {}", signal, pid, std::io::Error::last_os_error());
    }
}

/// Let the tee tasks flush what is already buffered, then stop them.
///
/// A background process left behind by the agent can hold the pipes open
/// long after the agent itself has exited.
async fn drain_tees(tees: Vec<JoinHandle<()>>) {
    let deadline = Instant::now() + TEE_DRAIN_GRACE;
    for mut handle in tees {
        if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
            log::warn!("Agent output still open after exit, detaching transcript capture");
            handle.abort();
        }
    }
}

/// Copy `reader` to both `console` and the shared transcript.
fn tee<R, W>(mut reader: R, mut console: W, transcript: Arc<Mutex<tokio::fs::File>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 8192];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let _ = console.write_all(&buf[..n]).await;
            let _ = console.flush().await;
            let mut file = transcript.lock().await;
            if let Err(e) = file.write_all(&buf[..n]).await {
                log::warn!("Failed to write transcript: {}", e);
            }
        }
        let _ = transcript.lock().await.flush().await;
    })
}

/// Locate an executable on `PATH`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Render a duration as `1h2m3s`, dropping leading zero units.
pub fn humanize_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{}s", seconds),
        (0, _) => format!("{}m{}s", minutes, seconds),
        _ => format!("{}h{}m{}s", hours, minutes, seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_status_file;
    use std::fs;
    use tempfile::TempDir;

    /// Runs `sh -c <prompt>` so tests control the "agent" through the prompt.
    fn shell_runner() -> ProcessRunner {
        ProcessRunner::new(
            AgentConfig {
                binary: "sh".to_string(),
                args: vec!["-c".to_string()],
                root_flag: String::new(),
                use_pty: false,
            },
            ".loopr",
        )
    }

    fn request(root: &Path, prompt: &str, timeout: Option<Duration>) -> AgentRequest {
        AgentRequest {
            root: root.to_path_buf(),
            args: Vec::new(),
            prompt: prompt.to_string(),
            timeout,
        }
    }

    fn metadata_lines(run: &SessionRun) -> Vec<serde_json::Value> {
        fs::read_to_string(&run.session.metadata_path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_command_line_order() {
        let runner = ProcessRunner::new(AgentConfig::default(), ".loopr");
        let request = AgentRequest {
            root: PathBuf::from("/repo"),
            args: vec!["--model".to_string(), "o3".to_string()],
            prompt: "do it".to_string(),
            timeout: None,
        };
        assert_eq!(
            runner.command_line(&request),
            vec!["codex", "exec", "--cd", "/repo", "--model", "o3", "do it"]
        );
    }

    #[tokio::test]
    async fn test_run_captures_transcript_and_metadata() {
        let temp = TempDir::new().unwrap();
        let runner = shell_runner();
        let prompt = "echo working; printf -- '---LOOPR_STATUS---\\nSTATUS: COMPLETE\\nEXIT_SIGNAL: true\\n---END_LOOPR_STATUS---\\n'";

        let run = runner.run(&request(temp.path(), prompt, None)).await.unwrap();
        assert_eq!(run.exit_code, 0);
        assert!(run.error.is_none());
        assert!(!run.timed_out);
        assert!(run.session.transcript_path.starts_with(temp.path().join(".loopr").join("transcripts")));

        let status = parse_status_file(&run.session.transcript_path).unwrap().unwrap();
        assert!(status.exit_signal);

        let records = metadata_lines(&run);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["event"], "start");
        assert_eq!(records[0]["log"], run.session.transcript_file_name());
        assert_eq!(records[0]["prompt_sha256"], prompt_sha256(prompt));
        assert_eq!(records[1]["event"], "end");
        assert_eq!(records[1]["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let run = shell_runner().run(&request(temp.path(), "exit 3", None)).await.unwrap();
        assert_eq!(run.exit_code, 3);
        assert!(run.error.as_deref().unwrap().contains("agent exited"));
        assert_eq!(metadata_lines(&run)[1]["exit_code"], 3);
    }

    #[tokio::test]
    async fn test_timeout_kills_agent() {
        let temp = TempDir::new().unwrap();
        let run = shell_runner()
            .run(&request(temp.path(), "sleep 5", Some(Duration::from_millis(200))))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(run.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(metadata_lines(&run)[1]["timed_out"], true);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new(
            AgentConfig {
                binary: "/nonexistent/agent-binary".to_string(),
                args: Vec::new(),
                root_flag: String::new(),
                use_pty: false,
            },
            ".loopr",
        );
        let run = runner.run(&request(temp.path(), "hi", None)).await.unwrap();
        assert_eq!(run.exit_code, 1);
        assert!(run.error.as_deref().unwrap().contains("failed to start"));
        assert_eq!(metadata_lines(&run).len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_kills_agent_children() {
        let temp = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let run = shell_runner()
            .run(&request(
                temp.path(),
                "(sleep 4; echo late); echo never",
                Some(Duration::from_millis(300)),
            ))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());

        let transcript = fs::read_to_string(&run.session.transcript_path).unwrap();
        assert!(!transcript.contains("late"));
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_runner() {
        let temp = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let run = shell_runner()
            .run(&request(temp.path(), "(sleep 4) & echo started", None))
            .await
            .unwrap();
        assert_eq!(run.exit_code, 0);
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());

        let transcript = fs::read_to_string(&run.session.transcript_path).unwrap();
        assert!(transcript.contains("started"));
    }

    /// Shell agent captured through script(1); `None` where it is unavailable.
    fn pty_runner() -> Option<ProcessRunner> {
        if !cfg!(target_os = "linux") || find_on_path("script").is_none() {
            return None;
        }
        Some(ProcessRunner::new(
            AgentConfig {
                binary: "sh".to_string(),
                args: vec!["-c".to_string()],
                root_flag: String::new(),
                use_pty: true,
            },
            ".loopr",
        ))
    }

    #[tokio::test]
    async fn test_pty_captures_status_block() {
        let Some(runner) = pty_runner() else {
            return;
        };
        let temp = TempDir::new().unwrap();
        let prompt = "echo 'it''s working'; printf -- '---LOOPR_STATUS---\\nSTATUS: COMPLETE\\nEXIT_SIGNAL: true\\nFILES_MODIFIED: 2\\n---END_LOOPR_STATUS---\\n'";

        let run = runner.run(&request(temp.path(), prompt, None)).await.unwrap();
        assert_eq!(run.exit_code, 0);
        assert!(!run.timed_out);
        assert_eq!(run.session.command[0], "sh");

        let status = parse_status_file(&run.session.transcript_path).unwrap().unwrap();
        assert!(status.exit_signal);
        assert_eq!(status.files_modified, Some(2));
        assert_eq!(metadata_lines(&run)[1]["event"], "end");
    }

    #[tokio::test]
    async fn test_pty_timeout_is_enforced() {
        let Some(runner) = pty_runner() else {
            return;
        };
        let temp = TempDir::new().unwrap();
        let started = std::time::Instant::now();
        let run = runner
            .run(&request(temp.path(), "sleep 10", Some(Duration::from_millis(300))))
            .await
            .unwrap();
        assert!(run.timed_out);
        assert!(run.error.as_deref().unwrap().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
        assert_eq!(metadata_lines(&run)[1]["timed_out"], true);
    }

    #[test]
    fn test_humanize_duration() {
        assert_eq!(humanize_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(humanize_duration(Duration::from_secs(42)), "42s");
        assert_eq!(humanize_duration(Duration::from_secs(15 * 60)), "15m0s");
        assert_eq!(humanize_duration(Duration::from_secs(3725)), "1h2m5s");
    }
}
