//! Global configuration.
//!
//! Loaded from an explicit path, `.loopr.yml`, or `~/.config/loopr/loopr.yml`.
//! These settings describe how to reach the agent and where controller files
//! live; breaker thresholds belong to [`LoopConfig`](super::LoopConfig).

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Global configuration for Loopr.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// How to invoke the agent.
    pub agent: AgentConfig,

    /// Monitor polling settings.
    pub monitor: MonitorConfig,

    /// Controller directory layout.
    pub controller: ControllerConfig,
}

impl GlobalConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .loopr.yml in current directory
    /// 3. ~/.config/loopr/loopr.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_config = PathBuf::from(".loopr.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .loopr.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .loopr.yml: {}", e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("loopr").join("loopr.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.agent.binary.trim().is_empty() {
            eyre::bail!("agent.binary cannot be empty");
        }
        if self.monitor.interval_ms == 0 {
            eyre::bail!("monitor.interval-ms must be > 0");
        }
        if self.controller.dir_name.trim().is_empty() {
            eyre::bail!("controller.dir-name cannot be empty");
        }
        Ok(())
    }
}

/// Agent invocation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Executable looked up on PATH.
    pub binary: String,

    /// Arguments placed before per-run passthrough arguments.
    pub args: Vec<String>,

    /// Flag used to hand the working root to the agent (empty disables it).
    #[serde(rename = "root-flag")]
    pub root_flag: String,

    /// Capture through a pseudo-terminal when `script` is available.
    #[serde(rename = "use-pty")]
    pub use_pty: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: "codex".to_string(),
            args: vec!["exec".to_string()],
            root_flag: "--cd".to_string(),
            use_pty: true,
        }
    }
}

/// Monitor polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Poll interval in milliseconds.
    #[serde(rename = "interval-ms")]
    pub interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

/// Controller directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Name of the controller-private directory under the working root.
    #[serde(rename = "dir-name")]
    pub dir_name: String,

    /// Handoff note path, relative to the working root.
    #[serde(rename = "handoff-path")]
    pub handoff_path: PathBuf,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            dir_name: crate::config::DEFAULT_CONTROLLER_DIR.to_string(),
            handoff_path: PathBuf::from("specs/.loopr/handoff.md"),
        }
    }
}
