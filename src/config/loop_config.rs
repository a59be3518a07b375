//! Per-root loop configuration.
//!
//! Read once per run from `<root>/.loopr/config`, a line-oriented `KEY=VALUE`
//! file. `#` starts a comment, either on its own line or trailing a value.
//! Unknown keys and out-of-range values abort the run before any invocation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{LooprError, Result};

/// Breaker thresholds and budgets for one controller run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// Agent invocations allowed per rolling hour.
    pub max_calls_per_hour: u32,

    /// Per-invocation timeout in minutes.
    pub codex_timeout_minutes: u32,

    /// Iteration cap (0 = unbounded).
    pub max_iterations: u32,

    /// Consecutive completion signals required before trusting completion.
    pub max_consecutive_done_signals: u32,

    /// Consecutive iterations without file changes before the breaker opens.
    pub max_no_progress: u32,

    /// Consecutive repeats of one error signature before the breaker opens.
    pub max_same_error: u32,

    /// Consecutive test-only iterations before the breaker opens.
    pub max_consecutive_test_loops: u32,

    /// Consecutive iterations without a status block before the breaker opens.
    pub max_missing_status: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_calls_per_hour: 100,
            codex_timeout_minutes: 15,
            max_iterations: 50,
            max_consecutive_done_signals: 2,
            max_no_progress: 3,
            max_same_error: 5,
            max_consecutive_test_loops: 3,
            max_missing_status: 2,
        }
    }
}

/// Keys accepted in the config file, in documentation order.
pub const LOOP_CONFIG_KEYS: &[&str] = &[
    "MAX_CALLS_PER_HOUR",
    "CODEX_TIMEOUT_MINUTES",
    "MAX_ITERATIONS",
    "MAX_CONSECUTIVE_DONE_SIGNALS",
    "MAX_NO_PROGRESS",
    "MAX_SAME_ERROR",
    "MAX_CONSECUTIVE_TEST_LOOPS",
    "MAX_MISSING_STATUS",
];

impl LoopConfig {
    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                log::debug!("Loading loop config from {}", path.display());
                Self::parse(&content)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No loop config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Parse `KEY=VALUE` content on top of the defaults.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();
        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(LooprError::config(
                    line_no,
                    format!("invalid config line {:?} (expected KEY=VALUE)", line),
                ));
            };
            let key = key.trim();
            let value = match value.find('#') {
                Some(hash) => value[..hash].trim(),
                None => value.trim(),
            };
            if value.is_empty() {
                return Err(LooprError::config(line_no, format!("empty value for {}", key)));
            }
            config.apply(key, value, line_no)?;
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str, line_no: usize) -> Result<()> {
        let (slot, allow_zero) = match key {
            "MAX_CALLS_PER_HOUR" => (&mut self.max_calls_per_hour, false),
            "CODEX_TIMEOUT_MINUTES" => (&mut self.codex_timeout_minutes, false),
            "MAX_ITERATIONS" => (&mut self.max_iterations, true),
            "MAX_CONSECUTIVE_DONE_SIGNALS" => (&mut self.max_consecutive_done_signals, false),
            "MAX_NO_PROGRESS" => (&mut self.max_no_progress, false),
            "MAX_SAME_ERROR" => (&mut self.max_same_error, false),
            "MAX_CONSECUTIVE_TEST_LOOPS" => (&mut self.max_consecutive_test_loops, false),
            "MAX_MISSING_STATUS" => (&mut self.max_missing_status, false),
            _ => {
                return Err(LooprError::config(line_no, format!("unknown config key {:?}", key)));
            }
        };
        let parsed: i64 = value
            .parse()
            .map_err(|_| LooprError::config(line_no, format!("invalid int for {}: {:?}", key, value)))?;
        if allow_zero && parsed < 0 {
            return Err(LooprError::config(line_no, format!("{} must be >= 0", key)));
        }
        if !allow_zero && parsed <= 0 {
            return Err(LooprError::config(line_no, format!("{} must be > 0", key)));
        }
        *slot = u32::try_from(parsed)
            .map_err(|_| LooprError::config(line_no, format!("{} is out of range: {}", key, parsed)))?;
        Ok(())
    }

    /// Per-invocation timeout.
    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.codex_timeout_minutes) * 60)
    }

    /// True when the iteration cap is set and `iteration` has reached it.
    pub fn iterations_exhausted(&self, iteration: u64) -> bool {
        self.max_iterations > 0 && iteration >= u64::from(self.max_iterations)
    }
}
