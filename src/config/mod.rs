//! Configuration system for Loopr.
//!
//! Two layers:
//! 1. Global config (~/.config/loopr/loopr.yml or .loopr.yml): agent command,
//!    monitor interval, controller layout
//! 2. Loop config (<root>/.loopr/config): rate budget and breaker thresholds

pub use self::global::{AgentConfig, ControllerConfig, GlobalConfig, MonitorConfig};
pub use self::loop_config::{LOOP_CONFIG_KEYS, LoopConfig};

mod global;
mod loop_config;

/// Default name of the controller-private directory.
pub const DEFAULT_CONTROLLER_DIR: &str = ".loopr";

/// Name of the loop config file inside the controller directory.
pub const LOOP_CONFIG_FILE: &str = "config";
