//! Loopr - a loop controller for autonomous coding agents
//!
//! Loopr invokes an external agent repeatedly against a working root. Each
//! run ends with a `LOOPR_STATUS` block; the controller throttles calls per
//! hour, persists iteration state across restarts, and trips circuit
//! breakers when the agent is done, blocked, or stuck.

pub mod breaker;
pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod id;
pub mod monitor;
pub mod prompt;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod workspace;

pub use error::{LooprError, Result};
