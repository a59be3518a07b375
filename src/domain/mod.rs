//! Domain types for Loopr
//!
//! This module contains all core domain types:
//! - LooprStatus: one parsed status block
//! - LoopState: durable counters that survive restarts
//! - LoopStatus: the snapshot written for monitors
//! - LoopPhase / ExitReason: what the breaker evaluator decides
//! - LoopEvent: progress notifications from the driver

pub mod event;
pub mod loop_state;
pub mod outcome;
pub mod snapshot;
pub mod status;

pub use event::{LoopEvent, LoopEventKind};
pub use loop_state::LoopState;
pub use outcome::{Breaker, DisplayState, ExitReason, LoopPhase};
pub use snapshot::LoopStatus;
pub use status::{LooprStatus, StatusWord};
