//! Invocation scheduling.
//!
//! Agent invocations are paced by an hourly call budget persisted alongside
//! the loop state. See [`RateLimiter`].

mod rate_limit;

pub use rate_limit::{Budget, RateLimiter, window};
