//! Hourly call budget for agent invocations.
//!
//! The budget is a fixed one-hour window: once an hour has passed since the
//! window started, the count resets to zero and the window restarts. Both
//! halves are persisted so the budget survives controller restarts.
//!
//! The limiter never sleeps. [`RateLimiter::acquire_at`] reports how long the
//! caller must wait; the caller sleeps and acquires again.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::storage::StateStore;

/// Length of one budget window.
pub fn window() -> TimeDelta {
    TimeDelta::hours(1)
}

/// Result of one budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Calls already made in the current window
    pub call_count: u32,
    /// When the current window ends
    pub next_reset_at: DateTime<Utc>,
    /// How long to wait before invoking; zero when budget is available
    pub wait: Duration,
}

impl Budget {
    pub fn is_available(&self) -> bool {
        self.wait.is_zero()
    }
}

/// Fixed-window call limiter backed by a [`StateStore`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    max_calls_per_hour: u32,
}

impl RateLimiter {
    pub fn new(max_calls_per_hour: u32) -> Self {
        Self { max_calls_per_hour }
    }

    pub fn max_calls_per_hour(&self) -> u32 {
        self.max_calls_per_hour
    }

    /// Check the budget against the wall clock.
    pub fn acquire(&self, store: &dyn StateStore) -> Result<Budget> {
        self.acquire_at(store, Utc::now())
    }

    /// Check the budget as of `now`.
    ///
    /// Missing counters are initialized and persisted. An elapsed window is
    /// reset and persisted. The count is never incremented here.
    pub fn acquire_at(&self, store: &dyn StateStore, now: DateTime<Utc>) -> Result<Budget> {
        let record = store.load_rate_limit()?;
        let mut call_count = record.call_count.unwrap_or(0);
        let mut window_start = record.window_start.unwrap_or(now);

        if !record.is_complete() {
            store.save_rate_limit(call_count, window_start)?;
        }

        if now - window_start >= window() {
            tracing::debug!(previous_count = call_count, "Rate limit window elapsed, resetting");
            call_count = 0;
            window_start = now;
            store.save_rate_limit(call_count, window_start)?;
        }

        let next_reset_at = window_start + window();
        let wait = if call_count >= self.max_calls_per_hour {
            let remaining = (next_reset_at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::warn!(
                call_count,
                max_calls_per_hour = self.max_calls_per_hour,
                wait_secs = remaining.as_secs(),
                "Hourly call budget exhausted"
            );
            remaining
        } else {
            Duration::ZERO
        };

        Ok(Budget {
            call_count,
            next_reset_at,
            wait,
        })
    }

    /// Count one completed invocation and return the new count.
    pub fn record_call(&self, store: &dyn StateStore) -> Result<u32> {
        let call_count = store.load_rate_limit()?.call_count.unwrap_or(0).saturating_add(1);
        store.save_call_count(call_count)?;
        Ok(call_count)
    }
}
