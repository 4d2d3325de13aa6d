//! Per-key window state and the result of a rate limit check.

use serde::Serialize;
use std::time::Duration;

/// Request count for one key within its current window.
///
/// `count` is at least 1 for as long as the entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Requests admitted in the current window
    pub count: u32,
    /// When the current window ends, in Unix epoch milliseconds
    pub reset_at: u64,
}

impl RateLimitEntry {
    /// Open a fresh window at `now` holding the request that opened it.
    pub fn open(now: u64, window: Duration) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(u64::try_from(window.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Whether the window has ended. Expired entries are treated as absent
    /// regardless of whether the sweep has removed them yet.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.reset_at
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The configured limit for the window
    pub limit: u32,
    /// Requests left in the window after this one
    pub remaining: u32,
    /// When the window ends, in Unix epoch milliseconds
    pub reset_at: u64,
}

impl RateLimitDecision {
    /// Seconds a client should wait before retrying, rounded up.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).div_ceil(1000)
    }
}
