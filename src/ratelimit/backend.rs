//! Rate limiter trait the HTTP layer is written against.

use super::entry::RateLimitDecision;
use super::policy::RateLimitPolicy;

/// Trait for rate limiter implementations.
///
/// [`RateLimiter`](super::RateLimiter) keeps its counts in process memory,
/// so every instance of the service enforces its policies independently.
/// A counter shared between instances would be another implementation of
/// this trait.
pub trait RateLimiterBackend: Send + Sync {
    /// Count a request for `key` against `policy` and report the outcome.
    fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision;

    /// The backend's notion of the current time, in Unix epoch milliseconds.
    ///
    /// Retry hints are computed against this so they agree with `reset_at`.
    fn now_millis(&self) -> u64;
}
