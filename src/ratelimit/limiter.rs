//! Core rate limiter implementation.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::backend::RateLimiterBackend;
use super::clock::{Clock, SystemClock};
use super::entry::{RateLimitDecision, RateLimitEntry};
use super::policy::RateLimitPolicy;

/// Fixed-window request counter keyed by client identifier.
///
/// Counts live in process memory only. They are lost on restart and are not
/// shared with other instances of the service.
pub struct RateLimiter {
    /// Window state indexed by client key
    store: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
    /// Background sweep task, if started
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    /// Create a rate limiter backed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a rate limiter with an explicit time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: DashMap::new(),
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Check a request for `key` against a policy.
    pub fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.check_with(key, policy.limit, policy.window())
    }

    /// Check a request for `key` against an explicit limit and window.
    ///
    /// A new or expired window admits the request and starts counting at 1.
    /// A full window rejects it and leaves the count untouched. Otherwise the
    /// count goes up by one. The whole read-modify-write happens under the
    /// key's shard lock, so concurrent callers never double count.
    pub fn check_with(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        debug_assert!(!key.is_empty(), "rate limit key must not be empty");
        debug_assert!(limit > 0, "rate limit must be positive");
        debug_assert!(!window.is_zero(), "rate limit window must be positive");

        let now = self.clock.now_millis();

        let decision = match self.store.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                let entry = vacant.insert(RateLimitEntry::open(now, window));
                admitted(limit, &entry)
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_expired(now) {
                    *entry = RateLimitEntry::open(now, window);
                    admitted(limit, entry)
                } else if entry.count >= limit {
                    RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at: entry.reset_at,
                    }
                } else {
                    entry.count += 1;
                    admitted(limit, entry)
                }
            }
        };

        if decision.allowed {
            trace!(
                key = %key,
                limit = limit,
                remaining = decision.remaining,
                "Request admitted"
            );
        } else {
            debug!(
                key = %key,
                limit = limit,
                reset_at = decision.reset_at,
                "Rate limit exceeded"
            );
        }

        decision
    }

    /// Remove every entry whose window has ended.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;

        self.store.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        debug!(
            removed = removed,
            remaining = self.store.len(),
            "Swept expired rate limit entries"
        );
        removed
    }

    /// Spawn the periodic sweep on the current tokio runtime.
    ///
    /// The task holds only a weak reference, so it ends on its own once the
    /// limiter is dropped. Starting again replaces the previous task.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let limiter: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match limiter.upgrade() {
                    Some(limiter) => {
                        limiter.sweep();
                    }
                    None => break,
                }
            }
        });

        if let Some(previous) = self.sweeper.lock().replace(handle) {
            previous.abort();
        }
        debug!(interval_secs = interval.as_secs(), "Rate limit sweeper started");
    }

    /// Whether the sweep task is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweep task. Safe to call more than once.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            debug!("Rate limit sweeper stopped");
        }
    }

    /// Get the stored entry for a key, expired or not.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.store.get(key).map(|entry| *entry)
    }

    /// Get the number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

fn admitted(limit: u32, entry: &RateLimitEntry) -> RateLimitDecision {
    RateLimitDecision {
        allowed: true,
        limit,
        remaining: limit.saturating_sub(entry.count),
        reset_at: entry.reset_at,
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl RateLimiterBackend for RateLimiter {
    fn check(&self, key: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        RateLimiter::check(self, key, policy)
    }

    fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::ManualClock;

    const START: u64 = 1_700_000_000_000;

    fn limiter_at(start: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (RateLimiter::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new();
        assert!(limiter.is_empty());
        assert!(!limiter.is_sweeping());
    }

    #[test]
    fn test_first_request_for_new_key() {
        let (limiter, _clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(10, 60);

        let decision = limiter.check("203.0.113.1", &policy);

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.limit, 10);
        assert_eq!(decision.reset_at, START + 60_000);
        assert_eq!(
            limiter.entry("203.0.113.1"),
            Some(RateLimitEntry {
                count: 1,
                reset_at: START + 60_000
            })
        );
    }

    #[test]
    fn test_six_calls_against_limit_of_five() {
        let (limiter, _clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(5, 60);

        let decisions: Vec<_> = (0..6).map(|_| limiter.check("1.2.3.4", &policy)).collect();

        let allowed: Vec<_> = decisions.iter().map(|d| d.allowed).collect();
        let remaining: Vec<_> = decisions.iter().map(|d| d.remaining).collect();
        assert_eq!(allowed, [true, true, true, true, true, false]);
        assert_eq!(remaining, [4, 3, 2, 1, 0, 0]);
        assert!(decisions.iter().all(|d| d.reset_at == START + 60_000));
    }

    #[test]
    fn test_rejection_does_not_increment() {
        let (limiter, clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(2, 60);

        limiter.check("key", &policy);
        limiter.check("key", &policy);
        let before = limiter.entry("key").unwrap();

        clock.advance(Duration::from_secs(10));
        for _ in 0..3 {
            let decision = limiter.check("key", &policy);
            assert!(!decision.allowed);
            assert_eq!(decision.remaining, 0);
            assert_eq!(decision.reset_at, before.reset_at);
        }

        assert_eq!(limiter.entry("key"), Some(before));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let (limiter, clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(3, 60);

        for _ in 0..4 {
            limiter.check("key", &policy);
        }
        assert!(!limiter.check("key", &policy).allowed);

        clock.advance(Duration::from_secs(60));
        let decision = limiter.check("key", &policy);

        assert!(decision.allowed);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.reset_at, START + 120_000);
        assert_eq!(limiter.entry("key").unwrap().count, 1);
    }

    #[test]
    fn test_last_millisecond_of_window_still_counts() {
        let (limiter, clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(1, 1);

        assert!(limiter.check("key", &policy).allowed);
        clock.advance(Duration::from_millis(999));
        assert!(!limiter.check("key", &policy).allowed);
        clock.advance(Duration::from_millis(1));
        assert!(limiter.check("key", &policy).allowed);
    }

    #[test]
    fn test_oversized_window_does_not_wrap() {
        let (limiter, clock) = limiter_at(1_000);
        let window = Duration::from_secs(u64::MAX / 1000 + 1);

        let decision = limiter.check_with("k", 1, window);
        assert!(decision.allowed);
        assert_eq!(decision.reset_at, u64::MAX);

        clock.advance(Duration::from_secs(3600));
        assert!(!limiter.check_with("k", 1, window).allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _clock) = limiter_at(START);
        let policy = RateLimitPolicy::custom(2, 60);

        limiter.check("a", &policy);
        limiter.check("a", &policy);
        assert!(!limiter.check("a", &policy).allowed);

        let decision = limiter.check("b", &policy);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_sweep_removes_only_expired_entries() {
        let (limiter, clock) = limiter_at(START);

        limiter.check_with("short", 5, Duration::from_secs(10));
        limiter.check_with("long", 5, Duration::from_secs(120));

        clock.advance(Duration::from_secs(30));
        assert_eq!(limiter.sweep(), 1);

        assert!(limiter.entry("short").is_none());
        assert!(limiter.entry("long").is_some());
    }

    #[test]
    fn test_expiry_is_the_same_with_or_without_sweep() {
        let policy = RateLimitPolicy::custom(5, 60);

        let (swept, swept_clock) = limiter_at(START);
        let (unswept, unswept_clock) = limiter_at(START);
        for limiter in [&swept, &unswept] {
            for _ in 0..5 {
                limiter.check("key", &policy);
            }
        }

        swept_clock.advance(Duration::from_secs(61));
        unswept_clock.advance(Duration::from_secs(61));
        swept.sweep();
        assert!(swept.entry("key").is_none());
        assert!(unswept.entry("key").is_some());

        assert_eq!(swept.check("key", &policy), unswept.check("key", &policy));
    }

    #[test]
    fn test_concurrent_checks_admit_exactly_limit() {
        let (limiter, _clock) = limiter_at(START);
        let limiter = Arc::new(limiter);
        let policy = RateLimitPolicy::custom(50, 60);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.check("shared", &policy).allowed)
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
        assert_eq!(limiter.entry("shared").unwrap().count, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_runs_on_interval() {
        let (limiter, clock) = limiter_at(START);
        let limiter = Arc::new(limiter);

        limiter.check_with("key", 5, Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));

        limiter.start_sweeper(Duration::from_secs(60));
        assert!(limiter.is_sweeping());

        // Not yet due
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(limiter.len(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(limiter.is_empty());

        limiter.shutdown();
        limiter.shutdown();
        assert!(!limiter.is_sweeping());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeping() {
        let (limiter, clock) = limiter_at(START);
        let limiter = Arc::new(limiter);

        limiter.start_sweeper(Duration::from_secs(60));
        limiter.shutdown();

        limiter.check_with("key", 5, Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_backend_uses_limiter_clock() {
        let (limiter, clock) = limiter_at(START);
        let backend: &dyn RateLimiterBackend = &limiter;

        assert_eq!(backend.now_millis(), START);
        clock.advance(Duration::from_secs(1));
        assert_eq!(backend.now_millis(), START + 1_000);

        let decision = backend.check("key", &RateLimitPolicy::CHECKOUT);
        assert_eq!(decision.remaining, RateLimitPolicy::CHECKOUT.limit - 1);
    }
}
