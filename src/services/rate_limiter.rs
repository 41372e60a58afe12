//! Per-key rate limiting
//!
//! Fixed-window counter: requests are counted per key within clock-aligned
//! minute buckets. Counters live in process memory only; a restart resets
//! them, which is acceptable because the limits are advisory and local.
//!
//! Fixed windows admit up to 2x the limit across a minute boundary. That is
//! an accepted approximation of this limiter, not a bug.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Throttled,
}

/// Composite window key: one counter per key per minute bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WindowKey {
    key_id: String,
    bucket: u64,
}

/// Process-local fixed-window rate limiter.
///
/// Constructed once at startup and shared across all in-flight requests.
/// The whole check+increment runs under one lock, so two concurrent requests
/// can never both observe `count < limit` at the boundary.
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<WindowKey, u32>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Check the current minute's counter for `key_id` and increment it if
    /// the request is admitted. A throttled request does not increment.
    pub fn check_and_increment(&self, key_id: &str, limit: u32) -> RateDecision {
        self.check_and_increment_at(key_id, limit, current_bucket())
    }

    /// Same as `check_and_increment`, with the minute bucket supplied by the
    /// caller. Exists so tests can cross window boundaries without sleeping.
    pub fn check_and_increment_at(&self, key_id: &str, limit: u32, bucket: u64) -> RateDecision {
        let mut windows = self.windows.lock().unwrap();

        // Keep only the current and immediately-prior bucket. Doing this on
        // every call bounds memory without a background sweeper.
        windows.retain(|k, _| k.bucket + 1 >= bucket);

        let count = windows
            .entry(WindowKey {
                key_id: key_id.to_string(),
                bucket,
            })
            .or_insert(0);

        if *count >= limit {
            return RateDecision::Throttled;
        }

        *count += 1;
        RateDecision::Allowed
    }

    /// Number of live window entries (test/observability hook)
    pub fn window_count(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Current minute bucket: epoch seconds divided by 60.
fn current_bucket() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 60)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allows_up_to_limit_then_throttles() {
        let limiter = FixedWindowLimiter::new();

        for i in 0..5 {
            assert_eq!(
                limiter.check_and_increment_at("k1", 5, 100),
                RateDecision::Allowed,
                "request {} should be allowed",
                i
            );
        }

        assert_eq!(
            limiter.check_and_increment_at("k1", 5, 100),
            RateDecision::Throttled
        );
    }

    #[test]
    fn test_next_bucket_resets() {
        let limiter = FixedWindowLimiter::new();

        for _ in 0..3 {
            limiter.check_and_increment_at("k1", 3, 100);
        }
        assert_eq!(
            limiter.check_and_increment_at("k1", 3, 100),
            RateDecision::Throttled
        );

        // Following minute starts a fresh counter
        assert_eq!(
            limiter.check_and_increment_at("k1", 3, 101),
            RateDecision::Allowed
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::new();

        assert_eq!(limiter.check_and_increment_at("k1", 1, 100), RateDecision::Allowed);
        assert_eq!(limiter.check_and_increment_at("k1", 1, 100), RateDecision::Throttled);
        assert_eq!(limiter.check_and_increment_at("k2", 1, 100), RateDecision::Allowed);
    }

    #[test]
    fn test_throttled_call_does_not_consume() {
        let limiter = FixedWindowLimiter::new();

        assert_eq!(limiter.check_and_increment_at("k1", 1, 100), RateDecision::Allowed);
        // Repeated throttled calls must not grow the counter past the limit
        for _ in 0..10 {
            assert_eq!(
                limiter.check_and_increment_at("k1", 1, 100),
                RateDecision::Throttled
            );
        }
    }

    #[test]
    fn test_stale_windows_evicted() {
        let limiter = FixedWindowLimiter::new();

        limiter.check_and_increment_at("k1", 10, 100);
        limiter.check_and_increment_at("k2", 10, 100);
        assert_eq!(limiter.window_count(), 2);

        // Two minutes later, both old windows are gone; only the new one lives
        limiter.check_and_increment_at("k1", 10, 102);
        assert_eq!(limiter.window_count(), 1);

        // The immediately-prior bucket survives
        limiter.check_and_increment_at("k2", 10, 103);
        assert_eq!(limiter.window_count(), 2);
    }

    #[test]
    fn test_concurrent_admission_is_exact() {
        let limiter = Arc::new(FixedWindowLimiter::new());
        let limit: u32 = 25;
        let callers: u32 = 100;

        let handles: Vec<_> = (0..callers)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.check_and_increment_at("k1", limit, 100))
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| *d == RateDecision::Allowed)
            .count();

        // Exactly `limit` admitted, no over-admission at the boundary
        assert_eq!(allowed as u32, limit);
    }
}
