// frostgate-server/src/rate_limit.rs
// ============================================================================
// Module: Rate Limiter
// Description: In-process token-bucket rate limiter keyed by (tenant, route).
// Purpose: Implement the §4.2 rate limiter applied to `/defend`: continuous
//          refill rather than a fixed window, so a burst straddling a
//          window boundary cannot double the effective rate.
// Dependencies: frostgate-config
// ============================================================================

//! ## Overview
//! A token bucket per `(tenant_id, route)` key: `max_requests` tokens of
//! burst capacity, refilled continuously at `max_requests / window` tokens
//! per second. Each request consumes one token if available; buckets are
//! evicted opportunistically when the table grows large.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use frostgate_config::RateLimitConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bucket table size above which opportunistic eviction runs.
const MAX_TRACKED_KEYS: usize = 10_000;

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Token-bucket, in-process rate limiter.
pub struct RateLimiter {
    /// Limiter configuration.
    config: RateLimitConfig,
    /// Per-key token buckets.
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

struct RateLimitBucket {
    /// Tokens currently available, in `[0, max_requests]`.
    tokens: f64,
    /// Instant tokens were last refilled.
    last_refill: Instant,
    /// Last request timestamp, used for eviction.
    last_seen: Instant,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request is allowed.
    Allow,
    /// No token was available; retry after the given delay.
    Limited {
        /// Milliseconds the caller should wait before retrying.
        retry_after_ms: u64,
    },
}

impl RateLimiter {
    /// Builds a rate limiter from configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, buckets: Mutex::new(HashMap::new()) }
    }

    /// Refill rate in tokens per second.
    fn refill_rate_per_sec(&self) -> f64 {
        f64::from(self.config.max_requests) / (self.config.window_ms as f64 / 1000.0)
    }

    /// Checks and updates the bucket for `key`, refilling it for the elapsed
    /// time since its last refill before deciding.
    #[must_use]
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let capacity = f64::from(self.config.max_requests);
        let refill_rate = self.refill_rate_per_sec();
        let ttl = Duration::from_millis(self.config.window_ms.saturating_mul(2));
        let now = Instant::now();

        let Ok(mut buckets) = self.buckets.lock() else {
            return RateLimitDecision::Allow;
        };

        if buckets.len() > MAX_TRACKED_KEYS {
            buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) <= ttl);
        }

        let bucket = buckets.entry(key.to_string()).or_insert(RateLimitBucket {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        });

        let elapsed_secs = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed_secs * refill_rate).min(capacity);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allow
        } else {
            let deficit = 1.0 - bucket.tokens;
            let retry_after_ms = if refill_rate > 0.0 {
                u64::try_from((deficit / refill_rate * 1000.0) as u128).unwrap_or(u64::MAX)
            } else {
                u64::MAX
            };
            RateLimitDecision::Limited { retry_after_ms }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_configured_burst_then_limits() {
        let limiter = RateLimiter::new(RateLimitConfig { max_requests: 2, window_ms: 60_000 });
        assert_eq!(limiter.check("tenant:/defend"), RateLimitDecision::Allow);
        assert_eq!(limiter.check("tenant:/defend"), RateLimitDecision::Allow);
        assert!(matches!(limiter.check("tenant:/defend"), RateLimitDecision::Limited { .. }));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(RateLimitConfig { max_requests: 1, window_ms: 60_000 });
        assert_eq!(limiter.check("tenant-a:/defend"), RateLimitDecision::Allow);
        assert_eq!(limiter.check("tenant-b:/defend"), RateLimitDecision::Allow);
    }

    #[test]
    fn exhausted_bucket_refills_gradually_rather_than_resetting_at_a_window_boundary() {
        let limiter = RateLimiter::new(RateLimitConfig { max_requests: 1, window_ms: 1_000 });
        assert_eq!(limiter.check("tenant:/defend"), RateLimitDecision::Allow);
        let Ok(mut buckets) = limiter.buckets.lock() else { unreachable!("mutex not poisoned") };
        let bucket = buckets.get_mut("tenant:/defend").expect("bucket exists");
        // Simulate half the window having elapsed without waiting for real time.
        bucket.last_refill -= Duration::from_millis(500);
        drop(buckets);
        // Half a window at 1 token/sec refills 0.5 tokens: still short of 1.
        assert!(matches!(
            limiter.check("tenant:/defend"),
            RateLimitDecision::Limited { .. }
        ));
    }
}
