//! # Token Bucket Algorithm Implementation
//!
//! This module implements the [token bucket algorithm](https://en.wikipedia.org/wiki/Token_bucket)
//! used by both the request-rate and token-rate admission stages.
//!
//! ## How It Works
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Bucket state over time (burst=10, refill_rate=2/sec):          │
//! │                                                                  │
//! │   t=0s:   [██████████] 10/10 tokens (full)                      │
//! │           consume(1)  → 9/10                                    │
//! │   t=0.5s: refill adds 0.5 × 2 = 1 token → 10/10 (capped)        │
//! │   t=0.5s: consume(10) → 0/10                                    │
//! │   t=0.5s: consume(1)  → denied, bucket unchanged                │
//! │   t=1.5s: refill adds 1 × 2 = 2 tokens → 2/10                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Properties
//!
//! | Property        | Description                                   |
//! |------------------|-----------------------------------------------|
//! | **Burst (B)**    | Maximum tokens the bucket can hold             |
//! | **Refill rate**  | Tokens added per second of real elapsed time   |
//! | **No partial consumption** | denial leaves the bucket exactly as it was just after refill |
//!
//! `TokenBucket` owns a short-held [`Mutex`] around its fractional token
//! count, so many bucket-handles can be consumed concurrently as long as
//! they belong to different credentials — see [`crate::registry`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Capability set the admission stages depend on. Concrete bucket
/// implementations (token bucket, leaky bucket, sliding window) are
/// interchangeable behind this trait; only [`TokenBucket`] is provided,
/// but stages are written against the trait so an alternate algorithm
/// could be swapped in without touching pipeline code.
pub trait RateLimitBucket: Send + Sync {
    /// Attempt to consume `n` tokens as of `now`. Returns `true` (allowed)
    /// or `false` (denied, no partial consumption) and never blocks on I/O.
    fn try_consume(&self, n: u64, now: Instant) -> bool;

    /// Tokens currently available as of `now`, without consuming any.
    fn tokens(&self, now: Instant) -> f64;
}

struct BucketState {
    /// Current token count, fractional for precise refill. Always in
    /// `[0, burst]`.
    tokens: f64,
    last_refill: Instant,
}

/// A single-credential token bucket with continuous time-based refill.
///
/// Parameters are fixed at construction: `refill_rate` (tokens/second) and
/// `burst` (maximum tokens, i.e. the largest instantaneous admission).
pub struct TokenBucket {
    refill_rate: f64,
    burst: u64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a new bucket starting at full capacity.
    pub fn new(refill_rate: f64, burst: u64) -> Self {
        Self {
            refill_rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill_locked(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        state.last_refill = now;

        let added = self.refill_rate * elapsed.as_secs_f64();
        if added.is_finite() && added > 0.0 {
            state.tokens = (state.tokens + added).min(self.burst as f64);
        }

        debug_assert!(state.tokens >= 0.0 && state.tokens <= self.burst as f64 + f64::EPSILON);
    }

    /// Seconds until `n` tokens would be available, given the bucket's
    /// state as of `now`. Returns `Duration::ZERO` if already available.
    /// Used to compute `Retry-After`-style hints; not required by the
    /// wire contract but useful for observability collaborators.
    pub fn time_until(&self, n: u64, now: Instant) -> Duration {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut guard, now);

        let need = n as f64 - guard.tokens;
        if need <= 0.0 {
            return Duration::ZERO;
        }
        if self.refill_rate <= 0.0 {
            return Duration::from_secs(u64::MAX);
        }
        Duration::from_secs_f64((need / self.refill_rate).min(86_400.0))
    }
}

impl RateLimitBucket for TokenBucket {
    fn try_consume(&self, n: u64, now: Instant) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut guard, now);

        let n = n as f64;
        if guard.tokens >= n {
            guard.tokens -= n;
            true
        } else {
            false
        }
    }

    fn tokens(&self, now: Instant) -> f64 {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut guard, now);
        guard.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_full_burst() {
        let bucket = TokenBucket::new(10.0, 100);
        assert_eq!(bucket.tokens(Instant::now()), 100.0);
    }

    #[test]
    fn consume_reduces_tokens() {
        let bucket = TokenBucket::new(10.0, 100);
        let now = Instant::now();
        assert!(bucket.try_consume(50, now));
        assert_eq!(bucket.tokens(now), 50.0);
    }

    #[test]
    fn denial_leaves_bucket_unchanged() {
        // P2: no partial consumption.
        let bucket = TokenBucket::new(1.0, 10);
        let now = Instant::now();
        assert!(!bucket.try_consume(20, now));
        assert_eq!(bucket.tokens(now), 10.0);
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let bucket = TokenBucket::new(1000.0, 10);
        let now = Instant::now();
        assert!(bucket.try_consume(10, now));
        let later = now + Duration::from_secs(10);
        assert_eq!(bucket.tokens(later), 10.0);
    }

    #[test]
    fn refill_monotonicity_allows_once_enough_time_passed() {
        // P3.
        let bucket = TokenBucket::new(2.0, 10);
        let now = Instant::now();
        assert!(bucket.try_consume(10, now));
        assert!(!bucket.try_consume(1, now));
        let later = now + Duration::from_millis(600);
        assert!(bucket.try_consume(1, later));
    }

    #[test]
    fn credential_isolation_is_a_property_of_distinct_buckets() {
        // P4: exhausting one bucket cannot affect another distinct bucket.
        let a = TokenBucket::new(1.0, 1);
        let b = TokenBucket::new(1.0, 1);
        let now = Instant::now();
        assert!(a.try_consume(1, now));
        assert!(!a.try_consume(1, now));
        assert!(b.try_consume(1, now));
    }

    #[test]
    fn time_until_zero_when_available() {
        let bucket = TokenBucket::new(1.0, 10);
        assert_eq!(bucket.time_until(5, Instant::now()), Duration::ZERO);
    }

    #[test]
    fn time_until_positive_when_exhausted() {
        let bucket = TokenBucket::new(2.0, 1);
        let now = Instant::now();
        assert!(bucket.try_consume(1, now));
        let wait = bucket.time_until(1, now);
        assert!(wait >= Duration::from_millis(400) && wait <= Duration::from_millis(600));
    }
}
