// crates/bentham-auth/src/rate.rs
// ============================================================================
// Module: Rate Limiting
// Description: Per-key token buckets over a fixed window.
// Purpose: Deny over-limit requests with a retry hint in seconds.
// Dependencies: bentham-core
// ============================================================================

//! ## Overview
//! Each key owns a token bucket with capacity `rate_limit` refilled at the
//! start of every window. Bucket checks are a short critical section under
//! one mutex: read the window, refill if elapsed, and decrement. Denied
//! requests carry the seconds remaining until the window refills.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use bentham_core::ApiKeyId;
use bentham_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;

use crate::keys::ApiKeyRecord;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Rate limiter configuration.
///
/// # Invariants
/// - `window_ms >= 1`; each key allows `rate_limit` requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Window length in milliseconds.
    pub window_ms: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
        }
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of a bucket check.
///
/// # Invariants
/// - `retry_after_secs >= 1` for limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request consumed one token.
    Allowed {
        /// Tokens remaining in the current window.
        remaining: u32,
    },
    /// The bucket is empty for the current window.
    Limited {
        /// Seconds until the window refills.
        retry_after_secs: u64,
    },
}

// ============================================================================
// SECTION: Limiter
// ============================================================================

/// Per-key bucket state.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    /// Tokens remaining in the current window.
    tokens: u32,
    /// Start of the current window.
    window_started: Timestamp,
}

/// Per-key token-bucket rate limiter.
///
/// # Invariants
/// - One bucket per key; bucket mutation is a short critical section.
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Limiter configuration.
    config: RateLimiterConfig,
    /// Buckets keyed by api key identifier.
    buckets: Mutex<BTreeMap<ApiKeyId, Bucket>>,
}

impl RateLimiter {
    /// Creates a limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Consumes one token from the key's bucket when available.
    pub fn check(&self, key: &ApiKeyRecord, now: Timestamp) -> RateDecision {
        let Ok(mut buckets) = self.buckets.lock() else {
            return RateDecision::Limited {
                retry_after_secs: 1,
            };
        };
        let bucket = buckets.entry(key.key_id.clone()).or_insert(Bucket {
            tokens: key.rate_limit,
            window_started: now,
        });
        if bucket.window_started.millis_until(now) >= self.config.window_ms {
            bucket.tokens = key.rate_limit;
            bucket.window_started = now;
        }
        if bucket.tokens == 0 {
            let refill_at = bucket.window_started.plus_millis(self.config.window_ms);
            let wait_ms = now.millis_until(refill_at).max(0);
            let retry_after_secs = u64::try_from(wait_ms.div_euclid(1_000) + 1).unwrap_or(1);
            return RateDecision::Limited {
                retry_after_secs,
            };
        }
        bucket.tokens -= 1;
        RateDecision::Allowed {
            remaining: bucket.tokens,
        }
    }
}
