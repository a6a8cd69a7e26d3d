// crates/bentham-auth/tests/rate.rs
// ============================================================================
// Module: Rate Limiter Tests
// Description: Tests for bucket exhaustion, retry hints, and refills.
// ============================================================================
//! ## Overview
//! Validates that each key's bucket allows exactly its allowance per
//! window, denies with a retry hint once empty, and refills when the
//! window rolls over.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;

use bentham_auth::ApiKeyRecord;
use bentham_auth::RateDecision;
use bentham_auth::RateLimiter;
use bentham_auth::RateLimiterConfig;
use bentham_auth::hash_secret;
use bentham_core::ApiKeyId;
use bentham_core::TenantId;
use bentham_core::Timestamp;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

fn key(key_id: &str, rate_limit: u32) -> ApiKeyRecord {
    ApiKeyRecord {
        key_id: ApiKeyId::new(key_id),
        tenant_id: TenantId::new("T1"),
        key_hash: hash_secret(key_id),
        name: key_id.to_string(),
        permissions: BTreeSet::new(),
        rate_limit,
        created_at: NOW,
        expires_at: None,
    }
}

// ============================================================================
// SECTION: Bucket Behavior
// ============================================================================

#[test]
fn buckets_allow_exactly_the_allowance_per_window() {
    let limiter = RateLimiter::new(RateLimiterConfig {
        window_ms: 60_000,
    });
    let record = key("k1", 3);

    for expected_remaining in [2_u32, 1, 0] {
        match limiter.check(&record, NOW) {
            RateDecision::Allowed {
                remaining,
            } => assert_eq!(remaining, expected_remaining),
            RateDecision::Limited {
                ..
            } => panic!("bucket denied within its allowance"),
        }
    }

    match limiter.check(&record, NOW) {
        RateDecision::Limited {
            retry_after_secs,
        } => {
            assert!(retry_after_secs >= 1);
            assert!(retry_after_secs <= 61);
        }
        RateDecision::Allowed {
            ..
        } => panic!("bucket allowed beyond its allowance"),
    }
}

#[test]
fn buckets_refill_when_the_window_rolls_over() {
    let limiter = RateLimiter::new(RateLimiterConfig {
        window_ms: 1_000,
    });
    let record = key("k1", 1);

    assert!(matches!(limiter.check(&record, NOW), RateDecision::Allowed { .. }));
    assert!(matches!(limiter.check(&record, NOW), RateDecision::Limited { .. }));

    let later = NOW.plus_millis(1_000);
    assert!(matches!(limiter.check(&record, later), RateDecision::Allowed { .. }));
}

#[test]
fn buckets_are_isolated_per_key() {
    let limiter = RateLimiter::new(RateLimiterConfig::default());
    let first = key("k1", 1);
    let second = key("k2", 1);

    assert!(matches!(limiter.check(&first, NOW), RateDecision::Allowed { .. }));
    assert!(matches!(limiter.check(&first, NOW), RateDecision::Limited { .. }));
    assert!(matches!(limiter.check(&second, NOW), RateDecision::Allowed { .. }));
}
