// crates/bentham-gateway/src/auth/tests.rs
// ============================================================================
// Module: Gateway Auth Unit Tests
// Description: Unit tests for bearer extraction and the auth taxonomy.
// Purpose: Validate the auth boundary with in-memory fixtures.
// Dependencies: bentham-gateway
// ============================================================================

//! ## Overview
//! Exercises every auth failure class: missing bearer, foreign schemes,
//! unknown secrets, expired keys, and empty rate buckets.

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
    reason = "Test-only framing assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use bentham_auth::ApiKeyRecord;
use bentham_auth::ApiKeyStore;
use bentham_auth::RateLimiter;
use bentham_auth::RateLimiterConfig;
use bentham_auth::generate_api_key;
use bentham_auth::hash_secret;
use bentham_core::ApiKeyId;
use bentham_core::TenantId;
use bentham_core::Timestamp;

use super::authenticate;
use crate::envelope::ErrorCode;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

fn store_with_key(secret: &str, rate_limit: u32, expires_at: Option<Timestamp>) -> ApiKeyStore {
    let store = ApiKeyStore::new();
    store
        .add_key(ApiKeyRecord {
            key_id: ApiKeyId::new("k1"),
            tenant_id: TenantId::new("T1"),
            key_hash: hash_secret(secret),
            name: "test key".to_string(),
            permissions: BTreeSet::new(),
            rate_limit,
            created_at: NOW,
            expires_at,
        })
        .expect("add key");
    store
}

fn bearer_headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header value"));
    headers
}

// ============================================================================
// SECTION: Bearer Taxonomy
// ============================================================================

#[test]
fn missing_and_malformed_bearers_are_unauthorized() {
    let secret = generate_api_key();
    let store = store_with_key(&secret, 1_000, None);
    let limiter = RateLimiter::new(RateLimiterConfig::default());

    let no_header = HeaderMap::new();
    let err = authenticate(&store, &limiter, &no_header, NOW).expect_err("missing header");
    assert_eq!(err.code, ErrorCode::Unauthorized);

    for malformed in ["", "Bearer", "Bearer ", "bearer lower", "Token x", "JWT a.b.c"] {
        let err = authenticate(&store, &limiter, &bearer_headers(malformed), NOW)
            .expect_err("malformed bearer");
        assert_eq!(err.code, ErrorCode::Unauthorized, "case: {malformed:?}");
    }
}

#[test]
fn unknown_secrets_are_invalid_api_keys() {
    let secret = generate_api_key();
    let store = store_with_key(&secret, 1_000, None);
    let limiter = RateLimiter::new(RateLimiterConfig::default());

    let unknown = format!("Bearer {}", generate_api_key());
    let err =
        authenticate(&store, &limiter, &bearer_headers(&unknown), NOW).expect_err("unknown key");
    assert_eq!(err.code, ErrorCode::InvalidApiKey);
}

#[test]
fn expired_keys_are_reported_as_expired() {
    let secret = generate_api_key();
    let store = store_with_key(&secret, 1_000, Some(NOW));
    let limiter = RateLimiter::new(RateLimiterConfig::default());

    let err = authenticate(&store, &limiter, &bearer_headers(&format!("Bearer {secret}")), NOW)
        .expect_err("expired key");
    assert_eq!(err.code, ErrorCode::ApiKeyExpired);
}

// ============================================================================
// SECTION: Rate Admission
// ============================================================================

#[test]
fn empty_buckets_deny_with_a_retry_hint() {
    let secret = generate_api_key();
    let store = store_with_key(&secret, 1, None);
    let limiter = RateLimiter::new(RateLimiterConfig::default());
    let headers = bearer_headers(&format!("Bearer {secret}"));

    let context = authenticate(&store, &limiter, &headers, NOW).expect("first request");
    assert_eq!(context.tenant_id, TenantId::new("T1"));

    let err = authenticate(&store, &limiter, &headers, NOW).expect_err("second request");
    assert_eq!(err.code, ErrorCode::RateLimited);
    assert!(err.retry_after_secs.is_some_and(|secs| secs >= 1));
}
