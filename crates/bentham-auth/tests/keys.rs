// crates/bentham-auth/tests/keys.rs
// ============================================================================
// Module: API Key Tests
// Description: Tests for key generation, hashing, and resolution.
// ============================================================================
//! ## Overview
//! Validates key format, hash determinism, store resolution laws, expiry
//! handling, and the timing uniformity of lookups.

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
use std::time::Instant;

use bentham_auth::API_KEY_PREFIX;
use bentham_auth::ApiKeyRecord;
use bentham_auth::ApiKeyStore;
use bentham_auth::KeyResolution;
use bentham_auth::KeyStoreError;
use bentham_auth::MIN_API_KEY_LENGTH;
use bentham_auth::generate_api_key;
use bentham_auth::hash_secret;
use bentham_core::ApiKeyId;
use bentham_core::TenantId;
use bentham_core::Timestamp;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const NOW: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

fn record(key_id: &str, tenant: &str, secret: &str) -> ApiKeyRecord {
    ApiKeyRecord {
        key_id: ApiKeyId::new(key_id),
        tenant_id: TenantId::new(tenant),
        key_hash: hash_secret(secret),
        name: format!("key {key_id}"),
        permissions: BTreeSet::new(),
        rate_limit: 1_000,
        created_at: NOW,
        expires_at: None,
    }
}

// ============================================================================
// SECTION: Key Format
// ============================================================================

#[test]
fn generated_keys_use_the_fixed_prefix_and_safe_alphabet() {
    let key = generate_api_key();
    assert!(key.starts_with(API_KEY_PREFIX));
    assert!(key.len() >= MIN_API_KEY_LENGTH);
    let suffix = &key[API_KEY_PREFIX.len()..];
    assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    // 32 random bytes render to 43 url-safe characters without padding.
    assert_eq!(suffix.len(), 43);
}

#[test]
fn one_thousand_consecutive_keys_are_distinct() {
    let keys: BTreeSet<String> = (0..1_000).map(|_| generate_api_key()).collect();
    assert_eq!(keys.len(), 1_000);
}

// ============================================================================
// SECTION: Hash Laws
// ============================================================================

#[test]
fn hashing_is_deterministic_and_collision_free_for_distinct_secrets() {
    let secret = generate_api_key();
    assert_eq!(hash_secret(&secret), hash_secret(&secret));

    let other = generate_api_key();
    assert_ne!(hash_secret(&secret), hash_secret(&other));

    let digest = hash_secret(&secret);
    assert_eq!(digest.as_str().len(), 64);
    assert!(digest.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

// ============================================================================
// SECTION: Resolution Laws
// ============================================================================

#[test]
fn stored_keys_resolve_and_unknown_secrets_do_not() {
    let store = ApiKeyStore::new();
    let secret = generate_api_key();
    store.add_key(record("k1", "T1", &secret)).expect("add key");

    match store.resolve(&secret, NOW) {
        KeyResolution::Active(resolved) => {
            assert_eq!(resolved.tenant_id, TenantId::new("T1"));
            assert_eq!(resolved.key_id, ApiKeyId::new("k1"));
        }
        other => panic!("expected active resolution, got {other:?}"),
    }

    // A freshly generated key never collides with a stored one.
    for _ in 0..16 {
        assert_eq!(store.resolve(&generate_api_key(), NOW), KeyResolution::Unknown);
    }
}

#[test]
fn duplicate_hashes_are_rejected() {
    let store = ApiKeyStore::new();
    let secret = generate_api_key();
    store.add_key(record("k1", "T1", &secret)).expect("add key");
    let duplicate = store.add_key(record("k2", "T2", &secret));
    assert_eq!(duplicate, Err(KeyStoreError::DuplicateHash));
    assert_eq!(store.len(), 1);
}

#[test]
fn expired_keys_resolve_as_expired() {
    let store = ApiKeyStore::new();
    let secret = generate_api_key();
    let mut expiring = record("k1", "T1", &secret);
    expiring.expires_at = Some(NOW);
    store.add_key(expiring).expect("add key");

    assert_eq!(store.resolve(&secret, NOW), KeyResolution::Expired);
    let just_before = Timestamp::from_unix_millis(NOW.as_unix_millis() - 1);
    assert!(matches!(store.resolve(&secret, just_before), KeyResolution::Active(_)));
}

#[test]
fn revoked_keys_stop_resolving() {
    let store = ApiKeyStore::new();
    let secret = generate_api_key();
    store.add_key(record("k1", "T1", &secret)).expect("add key");
    store.remove_key(&ApiKeyId::new("k1"));
    assert_eq!(store.resolve(&secret, NOW), KeyResolution::Unknown);
    assert!(store.is_empty());
}

// ============================================================================
// SECTION: Timing Uniformity
// ============================================================================

#[test]
fn valid_and_invalid_lookups_have_comparable_timing() {
    let store = ApiKeyStore::new();
    let secret = generate_api_key();
    store.add_key(record("k1", "T1", &secret)).expect("add key");
    for index in 0..256 {
        let filler = generate_api_key();
        store.add_key(record(&format!("filler_{index}"), "T1", &filler)).expect("add filler");
    }
    let invalid = "btm_invalid_20_chars";

    // Warm both paths before measuring.
    for _ in 0..50 {
        let _ = store.resolve(&secret, NOW);
        let _ = store.resolve(invalid, NOW);
    }

    let trials = 20;
    let mut valid_total = 0_u128;
    let mut invalid_total = 0_u128;
    for _ in 0..trials {
        let start = Instant::now();
        let _ = store.resolve(&secret, NOW);
        valid_total += start.elapsed().as_nanos();

        let start = Instant::now();
        let _ = store.resolve(invalid, NOW);
        invalid_total += start.elapsed().as_nanos();
    }
    let valid_avg = (valid_total / trials).max(1);
    let invalid_avg = (invalid_total / trials).max(1);
    let ratio = if valid_avg > invalid_avg {
        valid_avg as f64 / invalid_avg as f64
    } else {
        invalid_avg as f64 / valid_avg as f64
    };
    assert!(ratio < 5.0, "lookup timing ratio {ratio} exceeds the 5x bound");
}
