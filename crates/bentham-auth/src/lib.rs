// crates/bentham-auth/src/lib.rs
// ============================================================================
// Module: Bentham Auth Library
// Description: API key issuance, hashed resolution, and rate limiting.
// Purpose: Bind presented secrets to tenants without persisting secrets.
// Dependencies: base64, bentham-core, rand, serde, sha2, subtle, thiserror
// ============================================================================

//! ## Overview
//! Bentham Auth holds the tenant trust boundary below the gateway: API key
//! records store only SHA-256 hashes, resolution is timing-uniform, and
//! every key carries a token-bucket allowance enforced per window.
//! Invariants:
//! - Raw secrets never persist; only their digests do.
//! - No two records share a hash.
//! - Resolution hashes the presented secret before any lookup branch.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod keys;
pub mod rate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use keys::API_KEY_PREFIX;
pub use keys::API_KEY_RANDOM_BYTES;
pub use keys::ApiKeyRecord;
pub use keys::ApiKeyStore;
pub use keys::KeyHash;
pub use keys::KeyResolution;
pub use keys::KeyStoreError;
pub use keys::MIN_API_KEY_LENGTH;
pub use keys::generate_api_key;
pub use keys::hash_secret;
pub use rate::RateDecision;
pub use rate::RateLimiter;
pub use rate::RateLimiterConfig;
