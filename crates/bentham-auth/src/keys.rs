// crates/bentham-auth/src/keys.rs
// ============================================================================
// Module: API Key Store
// Description: Hashed-key records, key generation, and tenant binding.
// Purpose: Resolve presented secrets to tenants without storing secrets.
// Dependencies: base64, bentham-core, rand, sha2, subtle
// ============================================================================

//! ## Overview
//! API keys bind a secret to a tenant. The store holds only the SHA-256
//! hash of each secret, keyed by that hash; the raw secret never persists.
//! Resolution hashes the presented secret unconditionally before any
//! lookup branch and finishes with a constant-time digest comparison, so
//! the timing of a valid lookup is indistinguishable from an unknown one.
//! Readers vastly outnumber writers; the store uses a reader/writer lock
//! with short critical sections and no suspension points inside them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bentham_core::ApiKeyId;
use bentham_core::TenantId;
use bentham_core::Timestamp;
use rand::RngCore;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed prefix for every issued key.
pub const API_KEY_PREFIX: &str = "btm_";
/// Bytes of cryptographic randomness per key.
pub const API_KEY_RANDOM_BYTES: usize = 32;
/// Minimum total key length in characters.
pub const MIN_API_KEY_LENGTH: usize = 40;

// ============================================================================
// SECTION: Key Hash
// ============================================================================

/// SHA-256 digest of a raw key secret, rendered as lowercase hex.
///
/// # Invariants
/// - Always 64 lowercase hex characters.
/// - Equality comparisons run in constant time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHash(String);

impl KeyHash {
    /// Returns the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for KeyHash {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for KeyHash {}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Hashes a raw secret into its canonical digest.
///
/// Deterministic over the UTF-8 bytes of the secret.
#[must_use]
pub fn hash_secret(secret: &str) -> KeyHash {
    let digest = Sha256::digest(secret.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    KeyHash(hex)
}

/// Generates a fresh API key secret.
///
/// The secret is the fixed prefix followed by 32 bytes of cryptographic
/// randomness rendered in a URL-safe alphabet; total length is at least
/// [`MIN_API_KEY_LENGTH`] characters.
#[must_use]
pub fn generate_api_key() -> String {
    let mut bytes = [0_u8; API_KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

// ============================================================================
// SECTION: Key Records
// ============================================================================

/// Immutable API key record.
///
/// # Invariants
/// - `key_hash` is unique across the store.
/// - The raw secret is never part of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Key identifier.
    pub key_id: ApiKeyId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Digest of the raw secret.
    pub key_hash: KeyHash,
    /// Human-readable key name.
    pub name: String,
    /// Permission labels granted to the key.
    pub permissions: BTreeSet<String>,
    /// Requests allowed per rate window.
    pub rate_limit: u32,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Optional expiry timestamp.
    pub expires_at: Option<Timestamp>,
}

impl ApiKeyRecord {
    /// Returns true when the key is expired at the given time.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors surfaced by the key store.
///
/// # Invariants
/// - Messages never include secrets or hashes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyStoreError {
    /// A record with the same hash already exists.
    #[error("api key hash already registered")]
    DuplicateHash,
}

// ============================================================================
// SECTION: Resolution Outcome
// ============================================================================

/// Outcome of resolving a presented secret.
///
/// # Invariants
/// - `Expired` is only returned for keys that did match by hash.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyResolution {
    /// The secret matched an active key.
    Active(ApiKeyRecord),
    /// The secret matched a key whose expiry has passed.
    Expired,
    /// No key matched the secret.
    Unknown,
}

// ============================================================================
// SECTION: Key Store
// ============================================================================

/// In-memory API key store keyed by secret hash.
///
/// # Invariants
/// - No two records share a hash.
/// - Lookup work is constant regardless of key existence: the presented
///   secret is hashed before any branch, and digests compare in constant
///   time.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    /// Records keyed by hash hex.
    keys: RwLock<BTreeMap<String, ApiKeyRecord>>,
}

impl ApiKeyStore {
    /// Creates an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key record.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::DuplicateHash`] when a record with the same
    /// hash exists.
    pub fn add_key(&self, record: ApiKeyRecord) -> Result<(), KeyStoreError> {
        let Ok(mut keys) = self.keys.write() else {
            return Err(KeyStoreError::DuplicateHash);
        };
        let hash_hex = record.key_hash.as_str().to_string();
        if keys.contains_key(&hash_hex) {
            return Err(KeyStoreError::DuplicateHash);
        }
        keys.insert(hash_hex, record);
        Ok(())
    }

    /// Removes a key by identifier, revoking it.
    pub fn remove_key(&self, key_id: &ApiKeyId) {
        if let Ok(mut keys) = self.keys.write() {
            keys.retain(|_, record| &record.key_id != key_id);
        }
    }

    /// Resolves a presented secret against the store.
    ///
    /// The secret is hashed unconditionally before any lookup branch; the
    /// final digest comparison is constant-time.
    #[must_use]
    pub fn resolve(&self, presented: &str, now: Timestamp) -> KeyResolution {
        let presented_hash = hash_secret(presented);
        let Ok(keys) = self.keys.read() else {
            return KeyResolution::Unknown;
        };
        let Some(record) = keys.get(presented_hash.as_str()) else {
            return KeyResolution::Unknown;
        };
        if record.key_hash != presented_hash {
            return KeyResolution::Unknown;
        }
        if record.is_expired(now) {
            return KeyResolution::Expired;
        }
        KeyResolution::Active(record.clone())
    }

    /// Returns the number of registered keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().map(|keys| keys.len()).unwrap_or(0)
    }

    /// Returns true when the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
