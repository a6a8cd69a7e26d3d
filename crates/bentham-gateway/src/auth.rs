// crates/bentham-gateway/src/auth.rs
// ============================================================================
// Module: Gateway Authentication
// Description: Bearer extraction, key resolution, and rate admission.
// Purpose: Bind every request to exactly one tenant before any service call.
// Dependencies: axum, bentham-auth, bentham-core
// ============================================================================

//! ## Overview
//! Authentication runs before any service-layer call: extract the bearer
//! token, resolve it against the hashed key store, and consume one rate
//! token. Failures map onto the stable taxonomy: `UNAUTHORIZED` for a
//! missing or malformed bearer, `INVALID_API_KEY` for an unknown secret,
//! `API_KEY_EXPIRED` for a matched-but-expired key, and `RATE_LIMITED`
//! with a retry hint once the bucket is empty. The resulting context
//! carries the tenant identifier; handlers pass it as the first argument
//! to every orchestrator operation and there is no way to substitute a
//! different tenant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use bentham_auth::ApiKeyStore;
use bentham_auth::KeyResolution;
use bentham_auth::RateDecision;
use bentham_auth::RateLimiter;
use bentham_core::ApiKeyId;
use bentham_core::TenantId;
use bentham_core::Timestamp;

use crate::envelope::ApiError;
use crate::envelope::ErrorCode;

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Request context established by successful authentication.
///
/// # Invariants
/// - `tenant_id` comes from the resolved key, never from the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Tenant bound to the presented key.
    pub tenant_id: TenantId,
    /// Identifier of the presented key.
    pub key_id: ApiKeyId,
}

// ============================================================================
// SECTION: Bearer Extraction
// ============================================================================

/// Extracts the bearer secret from the `Authorization` header.
///
/// Only the exact `Bearer <secret>` scheme is accepted; any other scheme,
/// casing, or an empty secret is a malformed bearer.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let secret = value.strip_prefix("Bearer ")?.trim();
    if secret.is_empty() {
        return None;
    }
    Some(secret)
}

// ============================================================================
// SECTION: Authentication
// ============================================================================

/// Authenticates a request and consumes one rate token.
///
/// # Errors
///
/// Returns [`ApiError`] with the taxonomy code for the failing step; the
/// service layer is never reached on failure.
pub fn authenticate(
    keys: &ApiKeyStore,
    limiter: &RateLimiter,
    headers: &HeaderMap,
    now: Timestamp,
) -> Result<AuthContext, ApiError> {
    let Some(secret) = extract_bearer(headers) else {
        return Err(ApiError::new(ErrorCode::Unauthorized, "missing bearer token"));
    };
    let record = match keys.resolve(secret, now) {
        KeyResolution::Active(record) => record,
        KeyResolution::Expired => {
            return Err(ApiError::new(ErrorCode::ApiKeyExpired, "api key expired"));
        }
        KeyResolution::Unknown => {
            return Err(ApiError::new(ErrorCode::InvalidApiKey, "invalid api key"));
        }
    };
    match limiter.check(&record, now) {
        RateDecision::Allowed {
            ..
        } => Ok(AuthContext {
            tenant_id: record.tenant_id,
            key_id: record.key_id,
        }),
        RateDecision::Limited {
            retry_after_secs,
        } => Err(ApiError::rate_limited(retry_after_secs)),
    }
}

#[cfg(test)]
mod tests;
