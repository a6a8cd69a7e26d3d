// crates/bentham-gateway/src/envelope.rs
// ============================================================================
// Module: Response Envelope
// Description: Stable success and error envelopes for every HTTP response.
// Purpose: Keep error codes stable and messages free of internal detail.
// Dependencies: axum, serde_json
// ============================================================================

//! ## Overview
//! Every response carries the `{success, data?, error?}` envelope. Error
//! codes are stable strings from the gateway taxonomy; messages are
//! human-readable and never reveal resource existence under another
//! tenant, stack traces, connection strings, raw keys, or key hashes.
//! Security headers are applied to every response, success or failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::HeaderMap;
use axum::response::IntoResponse;
use axum::response::Response;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// Stable client-visible error codes.
///
/// # Invariants
/// - Labels returned by [`ErrorCode::as_str`] never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing or malformed bearer token.
    Unauthorized,
    /// Presented secret matches no key.
    InvalidApiKey,
    /// Presented secret matches an expired key.
    ApiKeyExpired,
    /// Per-key rate bucket is empty.
    RateLimited,
    /// Manifest failed validation.
    ValidationError,
    /// Study unknown or owned by another tenant.
    StudyNotFound,
    /// Request body exceeds the configured cap.
    PayloadTooLarge,
    /// Lifecycle transition not legal from the current status.
    IllegalTransition,
    /// Internal failure; details stay server-side.
    Internal,
}

impl ErrorCode {
    /// Returns the stable label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::ApiKeyExpired => "API_KEY_EXPIRED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::StudyNotFound => "STUDY_NOT_FOUND",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::IllegalTransition => "ILLEGAL_TRANSITION",
            Self::Internal => "UNKNOWN",
        }
    }

    /// Returns the HTTP status for the code.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidApiKey | Self::ApiKeyExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::StudyNotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::IllegalTransition => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// ============================================================================
// SECTION: API Error
// ============================================================================

/// Client-visible error with a stable code and a safe message.
///
/// # Invariants
/// - `message` never echoes request payloads or internal identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable, safe message.
    pub message: String,
    /// Retry hint in seconds for rate-limited requests.
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after_secs: None,
        }
    }

    /// Creates a rate-limit error carrying a retry hint.
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            code: ErrorCode::RateLimited,
            message: "rate limit exceeded".to_string(),
            retry_after_secs: Some(retry_after_secs),
        }
    }

    /// The canonical not-found error; identical for unknown and unowned
    /// studies.
    #[must_use]
    pub fn study_not_found() -> Self {
        Self::new(ErrorCode::StudyNotFound, "study not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
            },
        });
        let mut response = (self.code.status(), Json(body)).into_response();
        if let Some(retry_after) = self.retry_after_secs
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert("Retry-After", value);
        }
        apply_security_headers(response.headers_mut());
        response
    }
}

// ============================================================================
// SECTION: Success Envelope
// ============================================================================

/// Builds a success response with the standard envelope.
#[must_use]
pub fn ok_response(status: StatusCode, data: Value) -> Response {
    let body = json!({
        "success": true,
        "data": data,
    });
    let mut response = (status, Json(body)).into_response();
    apply_security_headers(response.headers_mut());
    response
}

// ============================================================================
// SECTION: Security Headers
// ============================================================================

/// Applies the mandatory security headers to a response.
///
/// No `Server` header is ever set; nothing discloses a version.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.remove("Server");
}
