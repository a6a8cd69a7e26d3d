// crates/bentham-core/src/core/failure.rs
// ============================================================================
// Module: Failure Classification
// Description: Typed failure kinds for adapter, recovery, and executor paths.
// Purpose: Drive retry policy and record stable causes on jobs and studies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every non-success outcome in the execution pipeline is classified into a
//! stable [`FailureKind`]. The recovery manager keys its retry policy off
//! the classification; the executor records it on the job; the gateway
//! never surfaces these kinds directly, and client-visible errors use the
//! gateway's own taxonomy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Failure Kinds
// ============================================================================

/// Stable classification of execution failures.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Labels returned by [`FailureKind::as_str`] never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Circuit breaker is open for the surface.
    CircuitOpen,
    /// Upstream surface rate limit.
    RateLimit,
    /// Anti-bot interstitial or challenge detected.
    AntiBot,
    /// Surface session expired or was invalidated.
    SessionExpired,
    /// Attempt or job exceeded its time budget.
    Timeout,
    /// Network-level failure reaching the surface.
    NetworkError,
    /// Study deadline passed before completion.
    DeadlineExceeded,
    /// Study was cancelled by the tenant.
    Cancelled,
    /// No adapter is registered for the surface.
    SurfaceUnavailable,
    /// Unclassified failure.
    Unknown,
}

impl FailureKind {
    /// Returns the stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::RateLimit => "RATE_LIMIT",
            Self::AntiBot => "ANTI_BOT",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Timeout => "TIMEOUT",
            Self::NetworkError => "NETWORK_ERROR",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Cancelled => "CANCELLED",
            Self::SurfaceUnavailable => "SURFACE_UNAVAILABLE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true when the same adapter may be retried after this failure.
    #[must_use]
    pub const fn is_retryable_same_path(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Timeout | Self::NetworkError | Self::Unknown
        )
    }

    /// Returns true when the failure invalidates the adapter session.
    ///
    /// Session-invalidating failures break out of the retry loop; the
    /// recovery manager moves straight to fallback paths.
    #[must_use]
    pub const fn invalidates_session(self) -> bool {
        matches!(self, Self::AntiBot | Self::SessionExpired)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
