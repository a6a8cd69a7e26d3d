// crates/bentham-gateway/src/config.rs
// ============================================================================
// Module: Gateway Configuration
// Description: Request caps and serving options for the HTTP surface.
// Purpose: Bound request bodies before any parsing happens.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Gateway configuration bounds inbound requests. The body cap applies
//! before JSON parsing; manifests above it are rejected with
//! `PAYLOAD_TOO_LARGE` and never reach the validator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Gateway configuration.
///
/// # Invariants
/// - `body_limit_bytes >= 1`; enforced before JSON parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            body_limit_bytes: 1024 * 1024,
        }
    }
}
