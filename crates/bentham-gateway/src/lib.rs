// crates/bentham-gateway/src/lib.rs
// ============================================================================
// Module: Bentham Gateway Library
// Description: Tenant-scoped HTTP surface for the execution control plane.
// Purpose: Authenticate, rate-limit, and route requests to the orchestrator.
// Dependencies: axum, bentham-auth, bentham-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! Bentham Gateway exposes the `/v1` HTTP surface: study admission,
//! status, results, costs, lifecycle transitions, and health probes.
//! Invariants:
//! - Every request binds its tenant from the resolved API key; handlers
//!   cannot substitute another tenant.
//! - Error envelopes use stable codes and never reveal resource existence
//!   under another tenant.
//! - Security headers are applied to every response.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod config;
pub mod envelope;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AuthContext;
pub use auth::authenticate;
pub use config::GatewayConfig;
pub use envelope::ApiError;
pub use envelope::ErrorCode;
pub use envelope::apply_security_headers;
pub use envelope::ok_response;
pub use server::AppState;
pub use server::HealthProbe;
pub use server::RepositoryProbe;
pub use server::ServeError;
pub use server::StaticProbe;
pub use server::build_router;
pub use server::serve;
pub use telemetry::AuditEvent;
pub use telemetry::AuditSink;
pub use telemetry::GatewayMetricEvent;
pub use telemetry::GatewayMetrics;
pub use telemetry::GatewayOutcome;
pub use telemetry::GatewayRoute;
pub use telemetry::NoopAuditSink;
pub use telemetry::NoopMetrics;
