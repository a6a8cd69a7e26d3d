// crates/bentham-gateway/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for request metrics and audit events.
// Purpose: Provide metric and audit seams without hard dependencies.
// Dependencies: bentham-core
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for gateway request
//! counters and latency observations, plus an audit sink for auth
//! decisions and lifecycle transitions. It is intentionally
//! dependency-light so deployments can plug in Prometheus or
//! OpenTelemetry without redesign. Labels are untrusted; sinks must never
//! log secrets, key hashes, or other tenants' identifiers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use bentham_core::StudyId;
use bentham_core::TenantId;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Gateway route classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GatewayRoute {
    /// POST /v1/studies.
    CreateStudy,
    /// GET /v1/studies/{id}.
    StudyStatus,
    /// GET /v1/studies/{id}/results.
    StudyResults,
    /// POST /v1/studies/{id}/pause.
    PauseStudy,
    /// POST /v1/studies/{id}/resume.
    ResumeStudy,
    /// DELETE /v1/studies/{id}.
    CancelStudy,
    /// GET /v1/costs/{id}.
    StudyCosts,
    /// GET /v1/health and /health.
    Health,
}

impl GatewayRoute {
    /// Returns a stable label for the route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateStudy => "create_study",
            Self::StudyStatus => "study_status",
            Self::StudyResults => "study_results",
            Self::PauseStudy => "pause_study",
            Self::ResumeStudy => "resume_study",
            Self::CancelStudy => "cancel_study",
            Self::StudyCosts => "study_costs",
            Self::Health => "health",
        }
    }
}

/// Gateway request outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum GatewayOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

/// Gateway request metric event payload.
///
/// # Invariants
/// - `status` is the final HTTP status sent to the client.
#[derive(Debug, Clone)]
pub struct GatewayMetricEvent {
    /// Route classification.
    pub route: GatewayRoute,
    /// Request outcome.
    pub outcome: GatewayOutcome,
    /// Final HTTP status code.
    pub status: u16,
    /// Stable error code label when the request failed.
    pub error_code: Option<&'static str>,
}

// ============================================================================
// SECTION: Metrics Trait
// ============================================================================

/// Metrics sink for gateway requests and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records a request counter event.
    fn record_request(&self, event: GatewayMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: GatewayMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_request(&self, _event: GatewayMetricEvent) {}

    fn record_latency(&self, _event: GatewayMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Audit event emitted at the auth boundary and on lifecycle transitions.
///
/// # Invariants
/// - Never carries secrets, key hashes, or another tenant's identifiers.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Authentication was denied.
    AuthDenied {
        /// Stable error code for the denial.
        code: &'static str,
    },
    /// Authentication succeeded for a tenant.
    AuthAccepted {
        /// Authenticated tenant.
        tenant_id: TenantId,
    },
    /// A study lifecycle transition was requested.
    LifecycleTransition {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Target study.
        study_id: StudyId,
        /// Requested action label.
        action: &'static str,
        /// Whether the transition was applied.
        applied: bool,
    },
}

/// Audit sink for gateway events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

/// No-op audit sink.
///
/// # Invariants
/// - Events are intentionally discarded.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
