// crates/bentham-gateway/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: HTTP surface routing tenant requests to the orchestrator.
// Purpose: Authenticate, scope, and envelope every request.
// Dependencies: axum, bentham-auth, bentham-core, serde_json, tokio
// ============================================================================

//! ## Overview
//! The gateway is the only client-facing surface. Every handler runs the
//! same discipline: authenticate the bearer, consume a rate token, bind
//! the tenant from the resolved key, call the orchestrator with that
//! tenant first, and wrap the outcome in the stable envelope. The gateway
//! never calls the repositories directly; tenant scoping is enforced here
//! and defensively again at the store. Security headers are applied to
//! every response and nothing in an error body reveals whether a resource
//! exists under another tenant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use bentham_auth::ApiKeyStore;
use bentham_auth::RateLimiter;
use bentham_core::JobResult;
use bentham_core::Orchestrator;
use bentham_core::OrchestratorError;
use bentham_core::SharedClock;
use bentham_core::StudyId;
use bentham_core::StudyManifest;
use bentham_core::StudyRepository;
use bentham_core::TenantId;
use bentham_core::TransitionOutcome;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthContext;
use crate::auth::authenticate;
use crate::config::GatewayConfig;
use crate::envelope::ApiError;
use crate::envelope::ErrorCode;
use crate::envelope::apply_security_headers;
use crate::envelope::ok_response;
use crate::telemetry::AuditEvent;
use crate::telemetry::AuditSink;
use crate::telemetry::GatewayMetricEvent;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::GatewayOutcome;
use crate::telemetry::GatewayRoute;

// ============================================================================
// SECTION: Health Probes
// ============================================================================

/// Named readiness probe contributing to the health checks map.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns the probe name used as the checks key.
    fn name(&self) -> &str;

    /// Returns true when the dependency is reachable.
    async fn check(&self) -> bool;
}

/// Probe backed by a repository reachability read.
///
/// # Invariants
/// - The probe tenant never owns studies; the read only tests reachability.
pub struct RepositoryProbe {
    /// Checks-map key.
    name: String,
    /// Repository to probe.
    studies: Arc<dyn StudyRepository>,
}

impl RepositoryProbe {
    /// Creates a repository probe under the given checks key.
    #[must_use]
    pub fn new(name: impl Into<String>, studies: Arc<dyn StudyRepository>) -> Self {
        Self {
            name: name.into(),
            studies,
        }
    }
}

#[async_trait]
impl HealthProbe for RepositoryProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> bool {
        self.studies.find_by_tenant(&TenantId::new("__health_probe__")).await.is_ok()
    }
}

/// Probe with a fixed outcome.
///
/// # Invariants
/// - Used for components whose liveness is implied by the process.
pub struct StaticProbe {
    /// Checks-map key.
    name: String,
    /// Fixed outcome.
    healthy: bool,
}

impl StaticProbe {
    /// Creates a static probe under the given checks key.
    #[must_use]
    pub fn new(name: impl Into<String>, healthy: bool) -> Self {
        Self {
            name: name.into(),
            healthy,
        }
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> bool {
        self.healthy
    }
}

// ============================================================================
// SECTION: App State
// ============================================================================

/// Shared state for every gateway handler.
///
/// # Invariants
/// - Handlers reach the control plane only through the orchestrator.
#[derive(Clone)]
pub struct AppState {
    /// Study orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// API key store.
    pub keys: Arc<ApiKeyStore>,
    /// Per-key rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Clock for auth and rate decisions.
    pub clock: SharedClock,
    /// Gateway configuration.
    pub config: GatewayConfig,
    /// Metrics sink.
    pub metrics: Arc<dyn GatewayMetrics>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Health probes in checks-map order.
    pub probes: Arc<Vec<Box<dyn HealthProbe>>>,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the gateway router over the given state.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let body_cap = state.config.body_limit_bytes.saturating_mul(2).max(1);
    Router::new()
        .route("/v1/studies", post(create_study))
        .route("/v1/studies/{id}", get(study_status).delete(cancel_study))
        .route("/v1/studies/{id}/results", get(study_results))
        .route("/v1/studies/{id}/pause", post(pause_study))
        .route("/v1/studies/{id}/resume", post(resume_study))
        .route("/v1/costs/{id}", get(study_costs))
        .route("/v1/health", get(health))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_cap))
        .with_state(state)
}

/// Serving errors.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Listener could not bind.
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    /// Server terminated with an error.
    #[error("serve failed: {0}")]
    Serve(std::io::Error),
}

/// Serves the gateway on the given address until the process stops.
///
/// # Errors
///
/// Returns [`ServeError`] when the listener cannot bind or serving fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), ServeError> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(ServeError::Bind)?;
    axum::serve(listener, router).await.map_err(ServeError::Serve)
}

// ============================================================================
// SECTION: Handler Plumbing
// ============================================================================

/// Finalizes a handler outcome: envelope, headers, metrics, and latency.
fn finish(
    state: &AppState,
    route: GatewayRoute,
    started: Instant,
    result: Result<Response, ApiError>,
) -> Response {
    let (response, outcome, error_code) = match result {
        Ok(response) => (response, GatewayOutcome::Ok, None),
        Err(error) => {
            let code = error.code.as_str();
            (error.into_response(), GatewayOutcome::Error, Some(code))
        }
    };
    let event = GatewayMetricEvent {
        route,
        outcome,
        status: response.status().as_u16(),
        error_code,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, started.elapsed());
    response
}

/// Authenticates a request, auditing denials.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    match authenticate(&state.keys, &state.limiter, headers, state.clock.now()) {
        Ok(context) => Ok(context),
        Err(error) => {
            state.audit.record(&AuditEvent::AuthDenied {
                code: error.code.as_str(),
            });
            Err(error)
        }
    }
}

/// Maps orchestrator errors onto the client taxonomy.
fn map_orchestrator_error(error: OrchestratorError) -> ApiError {
    match error {
        OrchestratorError::Validation(errors) => {
            let message = if errors.is_empty() {
                "manifest validation failed".to_string()
            } else {
                errors.join("; ")
            };
            ApiError::new(ErrorCode::ValidationError, message)
        }
        OrchestratorError::Store(_) => ApiError::new(ErrorCode::Internal, "internal error"),
    }
}

/// Maps a transition outcome onto a response for the given applied label.
fn map_transition(outcome: TransitionOutcome, applied_status: &str) -> Result<Response, ApiError> {
    match outcome {
        TransitionOutcome::Applied => {
            Ok(ok_response(StatusCode::OK, json!({"status": applied_status})))
        }
        TransitionOutcome::NotFound => Err(ApiError::study_not_found()),
        TransitionOutcome::Illegal {
            ..
        } => Err(ApiError::new(
            ErrorCode::IllegalTransition,
            "transition not allowed from the current status",
        )),
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// POST `/v1/studies`.
async fn create_study(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = Instant::now();
    let result = handle_create_study(&state, &headers, &body).await;
    finish(&state, GatewayRoute::CreateStudy, started, result)
}

/// Admission flow for POST `/v1/studies`.
async fn handle_create_study(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, ApiError> {
    let context = authorize(state, headers)?;
    if body.len() > state.config.body_limit_bytes {
        return Err(ApiError::new(
            ErrorCode::PayloadTooLarge,
            "request body exceeds the configured limit",
        ));
    }
    let manifest: StudyManifest = serde_json::from_slice(body)
        .map_err(|_| ApiError::new(ErrorCode::ValidationError, "malformed manifest body"))?;
    let admission = state
        .orchestrator
        .create_study(&context.tenant_id, manifest)
        .await
        .map_err(map_orchestrator_error)?;
    Ok(ok_response(
        StatusCode::CREATED,
        json!({
            "studyId": admission.study_id,
            "status": admission.status.external_label(),
            "createdAt": admission.created_at,
        }),
    ))
}

/// GET `/v1/studies/{id}`.
async fn study_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_study_status(&state, &headers, &id).await;
    finish(&state, GatewayRoute::StudyStatus, started, result)
}

/// Status flow for GET `/v1/studies/{id}`.
async fn handle_study_status(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response, ApiError> {
    let context = authorize(state, headers)?;
    let report = state
        .orchestrator
        .study_status(&context.tenant_id, &StudyId::new(id))
        .await
        .map_err(map_orchestrator_error)?
        .ok_or_else(ApiError::study_not_found)?;
    let surfaces: Vec<Value> = report
        .surfaces
        .iter()
        .map(|surface| {
            json!({
                "surfaceId": surface.surface_id,
                "scheduled": surface.scheduled,
                "succeeded": surface.succeeded,
                "failed": surface.failed,
            })
        })
        .collect();
    Ok(ok_response(
        StatusCode::OK,
        json!({
            "studyId": report.study_id,
            "status": report.status.external_label(),
            "progress": {
                "totalCells": report.progress.total_cells,
                "completedCells": report.progress.completed_cells,
                "failedCells": report.progress.failed_cells,
                "pendingCells": report.progress.pending_cells,
                "completionPercentage": report.progress.completion_percentage,
            },
            "surfaces": surfaces,
            "failureCause": report.failure_cause,
            "createdAt": report.created_at,
            "startedAt": report.started_at,
            "completedAt": report.completed_at,
        }),
    ))
}

/// GET `/v1/studies/{id}/results`.
async fn study_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_study_results(&state, &headers, &id).await;
    finish(&state, GatewayRoute::StudyResults, started, result)
}

/// Results flow for GET `/v1/studies/{id}/results`.
async fn handle_study_results(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response, ApiError> {
    let context = authorize(state, headers)?;
    let results = state
        .orchestrator
        .study_results(&context.tenant_id, &StudyId::new(id))
        .await
        .map_err(map_orchestrator_error)?
        .ok_or_else(ApiError::study_not_found)?;
    let cells: Vec<Value> = results
        .cells
        .iter()
        .map(|cell| {
            json!({
                "jobId": cell.job_id,
                "queryText": cell.query_text,
                "surfaceId": cell.surface_id,
                "locationId": cell.location_id,
                "attemptCount": cell.attempt_count,
                "result": cell.result.as_ref().map(render_result),
            })
        })
        .collect();
    Ok(ok_response(
        StatusCode::OK,
        json!({
            "studyId": results.study_id,
            "cells": cells,
            "summary": {
                "totalCells": results.summary.total_cells,
                "successfulQueries": results.summary.successful_queries,
                "failedQueries": results.summary.failed_queries,
                "averageResponseTimeMs": results.summary.average_response_time_ms,
            },
        }),
    ))
}

/// Renders a captured result in wire casing.
fn render_result(result: &JobResult) -> Value {
    json!({
        "success": result.success,
        "responseText": result.response.as_ref().map(|response| response.main_text.clone()),
        "citations": result
            .response
            .as_ref()
            .map(|response| response.citations.clone())
            .unwrap_or_default(),
        "timing": {
            "totalMs": result.timing.total_ms,
            "ttfbMs": result.timing.ttfb_ms,
        },
        "tokenUsage": result.token_usage.map(|usage| {
            json!({
                "inputTokens": usage.input_tokens,
                "outputTokens": usage.output_tokens,
                "totalTokens": usage.total_tokens,
                "costEstimate": usage.cost_estimate,
            })
        }),
        "validation": {
            "qualityGatesPassed": result.validation.quality_gates_passed,
            "isActualContent": result.validation.is_actual_content,
            "responseLength": result.validation.response_length,
        },
        "session": {
            "sessionId": result.session.session_id,
            "userAgent": result.session.user_agent,
        },
        "capturedAt": result.captured_at,
    })
}

/// POST `/v1/studies/{id}/pause`.
async fn pause_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_transition(&state, &headers, &id, "pause").await;
    finish(&state, GatewayRoute::PauseStudy, started, result)
}

/// POST `/v1/studies/{id}/resume`.
async fn resume_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_transition(&state, &headers, &id, "resume").await;
    finish(&state, GatewayRoute::ResumeStudy, started, result)
}

/// DELETE `/v1/studies/{id}`.
async fn cancel_study(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_transition(&state, &headers, &id, "cancel").await;
    finish(&state, GatewayRoute::CancelStudy, started, result)
}

/// Shared lifecycle-transition flow.
async fn handle_transition(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    action: &'static str,
) -> Result<Response, ApiError> {
    let context = authorize(state, headers)?;
    let study_id = StudyId::new(id);
    let outcome = match action {
        "pause" => state.orchestrator.pause_study(&context.tenant_id, &study_id).await,
        "resume" => state.orchestrator.resume_study(&context.tenant_id, &study_id).await,
        _ => state.orchestrator.cancel_study(&context.tenant_id, &study_id).await,
    }
    .map_err(map_orchestrator_error)?;
    state.audit.record(&AuditEvent::LifecycleTransition {
        tenant_id: context.tenant_id,
        study_id,
        action,
        applied: outcome.was_applied(),
    });
    let applied_status = match action {
        "pause" => "paused",
        "resume" => "running",
        _ => "cancelled",
    };
    map_transition(outcome, applied_status)
}

/// GET `/v1/costs/{id}`.
async fn study_costs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let result = handle_study_costs(&state, &headers, &id).await;
    finish(&state, GatewayRoute::StudyCosts, started, result)
}

/// Cost flow for GET `/v1/costs/{id}`.
async fn handle_study_costs(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response, ApiError> {
    let context = authorize(state, headers)?;
    let report = state
        .orchestrator
        .study_costs(&context.tenant_id, &StudyId::new(id))
        .await
        .map_err(map_orchestrator_error)?
        .ok_or_else(ApiError::study_not_found)?;
    Ok(ok_response(
        StatusCode::OK,
        json!({
            "total": report.actual.total,
            "currency": report.actual.currency,
            "breakdown": report.actual.breakdown,
            "estimated": {
                "min": report.estimated.min,
                "max": report.estimated.max,
                "currency": report.estimated.currency,
            },
        }),
    ))
}

/// GET `/v1/health` and `/health`.
async fn health(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let mut checks = serde_json::Map::new();
    let mut all_healthy = true;
    for probe in state.probes.iter() {
        let healthy = probe.check().await;
        all_healthy &= healthy;
        checks.insert(
            probe.name().to_string(),
            Value::String(if healthy { "ok" } else { "failed" }.to_string()),
        );
    }
    let status_label = if all_healthy { "ok" } else { "degraded" };
    let mut response = (
        StatusCode::OK,
        axum::Json(json!({
            "status": status_label,
            "checks": Value::Object(checks),
        })),
    )
        .into_response();
    apply_security_headers(response.headers_mut());
    let event = GatewayMetricEvent {
        route: GatewayRoute::Health,
        outcome: GatewayOutcome::Ok,
        status: response.status().as_u16(),
        error_code: None,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, started.elapsed());
    response
}
