// crates/bentham-core/src/interfaces/mod.rs
// ============================================================================
// Module: Bentham Interfaces
// Description: Backend-agnostic seams for surfaces, validation, and storage.
// Purpose: Define the contract surfaces consumed by the control-plane runtime.
// Dependencies: async-trait, serde, serde_json, thiserror, crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the control plane integrates with surface
//! adapters, manifest validators, and persistence backends without
//! embedding backend-specific details. Implementations must fail closed on
//! missing or invalid data; tenant scoping is enforced defensively at the
//! repository boundary in addition to the gateway.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::cancel::CancellationToken;
use crate::core::failure::FailureKind;
use crate::core::identifiers::JobId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::SurfaceId;
use crate::core::identifiers::TenantId;
use crate::core::job::Citation;
use crate::core::job::Job;
use crate::core::job::JobResult;
use crate::core::job::JobStatus;
use crate::core::job::TokenUsage;
use crate::core::manifest::EvidenceLevel;
use crate::core::manifest::StudyManifest;
use crate::core::study::Study;
use crate::core::study::StudyStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Surface Adapter Contract
// ============================================================================

/// Request executed against a surface.
///
/// # Invariants
/// - `query` is the literal prompt; the adapter applies no templating.
/// - `options` is the opaque per-surface record from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query text.
    pub query: String,
    /// Optional model override.
    pub model: Option<String>,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
    /// Optional prior conversation turns, oldest first.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// Optional sampling temperature.
    pub temperature: Option<f64>,
    /// Optional completion token cap.
    pub max_tokens: Option<u32>,
    /// Optional per-call location override.
    pub location: Option<LocationId>,
    /// Evidence-capture directive for this call.
    pub evidence_level: EvidenceLevel,
    /// Session the call executes under.
    pub session_id: SessionId,
    /// Opaque per-surface options from the manifest.
    pub options: Option<Value>,
}

/// One prior turn in a conversation history.
///
/// # Invariants
/// - `role` is `user` or `assistant`; adapters reject other values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Turn role.
    pub role: String,
    /// Turn content.
    pub content: String,
}

/// Successful adapter response.
///
/// # Invariants
/// - `text` is the canonical response body.
/// - `provenance` is raw and untrusted; captured only when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Response text.
    pub text: String,
    /// Structured citations when the surface provides them.
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Call duration in milliseconds.
    pub duration_ms: u64,
    /// Time to first byte in milliseconds when measurable.
    pub ttfb_ms: Option<u64>,
    /// Token usage when the surface reports it.
    pub token_usage: Option<TokenUsage>,
    /// Raw provenance blob when the evidence level requests it.
    pub provenance: Option<Value>,
}

/// Classified adapter failure.
///
/// # Invariants
/// - `kind` drives retry policy; `message` is safe for internal logs only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AdapterFailure {
    /// Stable failure classification.
    pub kind: FailureKind,
    /// Internal diagnostic message.
    pub message: String,
}

impl AdapterFailure {
    /// Creates a classified failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Uniform capability for executing one query against one surface.
///
/// Implementers fall into three families (REST JSON APIs, browser-driven
/// adapters, and a CDP-mediated fallback); the control plane treats all of
/// them through this contract.
#[async_trait]
pub trait SurfaceAdapter: Send + Sync {
    /// Executes one query against the surface.
    ///
    /// Adapters observe `cancel` at their own suspension points; adapters
    /// that cannot abort are abandoned by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterFailure`] with a stable classification on any
    /// non-success outcome.
    async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure>;

    /// Performs a minimal synthetic query to probe surface health.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterFailure`] when the surface is unhealthy.
    async fn health_check(&self) -> Result<(), AdapterFailure>;

    /// Releases any session resources held by the adapter.
    async fn close(&self);
}

// ============================================================================
// SECTION: Surface Resolution
// ============================================================================

/// Resolves surface identifiers to adapters at execution time.
///
/// Discovery happens at composition time; implementations never mutate
/// their registry after process start.
pub trait SurfaceResolver: Send + Sync {
    /// Returns the adapter for a surface when one is registered.
    fn resolve(&self, surface_id: &SurfaceId) -> Option<Arc<dyn SurfaceAdapter>>;
}

// ============================================================================
// SECTION: Manifest Validator
// ============================================================================

/// Validation outcome for a manifest.
///
/// # Invariants
/// - `ok = true` implies `errors` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether the manifest is well-formed.
    pub ok: bool,
    /// Human-readable validation errors; safe for client display.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Returns a passing report.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    /// Returns a failing report with the given errors.
    #[must_use]
    pub const fn invalid(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            errors,
        }
    }
}

/// Deterministic, tenant-agnostic manifest validator.
pub trait ManifestValidator: Send + Sync {
    /// Validates manifest well-formedness against the given admission time.
    fn validate(&self, manifest: &StudyManifest, now: Timestamp) -> ValidationReport;
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors surfaced by repository implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never contain tenant identifiers of other tenants.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record does not exist.
    #[error("record not found")]
    NotFound,
    /// Compare-and-set precondition failed.
    #[error("concurrent update conflict")]
    Conflict,
    /// Duplicate primary identifier.
    #[error("record already exists")]
    AlreadyExists,
    /// Backend reported an error.
    #[error("store backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: Study Repository
// ============================================================================

/// Field-level patch for a study record.
///
/// # Invariants
/// - `expected_status` makes the update a compare-and-set; mismatch yields
///   [`StoreError::Conflict`] without side effects.
/// - Counter fields are strictly additive.
#[derive(Debug, Clone, Default)]
pub struct StudyPatch {
    /// Required current status for compare-and-set updates.
    pub expected_status: Option<StudyStatus>,
    /// New status when transitioning.
    pub status: Option<StudyStatus>,
    /// Failure cause recorded on failed studies.
    pub failure_cause: Option<String>,
    /// Execution start timestamp.
    pub started_at: Option<Timestamp>,
    /// Completion timestamp for terminal states.
    pub completed_at: Option<Timestamp>,
    /// Increment for the succeeded-cell counter.
    pub add_completed_cells: u64,
    /// Increment for the failed-cell counter.
    pub add_failed_cells: u64,
    /// Additive actual-cost contribution keyed by surface.
    pub add_cost: Option<(SurfaceId, f64)>,
}

/// Tenant-scoped study persistence.
#[async_trait]
pub trait StudyRepository: Send + Sync {
    /// Persists a new study.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] on duplicate study identifiers.
    async fn create(&self, study: Study) -> Result<(), StoreError>;

    /// Finds a study by identifier, scoped to the owning tenant.
    ///
    /// Returns `Ok(None)` when the study does not exist or belongs to a
    /// different tenant; callers cannot distinguish the two cases.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failures.
    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<Option<Study>, StoreError>;

    /// Applies a field-level patch and returns the updated study.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `expected_status` does not
    /// match and [`StoreError::NotFound`] for unknown studies.
    async fn update(&self, study_id: &StudyId, patch: StudyPatch) -> Result<Study, StoreError>;

    /// Lists every study owned by the tenant, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failures.
    async fn find_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Study>, StoreError>;
}

// ============================================================================
// SECTION: Job Repository
// ============================================================================

/// Field-level patch for a job record.
///
/// # Invariants
/// - `expected_status` makes the update a compare-and-set; mismatch yields
///   [`StoreError::Conflict`] without side effects.
/// - `result` is written at most once; later writes are rejected.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    /// Required current status for compare-and-set updates.
    pub expected_status: Option<JobStatus>,
    /// New execution status.
    pub status: Option<JobStatus>,
    /// New attempt count; must be monotonic.
    pub attempt_count: Option<u32>,
    /// Classification of the most recent failure.
    pub last_error: Option<FailureKind>,
    /// Immutable outcome written when the cell settles.
    pub result: Option<JobResult>,
}

/// Study-scoped job persistence.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persists a new job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] on duplicate job identifiers.
    async fn create(&self, job: Job) -> Result<(), StoreError>;

    /// Finds a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failures.
    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Applies a field-level patch and returns the updated job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when `expected_status` does not
    /// match and [`StoreError::NotFound`] for unknown jobs.
    async fn update(&self, job_id: &JobId, patch: JobPatch) -> Result<Job, StoreError>;

    /// Lists every job for a study in emission order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failures.
    async fn find_by_study(&self, study_id: &StudyId) -> Result<Vec<Job>, StoreError>;

    /// Lists pending jobs for a study in emission order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on backend failures.
    async fn find_pending(&self, study_id: &StudyId) -> Result<Vec<Job>, StoreError>;
}
