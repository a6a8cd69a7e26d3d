// crates/bentham-core/src/core/job.rs
// ============================================================================
// Module: Job State
// Description: Cell records, statuses, and captured results.
// Purpose: Model the atomic unit of work and its immutable outcome.
// Dependencies: serde, serde_json, crate::core::{failure, identifiers, time}
// ============================================================================

//! ## Overview
//! A job is the runtime record for one (query, surface, location) cell.
//! The cell identity (study id, query index, surface id, location id) is
//! unique within a study and acts as the idempotency key: once a job
//! transitions to `succeeded` it never runs again. A [`JobResult`] is
//! immutable once written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::failure::FailureKind;
use crate::core::identifiers::JobId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::SurfaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Job Status
// ============================================================================

/// Cell execution status.
///
/// # Invariants
/// - `pending → running → succeeded | failed`; `succeeded` is final.
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Emitted and awaiting a worker claim.
    Pending,
    /// Claimed by a worker.
    Running,
    /// Completed with a successful result.
    Succeeded,
    /// Completed with a classified failure.
    Failed,
}

// ============================================================================
// SECTION: Response Capture
// ============================================================================

/// Structured response captured from a surface.
///
/// # Invariants
/// - `main_text` is the canonical response body; citations are optional
///   surface-provided metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResponse {
    /// Main response text.
    pub main_text: String,
    /// Structured citations when the surface provides them.
    #[serde(default)]
    pub citations: Vec<Citation>,
    /// Suggested follow-up queries when the surface provides them.
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

/// A single citation attached to a response.
///
/// # Invariants
/// - `url` is surface-provided and untrusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Citation title when available.
    pub title: Option<String>,
    /// Citation URL.
    pub url: String,
}

/// Timing captured for one cell execution.
///
/// # Invariants
/// - `total_ms` covers the whole recovery chain, not a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTiming {
    /// Total wall time in milliseconds.
    pub total_ms: u64,
    /// Time to first byte in milliseconds when measurable.
    pub ttfb_ms: Option<u64>,
}

/// Token usage reported by a surface.
///
/// # Invariants
/// - `total_tokens = input_tokens + output_tokens` when the surface reports
///   both; surfaces that report only totals leave the parts at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
    /// Total tokens for the call.
    pub total_tokens: u64,
    /// Cost estimate for the call in the study currency.
    pub cost_estimate: f64,
}

/// Quality-gate evaluation recorded on a result.
///
/// # Invariants
/// - Computed once at capture time against the manifest gates; immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Whether every configured gate passed.
    pub quality_gates_passed: bool,
    /// Whether the response carries actual content.
    pub is_actual_content: bool,
    /// Main-text length in characters.
    pub response_length: usize,
}

/// Session context a cell executed under.
///
/// # Invariants
/// - Session identity derivation follows the manifest isolation mode and
///   never crosses tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Session identifier.
    pub session_id: SessionId,
    /// User agent presented to the surface when applicable.
    pub user_agent: Option<String>,
}

// ============================================================================
// SECTION: Job Result
// ============================================================================

/// Immutable outcome captured for one cell.
///
/// # Invariants
/// - Written exactly once when the cell settles; never mutated afterwards.
/// - `success = true` implies `response` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Whether the cell succeeded.
    pub success: bool,
    /// Structured response on success.
    pub response: Option<StructuredResponse>,
    /// Timing for the whole recovery chain.
    pub timing: ResponseTiming,
    /// Token usage when the surface reports it.
    pub token_usage: Option<TokenUsage>,
    /// Quality-gate evaluation.
    pub validation: ValidationSummary,
    /// Session context for the execution.
    pub session: SessionContext,
    /// Raw provenance blob when the evidence level requests it.
    pub provenance: Option<Value>,
    /// Capture timestamp.
    pub captured_at: Timestamp,
}

// ============================================================================
// SECTION: Job Record
// ============================================================================

/// Runtime record for one (query, surface, location) cell.
///
/// # Invariants
/// - Cell identity (study id, query index, surface id, location id) is
///   unique; the derived `job_id` is deterministic over it.
/// - `attempt_count` is monotonic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Deterministic job identifier derived from cell identity.
    pub job_id: JobId,
    /// Owning study identifier.
    pub study_id: StudyId,
    /// Index into the manifest query sequence.
    pub query_index: usize,
    /// Target surface identifier.
    pub surface_id: SurfaceId,
    /// Target location identifier.
    pub location_id: LocationId,
    /// Current execution status.
    pub status: JobStatus,
    /// Recovery attempts consumed so far.
    pub attempt_count: u32,
    /// Classification of the most recent failure.
    pub last_error: Option<FailureKind>,
    /// Immutable outcome once the cell settles.
    pub result: Option<JobResult>,
}
