// crates/bentham-core/src/core/manifest.rs
// ============================================================================
// Module: Study Manifest
// Description: Declarative study description submitted by tenants.
// Purpose: Define the query/surface/location matrix and its execution policy.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A manifest declares everything the control plane needs to execute a
//! study: the queries, the surfaces, the locations, the completion
//! criteria, and the capture policy. The manifest is immutable after
//! admission; the orchestrator validates well-formedness through the
//! [`crate::interfaces::ManifestValidator`] seam before persisting anything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::LocationId;
use crate::core::identifiers::SurfaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Queries
// ============================================================================

/// A single query within a study.
///
/// # Invariants
/// - `text` is the literal prompt sent to surfaces; no templating applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Query text sent verbatim to each surface.
    pub text: String,
    /// Optional category tags for tenant-side grouping.
    #[serde(default)]
    pub categories: Vec<String>,
}

// ============================================================================
// SECTION: Surface References
// ============================================================================

/// Reference to a surface the study targets.
///
/// # Invariants
/// - `options` is an opaque, validator-checked configuration record; the
///   core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceRef {
    /// Surface identifier resolved through the registry.
    pub surface_id: SurfaceId,
    /// Whether this surface participates in completion criteria.
    #[serde(default)]
    pub required: bool,
    /// Opaque per-surface options forwarded to the adapter.
    #[serde(default)]
    pub options: Option<Value>,
}

// ============================================================================
// SECTION: Locations
// ============================================================================

/// Proxy type used to reach a location.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyType {
    /// Direct egress without a proxy.
    None,
    /// Datacenter proxy pool.
    Datacenter,
    /// Residential proxy pool.
    Residential,
}

/// Geographic location a cell executes from.
///
/// # Invariants
/// - `sticky = true` pins a stable egress identity for the whole study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSpec {
    /// Location identifier.
    pub location_id: LocationId,
    /// Proxy type used for egress.
    pub proxy_type: ProxyType,
    /// Whether the egress identity is sticky across cells.
    #[serde(default)]
    pub sticky: bool,
}

// ============================================================================
// SECTION: Completion Criteria
// ============================================================================

/// Required-surface coverage set for completion evaluation.
///
/// # Invariants
/// - `surface_ids` lists surfaces that must each meet the coverage threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredSurfaces {
    /// Surfaces whose coverage is mandatory.
    pub surface_ids: Vec<SurfaceId>,
}

/// Criteria deciding when a study is complete.
///
/// # Invariants
/// - `coverage_threshold` is in `[0, 1]`; enforced by the validator.
/// - `max_retries_per_cell` bounds recovery attempts per cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCriteria {
    /// Surfaces that must meet the coverage threshold.
    pub required_surfaces: RequiredSurfaces,
    /// Minimum succeeded/scheduled ratio per required surface.
    pub coverage_threshold: f64,
    /// Maximum recovery attempts per cell before it counts as exhausted.
    pub max_retries_per_cell: u32,
}

// ============================================================================
// SECTION: Quality Gates
// ============================================================================

/// Response quality gates recorded on every captured result.
///
/// # Invariants
/// - Gates annotate results; only `require_actual_content` affects retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGates {
    /// Minimum main-text length in characters.
    pub min_response_length: usize,
    /// Reject empty or placeholder responses as failures.
    pub require_actual_content: bool,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            min_response_length: 0,
            require_actual_content: true,
        }
    }
}

// ============================================================================
// SECTION: Capture Policy
// ============================================================================

/// Depth of captured provenance per cell.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    /// Timing, token usage, and session metadata only.
    #[default]
    Metadata,
    /// Metadata plus rendered screenshots for browser surfaces.
    Screenshots,
    /// Full provenance including raw response blobs.
    Full,
}

/// Session isolation mode for surface sessions.
///
/// # Invariants
/// - No mode ever shares a session across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionIsolation {
    /// One session per (tenant, surface), reused across the tenant's studies.
    Shared,
    /// One session per (tenant, surface, study).
    #[default]
    PerTenant,
    /// A fresh session per cell.
    PerQuery,
}

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Declarative study description provided by the tenant.
///
/// # Invariants
/// - At least one query, surface, and location; enforced by the validator.
/// - `deadline` is strictly in the future at admission.
/// - Immutable once the study is admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyManifest {
    /// Human-readable study name.
    pub name: String,
    /// Ordered, non-empty sequence of queries.
    pub queries: Vec<QuerySpec>,
    /// Non-empty set of surface references.
    pub surfaces: Vec<SurfaceRef>,
    /// Non-empty set of locations.
    pub locations: Vec<LocationSpec>,
    /// Completion criteria for the study.
    pub completion_criteria: CompletionCriteria,
    /// Response quality gates.
    #[serde(default)]
    pub quality_gates: QualityGates,
    /// Provenance capture depth.
    #[serde(default)]
    pub evidence_level: EvidenceLevel,
    /// Legal hold flag preventing evidence expiry.
    #[serde(default)]
    pub legal_hold: bool,
    /// Absolute execution deadline.
    pub deadline: Timestamp,
    /// Session isolation mode.
    #[serde(default)]
    pub session_isolation: SessionIsolation,
    /// Maximum concurrent workers for this study.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

impl StudyManifest {
    /// Returns the total number of cells this manifest expands to.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        let queries = u64::try_from(self.queries.len()).unwrap_or(u64::MAX);
        let surfaces = u64::try_from(self.surfaces.len()).unwrap_or(u64::MAX);
        let locations = u64::try_from(self.locations.len()).unwrap_or(u64::MAX);
        queries.saturating_mul(surfaces).saturating_mul(locations)
    }

    /// Returns the surface reference for the given surface when present.
    #[must_use]
    pub fn surface_ref(&self, surface_id: &SurfaceId) -> Option<&SurfaceRef> {
        self.surfaces.iter().find(|surface| &surface.surface_id == surface_id)
    }
}
