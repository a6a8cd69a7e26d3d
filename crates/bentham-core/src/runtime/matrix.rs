// crates/bentham-core/src/runtime/matrix.rs
// ============================================================================
// Module: Job Matrix Emission
// Description: Deterministic expansion of a manifest into cell jobs.
// Purpose: Emit Q*S*L jobs with stable identifiers in lexicographic order.
// Dependencies: sha2, crate::core
// ============================================================================

//! ## Overview
//! An admitted manifest with Q queries, S surfaces, and L locations expands
//! to Q*S*L jobs. Emission order is lexicographic by (query index, surface
//! index, location index); the executor is free to run cells in any order,
//! so emission order is only observable as the initial pending layout. The
//! cell identity (study id, query index, surface id, location id) hashes to
//! a deterministic job identifier, which makes re-emission idempotent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::JobId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::SurfaceId;
use crate::core::job::Job;
use crate::core::job::JobStatus;
use crate::core::manifest::StudyManifest;

// ============================================================================
// SECTION: Cell Identity
// ============================================================================

/// Separator for canonical cell-identity input.
const CELL_ID_SEPARATOR: u8 = 0x1f;
/// Hex length of the derived job identifier suffix.
const JOB_ID_HEX_LEN: usize = 32;

/// Derives the deterministic job identifier for a cell.
///
/// The identifier is `job_` followed by the first 32 hex characters of
/// SHA-256 over the unit-separated cell identity.
#[must_use]
pub fn cell_job_id(
    study_id: &StudyId,
    query_index: usize,
    surface_id: &SurfaceId,
    location_id: &LocationId,
) -> JobId {
    let mut hasher = Sha256::new();
    hasher.update(study_id.as_str().as_bytes());
    hasher.update([CELL_ID_SEPARATOR]);
    hasher.update(query_index.to_string().as_bytes());
    hasher.update([CELL_ID_SEPARATOR]);
    hasher.update(surface_id.as_str().as_bytes());
    hasher.update([CELL_ID_SEPARATOR]);
    hasher.update(location_id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(JOB_ID_HEX_LEN);
    for byte in digest.iter().take(JOB_ID_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    JobId::new(format!("job_{hex}"))
}

// ============================================================================
// SECTION: Matrix Expansion
// ============================================================================

/// Expands a manifest into its job matrix in emission order.
///
/// Every job starts `pending` with zero attempts and no result.
#[must_use]
pub fn emit_job_matrix(study_id: &StudyId, manifest: &StudyManifest) -> Vec<Job> {
    let mut jobs =
        Vec::with_capacity(manifest.queries.len() * manifest.surfaces.len() * manifest.locations.len());
    for (query_index, _query) in manifest.queries.iter().enumerate() {
        for surface in &manifest.surfaces {
            for location in &manifest.locations {
                jobs.push(Job {
                    job_id: cell_job_id(
                        study_id,
                        query_index,
                        &surface.surface_id,
                        &location.location_id,
                    ),
                    study_id: study_id.clone(),
                    query_index,
                    surface_id: surface.surface_id.clone(),
                    location_id: location.location_id.clone(),
                    status: JobStatus::Pending,
                    attempt_count: 0,
                    last_error: None,
                    result: None,
                });
            }
        }
    }
    jobs
}
