// crates/bentham-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Study Orchestrator
// Description: Study lifecycle, admission, and tenant-scoped queries.
// Purpose: Admit manifests, emit job matrices, and drive pause/resume/cancel.
// Dependencies: rand, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The orchestrator owns the study lifecycle. Admission validates the
//! manifest through the validator seam, persists the study, emits the job
//! matrix, transitions to `queued`, and kicks the executor. Every query
//! takes the tenant identifier first and returns `None` for unknown and
//! unowned studies alike; the ambiguity is deliberate and enforced again at
//! the repository. Lifecycle transitions are serialized through the
//! store's compare-and-set discipline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::core::cost::CostActuals;
use crate::core::cost::CostEstimate;
use crate::core::cost::CostRates;
use crate::core::identifiers::JobId;
use crate::core::identifiers::LocationId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::SurfaceId;
use crate::core::identifiers::TenantId;
use crate::core::job::JobResult;
use crate::core::job::JobStatus;
use crate::core::manifest::StudyManifest;
use crate::core::study::Study;
use crate::core::study::StudyStatus;
use crate::core::time::SharedClock;
use crate::core::time::Timestamp;
use crate::interfaces::JobRepository;
use crate::interfaces::ManifestValidator;
use crate::interfaces::StoreError;
use crate::interfaces::StudyPatch;
use crate::interfaces::StudyRepository;
use crate::runtime::executor::Executor;
use crate::runtime::matrix::emit_job_matrix;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by orchestrator operations.
///
/// # Invariants
/// - Validation errors carry client-safe messages only.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Manifest failed validation; nothing was persisted.
    #[error("manifest validation failed")]
    Validation(Vec<String>),
    /// Store operation failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Admission receipt for a newly created study.
///
/// # Invariants
/// - `status` is the admission-time snapshot (`validating`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyAdmission {
    /// New study identifier.
    pub study_id: StudyId,
    /// Admission-time status.
    pub status: StudyStatus,
    /// Admission timestamp.
    pub created_at: Timestamp,
}

/// Progress counters derived from a study snapshot.
///
/// # Invariants
/// - `total_cells = completed_cells + failed_cells + pending_cells`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StudyProgress {
    /// Total emitted cells.
    pub total_cells: u64,
    /// Cells that succeeded.
    pub completed_cells: u64,
    /// Cells that failed.
    pub failed_cells: u64,
    /// Cells not yet settled.
    pub pending_cells: u64,
    /// Completion percentage rounded to the nearest integer.
    pub completion_percentage: u8,
}

/// Per-surface progress breakdown.
///
/// # Invariants
/// - `scheduled >= succeeded + failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceBreakdown {
    /// Surface identifier.
    pub surface_id: SurfaceId,
    /// Cells scheduled for this surface.
    pub scheduled: u64,
    /// Cells succeeded on this surface.
    pub succeeded: u64,
    /// Cells failed on this surface.
    pub failed: u64,
}

/// Tenant-facing status report for a study.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyStatusReport {
    /// Study identifier.
    pub study_id: StudyId,
    /// Current lifecycle status.
    pub status: StudyStatus,
    /// Progress counters.
    pub progress: StudyProgress,
    /// Per-surface breakdown.
    pub surfaces: Vec<SurfaceBreakdown>,
    /// Failure cause for failed studies.
    pub failure_cause: Option<String>,
    /// Admission timestamp.
    pub created_at: Timestamp,
    /// Execution start timestamp.
    pub started_at: Option<Timestamp>,
    /// Completion timestamp.
    pub completed_at: Option<Timestamp>,
}

/// One cell record in a results listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellRecord {
    /// Job identifier.
    pub job_id: JobId,
    /// Query text for the cell.
    pub query_text: String,
    /// Surface identifier.
    pub surface_id: SurfaceId,
    /// Location identifier.
    pub location_id: LocationId,
    /// Recovery attempts consumed.
    pub attempt_count: u32,
    /// Captured result when the cell settled.
    pub result: Option<JobResult>,
}

/// Aggregate summary over a results listing.
///
/// # Invariants
/// - `average_response_time_ms` averages succeeded cells only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultsSummary {
    /// Total cells in the study.
    pub total_cells: u64,
    /// Cells that succeeded.
    pub successful_queries: u64,
    /// Cells that failed.
    pub failed_queries: u64,
    /// Mean response time over succeeded cells.
    pub average_response_time_ms: Option<u64>,
}

/// Tenant-facing results listing for a study.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyResults {
    /// Study identifier.
    pub study_id: StudyId,
    /// Per-cell records in emission order.
    pub cells: Vec<CellRecord>,
    /// Aggregate summary.
    pub summary: ResultsSummary,
}

/// Tenant-facing cost report for a study.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    /// Accumulated actuals.
    pub actual: CostActuals,
    /// Admission-time estimate.
    pub estimated: CostEstimate,
}

// ============================================================================
// SECTION: Transition Outcome
// ============================================================================

/// Outcome of a lifecycle transition request.
///
/// # Invariants
/// - `NotFound` covers unknown and unowned studies alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition was applied.
    Applied,
    /// The study does not exist for this tenant.
    NotFound,
    /// The transition is not legal from the current status.
    Illegal {
        /// Status observed when the transition was rejected.
        current: StudyStatus,
    },
}

impl TransitionOutcome {
    /// Returns true when the transition was applied.
    #[must_use]
    pub const fn was_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Study lifecycle orchestrator.
///
/// # Invariants
/// - Every operation takes the tenant identifier first; unowned studies
///   are indistinguishable from unknown ones.
/// - Nothing is persisted when validation fails.
pub struct Orchestrator {
    /// Study repository.
    studies: Arc<dyn StudyRepository>,
    /// Job repository.
    jobs: Arc<dyn JobRepository>,
    /// Manifest validator seam.
    validator: Arc<dyn ManifestValidator>,
    /// Executor kicked at admission.
    executor: Arc<Executor>,
    /// Clock for admission and deadline checks.
    clock: SharedClock,
    /// Per-surface unit rates for admission estimates.
    rates: CostRates,
}

impl Orchestrator {
    /// Creates an orchestrator over the given seams.
    #[must_use]
    pub fn new(
        studies: Arc<dyn StudyRepository>,
        jobs: Arc<dyn JobRepository>,
        validator: Arc<dyn ManifestValidator>,
        executor: Arc<Executor>,
        clock: SharedClock,
        rates: CostRates,
    ) -> Self {
        Self {
            studies,
            jobs,
            validator,
            executor,
            clock,
            rates,
        }
    }

    /// Admits a manifest: validate, persist, emit the matrix, and kick the
    /// executor.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Validation`] when the validator rejects
    /// the manifest (nothing is persisted) and [`OrchestratorError::Store`]
    /// on persistence failures.
    pub async fn create_study(
        &self,
        tenant_id: &TenantId,
        manifest: StudyManifest,
    ) -> Result<StudyAdmission, OrchestratorError> {
        let now = self.clock.now();
        let report = self.validator.validate(&manifest, now);
        if !report.ok {
            return Err(OrchestratorError::Validation(report.errors));
        }

        let study_id = generate_study_id();
        let total_cells = manifest.cell_count();
        let study = Study {
            study_id: study_id.clone(),
            tenant_id: tenant_id.clone(),
            estimated_cost: estimate_cost(&manifest, &self.rates),
            actual_cost: CostActuals::zero(),
            manifest,
            status: StudyStatus::Validating,
            failure_cause: None,
            total_cells,
            completed_cells: 0,
            failed_cells: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
        };
        self.studies.create(study.clone()).await?;

        for job in emit_job_matrix(&study_id, &study.manifest) {
            self.jobs.create(job).await?;
        }

        let queued = self
            .studies
            .update(
                &study_id,
                StudyPatch {
                    expected_status: Some(StudyStatus::Validating),
                    status: Some(StudyStatus::Queued),
                    ..StudyPatch::default()
                },
            )
            .await?;
        self.executor.spawn_study(&queued);

        Ok(StudyAdmission {
            study_id,
            status: StudyStatus::Validating,
            created_at: now,
        })
    }

    /// Returns the status report for an owned study.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn study_status(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<Option<StudyStatusReport>, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(None);
        };
        let jobs = self.jobs.find_by_study(study_id).await?;
        let mut surfaces: Vec<SurfaceBreakdown> = Vec::new();
        for surface in &study.manifest.surfaces {
            let scheduled = jobs
                .iter()
                .filter(|job| job.surface_id == surface.surface_id)
                .count();
            let succeeded = jobs
                .iter()
                .filter(|job| {
                    job.surface_id == surface.surface_id && job.status == JobStatus::Succeeded
                })
                .count();
            let failed = jobs
                .iter()
                .filter(|job| {
                    job.surface_id == surface.surface_id && job.status == JobStatus::Failed
                })
                .count();
            surfaces.push(SurfaceBreakdown {
                surface_id: surface.surface_id.clone(),
                scheduled: u64::try_from(scheduled).unwrap_or(u64::MAX),
                succeeded: u64::try_from(succeeded).unwrap_or(u64::MAX),
                failed: u64::try_from(failed).unwrap_or(u64::MAX),
            });
        }
        Ok(Some(StudyStatusReport {
            study_id: study.study_id.clone(),
            status: study.status,
            progress: StudyProgress {
                total_cells: study.total_cells,
                completed_cells: study.completed_cells,
                failed_cells: study.failed_cells,
                pending_cells: study.pending_cells(),
                completion_percentage: study.completion_percentage(),
            },
            surfaces,
            failure_cause: study.failure_cause.clone(),
            created_at: study.created_at,
            started_at: study.started_at,
            completed_at: study.completed_at,
        }))
    }

    /// Returns the per-cell results for an owned study.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn study_results(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<Option<StudyResults>, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(None);
        };
        let jobs = self.jobs.find_by_study(study_id).await?;
        let mut cells = Vec::with_capacity(jobs.len());
        let mut success_timings: Vec<u64> = Vec::new();
        let mut successful = 0_u64;
        let mut failed = 0_u64;
        for job in jobs {
            match job.status {
                JobStatus::Succeeded => {
                    successful += 1;
                    if let Some(result) = &job.result {
                        success_timings.push(result.timing.total_ms);
                    }
                }
                JobStatus::Failed => failed += 1,
                JobStatus::Pending | JobStatus::Running => {}
            }
            cells.push(CellRecord {
                query_text: study
                    .manifest
                    .queries
                    .get(job.query_index)
                    .map(|query| query.text.clone())
                    .unwrap_or_default(),
                job_id: job.job_id,
                surface_id: job.surface_id,
                location_id: job.location_id,
                attempt_count: job.attempt_count,
                result: job.result,
            });
        }
        let average_response_time_ms = if success_timings.is_empty() {
            None
        } else {
            let sum: u64 = success_timings.iter().sum();
            Some(sum / u64::try_from(success_timings.len()).unwrap_or(1))
        };
        Ok(Some(StudyResults {
            study_id: study.study_id,
            cells,
            summary: ResultsSummary {
                total_cells: study.total_cells,
                successful_queries: successful,
                failed_queries: failed,
                average_response_time_ms,
            },
        }))
    }

    /// Returns the cost report for an owned study.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn study_costs(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<Option<CostReport>, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(None);
        };
        Ok(Some(CostReport {
            actual: study.actual_cost,
            estimated: study.estimated_cost,
        }))
    }

    /// Pauses an executing study.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn pause_study(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(TransitionOutcome::NotFound);
        };
        if study.status != StudyStatus::Executing {
            return Ok(TransitionOutcome::Illegal {
                current: study.status,
            });
        }
        if let Some(control) = self.executor.controls().get(study_id) {
            control.set_paused(true);
        }
        match self
            .studies
            .update(
                study_id,
                StudyPatch {
                    expected_status: Some(StudyStatus::Executing),
                    status: Some(StudyStatus::Paused),
                    ..StudyPatch::default()
                },
            )
            .await
        {
            Ok(_) => Ok(TransitionOutcome::Applied),
            Err(StoreError::Conflict) => {
                if let Some(control) = self.executor.controls().get(study_id) {
                    control.set_paused(false);
                }
                let current = self
                    .studies
                    .find_by_id(tenant_id, study_id)
                    .await?
                    .map_or(StudyStatus::Cancelled, |study| study.status);
                Ok(TransitionOutcome::Illegal {
                    current,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resumes a paused study.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn resume_study(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(TransitionOutcome::NotFound);
        };
        if study.status != StudyStatus::Paused {
            return Ok(TransitionOutcome::Illegal {
                current: study.status,
            });
        }
        match self
            .studies
            .update(
                study_id,
                StudyPatch {
                    expected_status: Some(StudyStatus::Paused),
                    status: Some(StudyStatus::Executing),
                    ..StudyPatch::default()
                },
            )
            .await
        {
            Ok(_) => {
                if let Some(control) = self.executor.controls().get(study_id) {
                    control.set_paused(false);
                }
                Ok(TransitionOutcome::Applied)
            }
            Err(StoreError::Conflict) => {
                let current = self
                    .studies
                    .find_by_id(tenant_id, study_id)
                    .await?
                    .map_or(StudyStatus::Cancelled, |study| study.status);
                Ok(TransitionOutcome::Illegal {
                    current,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Cancels a study from any non-terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] on backend failures.
    pub async fn cancel_study(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<TransitionOutcome, OrchestratorError> {
        let Some(study) = self.studies.find_by_id(tenant_id, study_id).await? else {
            return Ok(TransitionOutcome::NotFound);
        };
        if study.status.is_terminal() {
            return Ok(TransitionOutcome::Illegal {
                current: study.status,
            });
        }
        if let Some(control) = self.executor.controls().get(study_id) {
            control.cancel();
        }
        match self
            .studies
            .update(
                study_id,
                StudyPatch {
                    expected_status: Some(study.status),
                    status: Some(StudyStatus::Cancelled),
                    completed_at: Some(self.clock.now()),
                    ..StudyPatch::default()
                },
            )
            .await
        {
            Ok(_) => Ok(TransitionOutcome::Applied),
            Err(StoreError::Conflict) => {
                let current = self
                    .studies
                    .find_by_id(tenant_id, study_id)
                    .await?
                    .map_or(StudyStatus::Cancelled, |study| study.status);
                if current == StudyStatus::Cancelled {
                    return Ok(TransitionOutcome::Applied);
                }
                Ok(TransitionOutcome::Illegal {
                    current,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Length of the random study identifier suffix in bytes.
const STUDY_ID_RANDOM_BYTES: usize = 16;

/// Generates a globally unique study identifier.
fn generate_study_id() -> StudyId {
    let mut bytes = [0_u8; STUDY_ID_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(STUDY_ID_RANDOM_BYTES * 2);
    for byte in bytes {
        hex.push_str(&format!("{byte:02x}"));
    }
    StudyId::new(format!("study_{hex}"))
}

/// Computes the admission-time cost estimate for a manifest.
#[must_use]
pub fn estimate_cost(manifest: &StudyManifest, rates: &CostRates) -> CostEstimate {
    let per_surface_cells = manifest.queries.len().saturating_mul(manifest.locations.len());
    let per_surface_cells = f64::from(u32::try_from(per_surface_cells).unwrap_or(u32::MAX));
    let mut min = 0.0;
    for surface in &manifest.surfaces {
        min += rates.rate_for(&surface.surface_id) * per_surface_cells;
    }
    CostEstimate {
        min,
        max: min * rates.retry_headroom.max(1.0),
        currency: crate::core::cost::DEFAULT_CURRENCY.to_string(),
    }
}
