// crates/bentham-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Repositories
// Description: Reference StudyRepository and JobRepository implementations.
// Purpose: Back the control plane with tenant-scoped, CAS-disciplined maps.
// Dependencies: tokio, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The in-memory repositories are the reference persistence backend. They
//! enforce the same discipline a durable backend must honor: tenant-scoped
//! reads return `None` on ownership mismatch, status updates are
//! compare-and-set, counters are strictly additive, and results are
//! write-once. Readers always observe a committed snapshot because every
//! mutation happens under a single writer lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::identifiers::JobId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::TenantId;
use crate::core::job::Job;
use crate::core::job::JobStatus;
use crate::core::study::Study;
use crate::interfaces::JobPatch;
use crate::interfaces::JobRepository;
use crate::interfaces::StoreError;
use crate::interfaces::StudyPatch;
use crate::interfaces::StudyRepository;

// ============================================================================
// SECTION: Study Store
// ============================================================================

/// In-memory study repository.
///
/// # Invariants
/// - Reads scoped to a tenant never return another tenant's study.
/// - `completed_cells + failed_cells <= total_cells` after every update.
#[derive(Debug, Default)]
pub struct InMemoryStudyStore {
    /// Studies keyed by identifier.
    studies: RwLock<BTreeMap<StudyId, Study>>,
}

impl InMemoryStudyStore {
    /// Creates an empty study store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudyRepository for InMemoryStudyStore {
    async fn create(&self, study: Study) -> Result<(), StoreError> {
        let mut studies = self.studies.write().await;
        if studies.contains_key(&study.study_id) {
            return Err(StoreError::AlreadyExists);
        }
        studies.insert(study.study_id.clone(), study);
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
    ) -> Result<Option<Study>, StoreError> {
        let studies = self.studies.read().await;
        Ok(studies
            .get(study_id)
            .filter(|study| &study.tenant_id == tenant_id)
            .cloned())
    }

    async fn update(&self, study_id: &StudyId, patch: StudyPatch) -> Result<Study, StoreError> {
        let mut studies = self.studies.write().await;
        let study = studies.get_mut(study_id).ok_or(StoreError::NotFound)?;
        if let Some(expected) = patch.expected_status
            && study.status != expected
        {
            return Err(StoreError::Conflict);
        }
        let completed = study.completed_cells.saturating_add(patch.add_completed_cells);
        let failed = study.failed_cells.saturating_add(patch.add_failed_cells);
        if completed.saturating_add(failed) > study.total_cells {
            return Err(StoreError::Conflict);
        }
        if let Some(status) = patch.status {
            study.status = status;
        }
        if let Some(cause) = patch.failure_cause {
            study.failure_cause = Some(cause);
        }
        if let Some(started_at) = patch.started_at {
            study.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            study.completed_at = Some(completed_at);
        }
        study.completed_cells = completed;
        study.failed_cells = failed;
        if let Some((surface_id, amount)) = patch.add_cost {
            study.actual_cost.record(&surface_id, amount);
        }
        Ok(study.clone())
    }

    async fn find_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Study>, StoreError> {
        let studies = self.studies.read().await;
        let mut owned: Vec<Study> = studies
            .values()
            .filter(|study| &study.tenant_id == tenant_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}

// ============================================================================
// SECTION: Job Store
// ============================================================================

/// In-memory job repository.
///
/// # Invariants
/// - Emission order per study is preserved for `find_by_study` and
///   `find_pending`.
/// - A job's result is write-once; a succeeded job never re-enters
///   `running`.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    /// Jobs keyed by identifier.
    jobs: RwLock<JobTables>,
}

/// Interior tables for the job store.
#[derive(Debug, Default)]
struct JobTables {
    /// Jobs keyed by identifier.
    by_id: BTreeMap<JobId, Job>,
    /// Emission order per study.
    order: BTreeMap<StudyId, Vec<JobId>>,
}

impl InMemoryJobStore {
    /// Creates an empty job store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<(), StoreError> {
        let mut tables = self.jobs.write().await;
        if tables.by_id.contains_key(&job.job_id) {
            return Err(StoreError::AlreadyExists);
        }
        tables
            .order
            .entry(job.study_id.clone())
            .or_default()
            .push(job.job_id.clone());
        tables.by_id.insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn find_by_id(&self, job_id: &JobId) -> Result<Option<Job>, StoreError> {
        let tables = self.jobs.read().await;
        Ok(tables.by_id.get(job_id).cloned())
    }

    async fn update(&self, job_id: &JobId, patch: JobPatch) -> Result<Job, StoreError> {
        let mut tables = self.jobs.write().await;
        let job = tables.by_id.get_mut(job_id).ok_or(StoreError::NotFound)?;
        if let Some(expected) = patch.expected_status
            && job.status != expected
        {
            return Err(StoreError::Conflict);
        }
        if patch.result.is_some() && job.result.is_some() {
            return Err(StoreError::Conflict);
        }
        if job.status == JobStatus::Succeeded
            && patch.status.is_some_and(|status| status != JobStatus::Succeeded)
        {
            return Err(StoreError::Conflict);
        }
        if let Some(attempts) = patch.attempt_count {
            if attempts < job.attempt_count {
                return Err(StoreError::Conflict);
            }
            job.attempt_count = attempts;
        }
        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(last_error) = patch.last_error {
            job.last_error = Some(last_error);
        }
        if let Some(result) = patch.result {
            job.result = Some(result);
        }
        Ok(job.clone())
    }

    async fn find_by_study(&self, study_id: &StudyId) -> Result<Vec<Job>, StoreError> {
        let tables = self.jobs.read().await;
        let Some(order) = tables.order.get(study_id) else {
            return Ok(Vec::new());
        };
        Ok(order.iter().filter_map(|job_id| tables.by_id.get(job_id).cloned()).collect())
    }

    async fn find_pending(&self, study_id: &StudyId) -> Result<Vec<Job>, StoreError> {
        let tables = self.jobs.read().await;
        let Some(order) = tables.order.get(study_id) else {
            return Ok(Vec::new());
        };
        Ok(order
            .iter()
            .filter_map(|job_id| tables.by_id.get(job_id))
            .filter(|job| job.status == JobStatus::Pending)
            .cloned()
            .collect())
    }
}
