// crates/bentham-core/src/runtime/executor.rs
// ============================================================================
// Module: Study Executor
// Description: Bounded worker pool draining pending jobs per study.
// Purpose: Claim cells atomically, run the recovery chain, and settle results.
// Dependencies: tokio, sha2, crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! The executor owns one bounded worker pool per study. Workers claim
//! pending jobs with compare-and-set transitions, resolve adapters through
//! the registry seam, invoke the recovery manager, and write immutable
//! results. Cell-level guarantee is at-most-once success: a succeeded job
//! never runs again. Study counters advance monotonically and completion
//! criteria are evaluated once every cell settles. Pause stops claiming
//! after in-flight jobs finish; cancel aborts in-flight work cooperatively
//! and fails every remaining pending cell.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tokio::sync::Semaphore;
use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::core::cancel::CancellationSource;
use crate::core::cancel::CancellationToken;
use crate::core::failure::FailureKind;
use crate::core::identifiers::JobId;
use crate::core::identifiers::SessionId;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::SurfaceId;
use crate::core::identifiers::TenantId;
use crate::core::job::Job;
use crate::core::job::JobResult;
use crate::core::job::JobStatus;
use crate::core::job::ResponseTiming;
use crate::core::job::SessionContext;
use crate::core::job::StructuredResponse;
use crate::core::job::ValidationSummary;
use crate::core::manifest::QualityGates;
use crate::core::manifest::SessionIsolation;
use crate::core::manifest::StudyManifest;
use crate::core::study::Study;
use crate::core::study::StudyStatus;
use crate::core::time::SharedClock;
use crate::core::time::Timestamp;
use crate::interfaces::JobPatch;
use crate::interfaces::JobRepository;
use crate::interfaces::QueryRequest;
use crate::interfaces::StoreError;
use crate::interfaces::StudyPatch;
use crate::interfaces::StudyRepository;
use crate::interfaces::SurfaceAdapter;
use crate::interfaces::SurfaceResolver;
use crate::runtime::breaker::SurfaceHealthBoard;
use crate::runtime::recovery::RecoveryConfig;
use crate::runtime::recovery::RecoveryManager;
use crate::runtime::recovery::RecoveryResult;
use crate::runtime::recovery::RecoveryTask;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Executor configuration.
///
/// # Invariants
/// - `default_concurrency >= 1`; manifest overrides are clamped to
///   `max_workers_per_study`.
/// - `surface_timeout_ms` is the per-surface ceiling on one recovery chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker count used when the manifest does not override it.
    pub default_concurrency: usize,
    /// Hard cap on workers per study.
    pub max_workers_per_study: usize,
    /// Per-surface ceiling for one recovery chain in milliseconds.
    pub surface_timeout_ms: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 4,
            max_workers_per_study: 16,
            surface_timeout_ms: 120_000,
        }
    }
}

// ============================================================================
// SECTION: Study Controls
// ============================================================================

/// Per-study control block for pause and cancel signalling.
///
/// # Invariants
/// - `cancel` never resets once fired.
/// - `paused` flips freely between pause and resume.
#[derive(Debug)]
pub struct StudyControl {
    /// Cancellation source for the study.
    cancel: CancellationSource,
    /// Pause flag observed by workers before each claim.
    paused: watch::Sender<bool>,
}

impl StudyControl {
    /// Creates a fresh control block and its first token.
    fn new() -> (Self, CancellationToken) {
        let (cancel, token) = CancellationSource::new();
        let (paused, _) = watch::channel(false);
        (
            Self {
                cancel,
                paused,
            },
            token,
        )
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Sets the pause flag.
    pub fn set_paused(&self, value: bool) {
        let _ = self.paused.send(value);
    }

    /// Returns the current pause flag.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Returns a receiver for pause-flag changes.
    fn paused_rx(&self) -> watch::Receiver<bool> {
        self.paused.subscribe()
    }

    /// Returns a fresh cancellation token.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.token()
    }
}

/// Registry of per-study control blocks.
///
/// # Invariants
/// - Entries are created at spawn and removed when the study settles.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    /// Control blocks keyed by study.
    controls: Mutex<BTreeMap<StudyId, Arc<StudyControl>>>,
}

impl ControlRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the control block for a study when present.
    #[must_use]
    pub fn get(&self, study_id: &StudyId) -> Option<Arc<StudyControl>> {
        self.controls.lock().ok()?.get(study_id).cloned()
    }

    /// Inserts a control block for a study.
    fn insert(&self, study_id: StudyId, control: Arc<StudyControl>) {
        if let Ok(mut controls) = self.controls.lock() {
            controls.insert(study_id, control);
        }
    }

    /// Removes the control block for a settled study.
    fn remove(&self, study_id: &StudyId) {
        if let Ok(mut controls) = self.controls.lock() {
            controls.remove(study_id);
        }
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Job outcome event published to subscribers.
///
/// # Invariants
/// - Events are emitted after the store reflects the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    /// Owning study identifier.
    pub study_id: StudyId,
    /// Settled job identifier.
    pub job_id: JobId,
    /// Final status for the cell.
    pub status: JobStatus,
}

/// Capacity of the outcome event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Bounded worker-pool executor for admitted studies.
///
/// # Invariants
/// - At most one outstanding call per cell; claims are compare-and-set.
/// - Study counters only advance through this component.
pub struct Executor {
    /// Study repository.
    studies: Arc<dyn StudyRepository>,
    /// Job repository.
    jobs: Arc<dyn JobRepository>,
    /// Adapter resolution seam.
    resolver: Arc<dyn SurfaceResolver>,
    /// Process-wide surface health board.
    board: Arc<SurfaceHealthBoard>,
    /// Base recovery configuration; per-study chains override retry counts.
    recovery: RecoveryConfig,
    /// Clock for timestamps, timeouts, and backoff waits.
    clock: SharedClock,
    /// Executor configuration.
    config: ExecutorConfig,
    /// Per-study control blocks.
    controls: Arc<ControlRegistry>,
    /// Outcome event channel.
    events: broadcast::Sender<JobEvent>,
}

impl Executor {
    /// Creates an executor over the given repositories and seams.
    #[must_use]
    pub fn new(
        studies: Arc<dyn StudyRepository>,
        jobs: Arc<dyn JobRepository>,
        resolver: Arc<dyn SurfaceResolver>,
        board: Arc<SurfaceHealthBoard>,
        recovery: RecoveryConfig,
        clock: SharedClock,
        config: ExecutorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            studies,
            jobs,
            resolver,
            board,
            recovery,
            clock,
            config,
            controls: Arc::new(ControlRegistry::new()),
            events,
        }
    }

    /// Returns the per-study control registry.
    #[must_use]
    pub fn controls(&self) -> &Arc<ControlRegistry> {
        &self.controls
    }

    /// Returns the shared surface health board.
    #[must_use]
    pub fn board(&self) -> &Arc<SurfaceHealthBoard> {
        &self.board
    }

    /// Subscribes to settled-job events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Spawns the drain task for an admitted study.
    ///
    /// The task owns the study until it reaches a terminal state. The
    /// manifest is immutable after admission, so the task captures it at
    /// spawn time.
    pub fn spawn_study(self: &Arc<Self>, study: &Study) {
        let (control, token) = StudyControl::new();
        let control = Arc::new(control);
        self.controls.insert(study.study_id.clone(), Arc::clone(&control));
        let executor = Arc::clone(self);
        let study_id = study.study_id.clone();
        let tenant_id = study.tenant_id.clone();
        let manifest = study.manifest.clone();
        tokio::spawn(async move {
            executor.run_study(&study_id, &tenant_id, &manifest, &control, &token).await;
            executor.controls.remove(&study_id);
        });
    }

    /// Drains a study to a terminal state.
    async fn run_study(
        &self,
        study_id: &StudyId,
        tenant_id: &TenantId,
        manifest: &StudyManifest,
        control: &Arc<StudyControl>,
        token: &CancellationToken,
    ) {
        let started = self.clock.now();
        let _ = self
            .studies
            .update(
                study_id,
                StudyPatch {
                    expected_status: Some(StudyStatus::Queued),
                    status: Some(StudyStatus::Executing),
                    started_at: Some(started),
                    ..StudyPatch::default()
                },
            )
            .await;

        loop {
            if token.is_cancelled() {
                self.finalize_cancelled(study_id, tenant_id).await;
                return;
            }
            if control.is_paused() {
                if !wait_while_paused(control, token).await {
                    self.finalize_cancelled(study_id, tenant_id).await;
                    return;
                }
                continue;
            }
            if self.clock.now() > manifest.deadline {
                self.finalize_deadline(study_id, tenant_id).await;
                return;
            }
            let Ok(pending) = self.jobs.find_pending(study_id).await else {
                return;
            };
            if pending.is_empty() {
                if self.finalize_settled(study_id, manifest).await {
                    return;
                }
                continue;
            }
            self.drain_batch(study_id, tenant_id, manifest, pending, control, token).await;
        }
    }

    /// Runs one batch of pending jobs under the worker-pool bound.
    async fn drain_batch(
        &self,
        study_id: &StudyId,
        tenant_id: &TenantId,
        manifest: &StudyManifest,
        pending: Vec<Job>,
        control: &Arc<StudyControl>,
        token: &CancellationToken,
    ) {
        let workers = manifest
            .max_concurrency
            .unwrap_or(self.config.default_concurrency)
            .clamp(1, self.config.max_workers_per_study);
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks: JoinSet<()> = JoinSet::new();
        for job in pending {
            if token.is_cancelled() || control.is_paused() {
                break;
            }
            if self.clock.now() > manifest.deadline {
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if token.is_cancelled() || control.is_paused() {
                drop(permit);
                break;
            }
            let runner = JobRunner {
                studies: Arc::clone(&self.studies),
                jobs: Arc::clone(&self.jobs),
                resolver: Arc::clone(&self.resolver),
                board: Arc::clone(&self.board),
                recovery: self.recovery,
                clock: Arc::clone(&self.clock),
                config: self.config,
                events: self.events.clone(),
            };
            let job_token = token.clone();
            let study_id = study_id.clone();
            let tenant_id = tenant_id.clone();
            let manifest = manifest.clone();
            tasks.spawn(async move {
                runner.execute_job(&study_id, &tenant_id, &manifest, job, &job_token).await;
                drop(permit);
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Fails every remaining pending cell and settles the study as cancelled.
    async fn finalize_cancelled(&self, study_id: &StudyId, tenant_id: &TenantId) {
        let now = self.clock.now();
        self.fail_remaining_pending(study_id, FailureKind::Cancelled).await;
        let current = self.studies.find_by_id(tenant_id, study_id).await;
        if let Ok(Some(study)) = current
            && !study.status.is_terminal()
        {
            let _ = self
                .studies
                .update(
                    study_id,
                    StudyPatch {
                        expected_status: Some(study.status),
                        status: Some(StudyStatus::Cancelled),
                        completed_at: Some(now),
                        ..StudyPatch::default()
                    },
                )
                .await;
        }
    }

    /// Fails the study with a deadline cause and sweeps pending cells.
    async fn finalize_deadline(&self, study_id: &StudyId, tenant_id: &TenantId) {
        let now = self.clock.now();
        self.fail_remaining_pending(study_id, FailureKind::DeadlineExceeded).await;
        let current = self.studies.find_by_id(tenant_id, study_id).await;
        if let Ok(Some(study)) = current
            && !study.status.is_terminal()
        {
            let _ = self
                .studies
                .update(
                    study_id,
                    StudyPatch {
                        expected_status: Some(study.status),
                        status: Some(StudyStatus::Failed),
                        failure_cause: Some(FailureKind::DeadlineExceeded.as_str().to_string()),
                        completed_at: Some(now),
                        ..StudyPatch::default()
                    },
                )
                .await;
        }
    }

    /// Marks every pending cell failed with the given cause.
    async fn fail_remaining_pending(&self, study_id: &StudyId, cause: FailureKind) {
        let Ok(pending) = self.jobs.find_pending(study_id).await else {
            return;
        };
        for job in pending {
            let patched = self
                .jobs
                .update(
                    &job.job_id,
                    JobPatch {
                        expected_status: Some(JobStatus::Pending),
                        status: Some(JobStatus::Failed),
                        last_error: Some(cause),
                        ..JobPatch::default()
                    },
                )
                .await;
            if patched.is_ok() {
                let _ = self
                    .studies
                    .update(
                        study_id,
                        StudyPatch {
                            add_failed_cells: 1,
                            ..StudyPatch::default()
                        },
                    )
                    .await;
                let _ = self.events.send(JobEvent {
                    study_id: study_id.clone(),
                    job_id: job.job_id,
                    status: JobStatus::Failed,
                });
            }
        }
    }

    /// Evaluates completion criteria once every cell settled.
    ///
    /// Returns `true` when the study reached a terminal state.
    async fn finalize_settled(&self, study_id: &StudyId, manifest: &StudyManifest) -> bool {
        let Ok(jobs) = self.jobs.find_by_study(study_id).await else {
            return true;
        };
        let any_unsettled = jobs
            .iter()
            .any(|job| matches!(job.status, JobStatus::Pending | JobStatus::Running));
        if any_unsettled {
            return false;
        }
        let complete = evaluate_completion(manifest, &jobs);
        let now = self.clock.now();
        let patch = if complete {
            StudyPatch {
                expected_status: Some(StudyStatus::Executing),
                status: Some(StudyStatus::Completed),
                completed_at: Some(now),
                ..StudyPatch::default()
            }
        } else {
            StudyPatch {
                expected_status: Some(StudyStatus::Executing),
                status: Some(StudyStatus::Failed),
                failure_cause: Some("COVERAGE_NOT_MET".to_string()),
                completed_at: Some(now),
                ..StudyPatch::default()
            }
        };
        match self.studies.update(study_id, patch).await {
            Ok(_) => true,
            // A concurrent pause or cancel won the status race; let the
            // drain loop observe the new state.
            Err(StoreError::Conflict) => false,
            Err(_) => true,
        }
    }
}

/// Waits until the study is resumed or cancelled.
///
/// Returns `false` when the wait ended in cancellation.
async fn wait_while_paused(control: &Arc<StudyControl>, token: &CancellationToken) -> bool {
    let mut paused = control.paused_rx();
    loop {
        if token.is_cancelled() {
            return false;
        }
        if !*paused.borrow() {
            return true;
        }
        tokio::select! {
            changed = paused.changed() => {
                if changed.is_err() {
                    return true;
                }
            }
            () = token.cancelled() => {
                return false;
            }
        }
    }
}

// ============================================================================
// SECTION: Job Runner
// ============================================================================

/// Per-task bundle of the seams a worker needs.
///
/// # Invariants
/// - Shares the process-wide board and repositories; owns nothing.
struct JobRunner {
    /// Study repository.
    studies: Arc<dyn StudyRepository>,
    /// Job repository.
    jobs: Arc<dyn JobRepository>,
    /// Adapter resolution seam.
    resolver: Arc<dyn SurfaceResolver>,
    /// Process-wide surface health board.
    board: Arc<SurfaceHealthBoard>,
    /// Base recovery configuration.
    recovery: RecoveryConfig,
    /// Clock for timestamps and timeouts.
    clock: SharedClock,
    /// Executor configuration.
    config: ExecutorConfig,
    /// Outcome event channel.
    events: broadcast::Sender<JobEvent>,
}

impl JobRunner {
    /// Executes one cell end to end.
    async fn execute_job(
        &self,
        study_id: &StudyId,
        tenant_id: &TenantId,
        manifest: &StudyManifest,
        job: Job,
        token: &CancellationToken,
    ) {
        let claimed = self
            .jobs
            .update(
                &job.job_id,
                JobPatch {
                    expected_status: Some(JobStatus::Pending),
                    status: Some(JobStatus::Running),
                    ..JobPatch::default()
                },
            )
            .await;
        if claimed.is_err() {
            // Another worker already claimed the cell.
            return;
        }

        let Some(adapter) = self.resolver.resolve(&job.surface_id) else {
            self.settle_failure(study_id, &job, job.attempt_count, FailureKind::SurfaceUnavailable, 0)
                .await;
            return;
        };

        let request = build_query_request(manifest, tenant_id, &job);
        let alternates = self.resolve_alternates(manifest, &job.surface_id);
        let chain_retries = manifest.completion_criteria.max_retries_per_cell.saturating_add(1);
        let manager = RecoveryManager::new(
            RecoveryConfig {
                max_retries: chain_retries,
                ..self.recovery
            },
            Arc::clone(&self.board),
            Arc::clone(&self.clock),
        );

        let task = RecoveryTask {
            surface_id: &job.surface_id,
            request: &request,
            primary: adapter.as_ref(),
            alternates: &alternates,
            cdp_fallback: None,
            deadline: self.job_deadline(manifest),
        };
        let result = manager.execute(&task, token).await;
        if result.success {
            self.settle_success(study_id, manifest, &job, &request, result).await;
        } else {
            let attempts = job.attempt_count.saturating_add(result.attempts);
            let kind = result.final_error.unwrap_or(FailureKind::Unknown);
            self.settle_failure(study_id, &job, attempts, kind, result.total_elapsed_ms).await;
        }
    }

    /// Resolves non-required manifest surfaces as alternates.
    fn resolve_alternates(
        &self,
        manifest: &StudyManifest,
        primary: &SurfaceId,
    ) -> Vec<Arc<dyn SurfaceAdapter>> {
        manifest
            .surfaces
            .iter()
            .filter(|surface| !surface.required && &surface.surface_id != primary)
            .filter_map(|surface| self.resolver.resolve(&surface.surface_id))
            .collect()
    }

    /// Returns the absolute deadline for one cell.
    ///
    /// The chain deadline is the earlier of the study deadline and the
    /// per-surface ceiling from now.
    fn job_deadline(&self, manifest: &StudyManifest) -> Timestamp {
        let ceiling = self.clock.now().plus_millis(self.config.surface_timeout_ms.max(0));
        if manifest.deadline < ceiling {
            manifest.deadline
        } else {
            ceiling
        }
    }

    /// Writes a successful outcome and updates study counters.
    async fn settle_success(
        &self,
        study_id: &StudyId,
        manifest: &StudyManifest,
        job: &Job,
        request: &QueryRequest,
        result: RecoveryResult,
    ) {
        let attempts = job.attempt_count.saturating_add(result.attempts);
        let Some(response) = result.response else {
            self.settle_failure(study_id, job, attempts, FailureKind::Unknown, result.total_elapsed_ms)
                .await;
            return;
        };
        let validation = evaluate_gates(&manifest.quality_gates, &response.text);
        if manifest.quality_gates.require_actual_content && !validation.is_actual_content {
            self.settle_failure(study_id, job, attempts, FailureKind::Unknown, result.total_elapsed_ms)
                .await;
            return;
        }
        let cost = response.token_usage.map_or(0.0, |usage| usage.cost_estimate);
        let job_result = JobResult {
            success: true,
            response: Some(StructuredResponse {
                main_text: response.text,
                citations: response.citations,
                follow_ups: Vec::new(),
            }),
            timing: ResponseTiming {
                total_ms: result.total_elapsed_ms,
                ttfb_ms: response.ttfb_ms,
            },
            token_usage: response.token_usage,
            validation,
            session: SessionContext {
                session_id: request.session_id.clone(),
                user_agent: None,
            },
            provenance: response.provenance,
            captured_at: self.clock.now(),
        };
        let settled = self
            .jobs
            .update(
                &job.job_id,
                JobPatch {
                    expected_status: Some(JobStatus::Running),
                    status: Some(JobStatus::Succeeded),
                    attempt_count: Some(attempts),
                    result: Some(job_result),
                    ..JobPatch::default()
                },
            )
            .await;
        if settled.is_err() {
            return;
        }
        let _ = self
            .studies
            .update(
                study_id,
                StudyPatch {
                    add_completed_cells: 1,
                    add_cost: Some((job.surface_id.clone(), cost)),
                    ..StudyPatch::default()
                },
            )
            .await;
        let _ = self.events.send(JobEvent {
            study_id: study_id.clone(),
            job_id: job.job_id.clone(),
            status: JobStatus::Succeeded,
        });
    }

    /// Writes a failed outcome and updates study counters.
    async fn settle_failure(
        &self,
        study_id: &StudyId,
        job: &Job,
        attempts: u32,
        kind: FailureKind,
        elapsed_ms: u64,
    ) {
        let job_result = JobResult {
            success: false,
            response: None,
            timing: ResponseTiming {
                total_ms: elapsed_ms,
                ttfb_ms: None,
            },
            token_usage: None,
            validation: ValidationSummary {
                quality_gates_passed: false,
                is_actual_content: false,
                response_length: 0,
            },
            session: SessionContext {
                session_id: SessionId::new("none"),
                user_agent: None,
            },
            provenance: None,
            captured_at: self.clock.now(),
        };
        let settled = self
            .jobs
            .update(
                &job.job_id,
                JobPatch {
                    expected_status: Some(JobStatus::Running),
                    status: Some(JobStatus::Failed),
                    attempt_count: Some(attempts.max(job.attempt_count)),
                    last_error: Some(kind),
                    result: Some(job_result),
                    ..JobPatch::default()
                },
            )
            .await;
        if settled.is_err() {
            return;
        }
        let _ = self
            .studies
            .update(
                study_id,
                StudyPatch {
                    add_failed_cells: 1,
                    ..StudyPatch::default()
                },
            )
            .await;
        let _ = self.events.send(JobEvent {
            study_id: study_id.clone(),
            job_id: job.job_id.clone(),
            status: JobStatus::Failed,
        });
    }
}

// ============================================================================
// SECTION: Completion Evaluation
// ============================================================================

/// Evaluates completion criteria over a fully settled job set.
///
/// The study is complete iff every required surface's succeeded/scheduled
/// ratio meets the coverage threshold. Retry exhaustion is implied by a
/// settled job set: one recovery chain consumes the cell's whole retry
/// budget.
#[must_use]
pub fn evaluate_completion(manifest: &StudyManifest, jobs: &[Job]) -> bool {
    let required = &manifest.completion_criteria.required_surfaces.surface_ids;
    for surface_id in required {
        let scheduled = jobs.iter().filter(|job| &job.surface_id == surface_id).count();
        if scheduled == 0 {
            return false;
        }
        let succeeded = jobs
            .iter()
            .filter(|job| &job.surface_id == surface_id && job.status == JobStatus::Succeeded)
            .count();
        let scheduled_f = f64::from(u32::try_from(scheduled).unwrap_or(u32::MAX));
        let succeeded_f = f64::from(u32::try_from(succeeded).unwrap_or(u32::MAX));
        if succeeded_f / scheduled_f < manifest.completion_criteria.coverage_threshold {
            return false;
        }
    }
    true
}

// ============================================================================
// SECTION: Request Construction
// ============================================================================

/// Builds the query request for a cell from its manifest context.
#[must_use]
pub fn build_query_request(manifest: &StudyManifest, tenant_id: &TenantId, job: &Job) -> QueryRequest {
    let query = manifest
        .queries
        .get(job.query_index)
        .map(|spec| spec.text.clone())
        .unwrap_or_default();
    let options =
        manifest.surface_ref(&job.surface_id).and_then(|surface| surface.options.clone());
    QueryRequest {
        query,
        model: None,
        system_prompt: None,
        history: Vec::new(),
        temperature: None,
        max_tokens: None,
        location: Some(job.location_id.clone()),
        evidence_level: manifest.evidence_level,
        session_id: derive_session_id(manifest, tenant_id, job),
        options,
    }
}

/// Derives the session identifier for a cell.
///
/// Every isolation mode scopes sessions to the owning tenant; `shared`
/// reuses one session per (tenant, surface) across the tenant's studies.
#[must_use]
pub fn derive_session_id(manifest: &StudyManifest, tenant_id: &TenantId, job: &Job) -> SessionId {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(job.surface_id.as_str().as_bytes());
    match manifest.session_isolation {
        SessionIsolation::Shared => {}
        SessionIsolation::PerTenant => {
            hasher.update([0x1f]);
            hasher.update(job.study_id.as_str().as_bytes());
        }
        SessionIsolation::PerQuery => {
            hasher.update([0x1f]);
            hasher.update(job.study_id.as_str().as_bytes());
            hasher.update([0x1f]);
            hasher.update(job.job_id.as_str().as_bytes());
        }
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    SessionId::new(format!("sess_{hex}"))
}

/// Evaluates quality gates against a captured response.
#[must_use]
pub fn evaluate_gates(gates: &QualityGates, text: &str) -> ValidationSummary {
    let is_actual_content = !text.trim().is_empty();
    let response_length = text.chars().count();
    let quality_gates_passed = is_actual_content && response_length >= gates.min_response_length;
    ValidationSummary {
        quality_gates_passed,
        is_actual_content,
        response_length,
    }
}
