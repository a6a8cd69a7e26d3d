// crates/bentham-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Fixtures
// Description: Scripted adapters, resolvers, and wiring helpers.
// Purpose: Drive the control plane deterministically in integration tests.
// Dependencies: bentham-core, tokio
// ============================================================================

//! ## Overview
//! Shared fixtures for control-plane tests: a scripted adapter with a
//! queue of outcomes, a static resolver, a manifest builder, and a fully
//! wired harness over the in-memory repositories and a manual clock.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures shared across integration suites."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use bentham_core::AdapterFailure;
use bentham_core::AdapterResponse;
use bentham_core::BasicValidator;
use bentham_core::BreakerConfig;
use bentham_core::CancellationToken;
use bentham_core::CompletionCriteria;
use bentham_core::CostRates;
use bentham_core::Executor;
use bentham_core::ExecutorConfig;
use bentham_core::InMemoryJobStore;
use bentham_core::InMemoryStudyStore;
use bentham_core::LocationId;
use bentham_core::LocationSpec;
use bentham_core::ManualClock;
use bentham_core::Orchestrator;
use bentham_core::ProxyType;
use bentham_core::QualityGates;
use bentham_core::QueryRequest;
use bentham_core::QuerySpec;
use bentham_core::RecoveryConfig;
use bentham_core::RequiredSurfaces;
use bentham_core::StudyId;
use bentham_core::StudyManifest;
use bentham_core::StudyRepository;
use bentham_core::StudyStatus;
use bentham_core::SurfaceAdapter;
use bentham_core::SurfaceHealthBoard;
use bentham_core::SurfaceId;
use bentham_core::SurfaceRef;
use bentham_core::SurfaceResolver;
use bentham_core::TenantId;
use bentham_core::Timestamp;
use bentham_core::ValidatorConfig;

// ============================================================================
// SECTION: Scripted Adapter
// ============================================================================

/// Adapter returning a scripted queue of outcomes.
pub struct ScriptedAdapter {
    /// Outcome queue consumed front to back.
    outcomes: Mutex<VecDeque<Result<AdapterResponse, AdapterFailure>>>,
    /// Total invocation count.
    calls: AtomicU32,
}

impl ScriptedAdapter {
    /// Creates an adapter over the given outcome script.
    pub fn new(outcomes: Vec<Result<AdapterResponse, AdapterFailure>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Returns the number of invocations so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceAdapter for ScriptedAdapter {
    async fn query(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().expect("outcomes lock").pop_front().unwrap_or_else(|| {
            Err(AdapterFailure::new(
                bentham_core::FailureKind::Unknown,
                "script exhausted",
            ))
        })
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Adapter that blocks each call until the test releases a gate permit.
pub struct GatedAdapter {
    /// Gate consumed once per call.
    gate: Arc<tokio::sync::Semaphore>,
    /// Response text returned after the gate opens.
    text: String,
}

impl GatedAdapter {
    /// Creates a gated adapter with a closed gate.
    pub fn new(text: &str) -> (Self, Arc<tokio::sync::Semaphore>) {
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        (
            Self {
                gate: Arc::clone(&gate),
                text: text.to_string(),
            },
            gate,
        )
    }
}

#[async_trait]
impl SurfaceAdapter for GatedAdapter {
    async fn query(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        let permit = self.gate.acquire().await.expect("gate open");
        permit.forget();
        ok_response(&self.text)
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Builds a successful response with the given text.
pub fn ok_response(text: &str) -> Result<AdapterResponse, AdapterFailure> {
    Ok(AdapterResponse {
        text: text.to_string(),
        citations: Vec::new(),
        duration_ms: 10,
        ttfb_ms: Some(5),
        token_usage: None,
        provenance: None,
    })
}

/// Builds a classified failure outcome.
pub fn failed(kind: bentham_core::FailureKind) -> Result<AdapterResponse, AdapterFailure> {
    Err(AdapterFailure::new(kind, "scripted failure"))
}

// ============================================================================
// SECTION: Static Resolver
// ============================================================================

/// Resolver over a fixed adapter map.
#[derive(Default)]
pub struct StaticResolver {
    /// Adapters keyed by surface.
    adapters: BTreeMap<SurfaceId, Arc<dyn SurfaceAdapter>>,
}

impl StaticResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter for a surface.
    pub fn with(mut self, surface_id: &str, adapter: Arc<dyn SurfaceAdapter>) -> Self {
        self.adapters.insert(SurfaceId::new(surface_id), adapter);
        self
    }
}

impl SurfaceResolver for StaticResolver {
    fn resolve(&self, surface_id: &SurfaceId) -> Option<Arc<dyn SurfaceAdapter>> {
        self.adapters.get(surface_id).cloned()
    }
}

// ============================================================================
// SECTION: Manifest Builder
// ============================================================================

/// Builds a minimal well-formed manifest for tests.
pub fn sample_manifest(queries: usize, surface_ids: &[&str], deadline: Timestamp) -> StudyManifest {
    StudyManifest {
        name: "sample study".to_string(),
        queries: (0..queries)
            .map(|index| QuerySpec {
                text: format!("query {index}"),
                categories: Vec::new(),
            })
            .collect(),
        surfaces: surface_ids
            .iter()
            .map(|surface_id| SurfaceRef {
                surface_id: SurfaceId::new(*surface_id),
                required: true,
                options: None,
            })
            .collect(),
        locations: vec![LocationSpec {
            location_id: LocationId::new("us-east"),
            proxy_type: ProxyType::None,
            sticky: false,
        }],
        completion_criteria: CompletionCriteria {
            required_surfaces: RequiredSurfaces {
                surface_ids: surface_ids.iter().map(|id| SurfaceId::new(*id)).collect(),
            },
            coverage_threshold: 0.95,
            max_retries_per_cell: 1,
        },
        quality_gates: QualityGates::default(),
        evidence_level: bentham_core::EvidenceLevel::Metadata,
        legal_hold: false,
        deadline,
        session_isolation: bentham_core::SessionIsolation::PerTenant,
        max_concurrency: Some(2),
    }
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Start of logical time for harness clocks.
pub const EPOCH: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

/// Fully wired control plane over in-memory stores and a manual clock.
pub struct Harness {
    /// Study repository.
    pub studies: Arc<InMemoryStudyStore>,
    /// Job repository.
    pub jobs: Arc<InMemoryJobStore>,
    /// Surface health board.
    pub board: Arc<SurfaceHealthBoard>,
    /// Executor under test.
    pub executor: Arc<Executor>,
    /// Orchestrator under test.
    pub orchestrator: Orchestrator,
    /// Manual clock driving every wait.
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Wires a harness over the given resolver.
    pub fn new(resolver: StaticResolver) -> Self {
        let studies = Arc::new(InMemoryStudyStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let board = Arc::new(SurfaceHealthBoard::new(BreakerConfig::default()));
        let clock = Arc::new(ManualClock::new(EPOCH));
        let executor = Arc::new(Executor::new(
            Arc::clone(&studies) as Arc<dyn bentham_core::StudyRepository>,
            Arc::clone(&jobs) as Arc<dyn bentham_core::JobRepository>,
            Arc::new(resolver),
            Arc::clone(&board),
            RecoveryConfig {
                jitter_ms: 0,
                ..RecoveryConfig::default()
            },
            Arc::clone(&clock) as bentham_core::SharedClock,
            ExecutorConfig::default(),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&studies) as Arc<dyn bentham_core::StudyRepository>,
            Arc::clone(&jobs) as Arc<dyn bentham_core::JobRepository>,
            Arc::new(BasicValidator::new(ValidatorConfig::default())),
            Arc::clone(&executor),
            Arc::clone(&clock) as bentham_core::SharedClock,
            CostRates::default(),
        );
        Self {
            studies,
            jobs,
            board,
            executor,
            orchestrator,
            clock,
        }
    }

    /// Polls until the study reaches a terminal state.
    pub async fn wait_terminal(&self, tenant_id: &TenantId, study_id: &StudyId) -> StudyStatus {
        for _ in 0..500 {
            let study = self
                .studies
                .find_by_id(tenant_id, study_id)
                .await
                .expect("store read")
                .expect("study exists");
            if study.status.is_terminal() {
                return study.status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("study did not settle in time");
    }

    /// Polls until at least one of the study's jobs is running.
    pub async fn wait_running_job(&self, study_id: &StudyId) {
        use bentham_core::JobRepository;
        for _ in 0..500 {
            let jobs = self.jobs.find_by_study(study_id).await.expect("jobs read");
            if jobs.iter().any(|job| job.status == bentham_core::JobStatus::Running) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no job entered the running state in time");
    }

    /// Polls until the study reaches the given status.
    pub async fn wait_status(
        &self,
        tenant_id: &TenantId,
        study_id: &StudyId,
        wanted: StudyStatus,
    ) -> StudyStatus {
        for _ in 0..500 {
            let study = self
                .studies
                .find_by_id(tenant_id, study_id)
                .await
                .expect("store read")
                .expect("study exists");
            if study.status == wanted || study.status.is_terminal() {
                return study.status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("study did not reach {wanted:?} in time");
    }
}
