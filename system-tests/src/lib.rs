// system-tests/src/lib.rs
// ============================================================================
// Module: Bentham System Test Harness
// Description: Fully wired in-process stack and HTTP helpers.
// Purpose: Drive end-to-end scenarios against the assembled gateway.
// Dependencies: axum, bentham-auth, bentham-core, bentham-gateway, bentham-surfaces
// ============================================================================

//! ## Overview
//! The system-test harness assembles the whole control plane in process:
//! in-memory repositories, a manual clock, a surface registry the caller
//! provides, the executor and orchestrator, hashed API keys per tenant,
//! and the gateway router. Requests run through `tower::oneshot`, so every
//! scenario exercises the exact production routing, auth, and envelope
//! path without a network listener.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    reason = "Test harness helpers panic on wiring mistakes."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::HeaderMap;
use axum::http::Request;
use axum::http::StatusCode;
use bentham_auth::ApiKeyRecord;
use bentham_auth::ApiKeyStore;
use bentham_auth::RateLimiter;
use bentham_auth::RateLimiterConfig;
use bentham_auth::generate_api_key;
use bentham_auth::hash_secret;
use bentham_core::ApiKeyId;
use bentham_core::BasicValidator;
use bentham_core::BreakerConfig;
use bentham_core::CompletionCriteria;
use bentham_core::CostRates;
use bentham_core::Executor;
use bentham_core::ExecutorConfig;
use bentham_core::InMemoryJobStore;
use bentham_core::InMemoryStudyStore;
use bentham_core::JobRepository;
use bentham_core::LocationId;
use bentham_core::LocationSpec;
use bentham_core::ManualClock;
use bentham_core::Orchestrator;
use bentham_core::ProxyType;
use bentham_core::QualityGates;
use bentham_core::QuerySpec;
use bentham_core::RecoveryConfig;
use bentham_core::RequiredSurfaces;
use bentham_core::SharedClock;
use bentham_core::StudyId;
use bentham_core::StudyManifest;
use bentham_core::StudyRepository;
use bentham_core::SurfaceHealthBoard;
use bentham_core::SurfaceId;
use bentham_core::SurfaceRef;
use bentham_core::TenantId;
use bentham_core::Timestamp;
use bentham_core::ValidatorConfig;
use bentham_gateway::AppState;
use bentham_gateway::GatewayConfig;
use bentham_gateway::NoopAuditSink;
use bentham_gateway::NoopMetrics;
use bentham_gateway::RepositoryProbe;
use bentham_gateway::StaticProbe;
use bentham_gateway::build_router;
use bentham_surfaces::SurfaceRegistry;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Start of logical time for harness clocks.
pub const EPOCH: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

// ============================================================================
// SECTION: Stack
// ============================================================================

/// Fully wired in-process control plane.
pub struct TestStack {
    /// Assembled gateway router.
    pub router: Router,
    /// Study repository handle for direct assertions.
    pub studies: Arc<InMemoryStudyStore>,
    /// Job repository handle for direct assertions.
    pub jobs: Arc<InMemoryJobStore>,
    /// Surface health board handle.
    pub board: Arc<SurfaceHealthBoard>,
    /// Manual clock driving every wait.
    pub clock: Arc<ManualClock>,
    /// API key store handle.
    pub keys: Arc<ApiKeyStore>,
}

impl TestStack {
    /// Wires a stack over the given surface registry.
    #[must_use]
    pub fn new(registry: SurfaceRegistry) -> Self {
        let studies = Arc::new(InMemoryStudyStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());
        let board = Arc::new(SurfaceHealthBoard::new(BreakerConfig::default()));
        let clock = Arc::new(ManualClock::new(EPOCH));
        let executor = Arc::new(Executor::new(
            Arc::clone(&studies) as Arc<dyn StudyRepository>,
            Arc::clone(&jobs) as Arc<dyn JobRepository>,
            Arc::new(registry),
            Arc::clone(&board),
            RecoveryConfig {
                jitter_ms: 0,
                ..RecoveryConfig::default()
            },
            Arc::clone(&clock) as SharedClock,
            ExecutorConfig::default(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&studies) as Arc<dyn StudyRepository>,
            Arc::clone(&jobs) as Arc<dyn JobRepository>,
            Arc::new(BasicValidator::new(ValidatorConfig::default())),
            executor,
            Arc::clone(&clock) as SharedClock,
            CostRates::default(),
        ));
        let keys = Arc::new(ApiKeyStore::new());
        let probes: Vec<Box<dyn bentham_gateway::HealthProbe>> = vec![
            Box::new(RepositoryProbe::new(
                "database",
                Arc::clone(&studies) as Arc<dyn StudyRepository>,
            )),
            Box::new(StaticProbe::new("redis", true)),
            Box::new(StaticProbe::new("orchestrator", true)),
        ];
        let state = AppState {
            orchestrator,
            keys: Arc::clone(&keys),
            limiter: Arc::new(RateLimiter::new(RateLimiterConfig::default())),
            clock: Arc::clone(&clock) as SharedClock,
            config: GatewayConfig::default(),
            metrics: Arc::new(NoopMetrics),
            audit: Arc::new(NoopAuditSink),
            probes: Arc::new(probes),
        };
        Self {
            router: build_router(state),
            studies,
            jobs,
            board,
            clock,
            keys,
        }
    }

    /// Issues an API key for a tenant and returns the raw secret.
    pub fn issue_key(&self, key_id: &str, tenant_id: &str, rate_limit: u32) -> String {
        let secret = generate_api_key();
        self.keys
            .add_key(ApiKeyRecord {
                key_id: ApiKeyId::new(key_id),
                tenant_id: TenantId::new(tenant_id),
                key_hash: hash_secret(&secret),
                name: format!("system key {key_id}"),
                permissions: BTreeSet::new(),
                rate_limit,
                created_at: EPOCH,
                expires_at: None,
            })
            .expect("issue key");
        secret
    }

    /// Sends a request through the router and decodes the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value, HeaderMap) {
        let response = self.router.clone().oneshot(request).await.expect("router responds");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body, headers)
    }

    /// Sends an authorized GET request.
    pub async fn get(&self, uri: &str, secret: &str) -> (StatusCode, Value, HeaderMap) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("Authorization", format!("Bearer {secret}"))
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// Sends an authorized POST request with an optional JSON body.
    pub async fn post(
        &self,
        uri: &str,
        secret: &str,
        body: Option<&Value>,
    ) -> (StatusCode, Value, HeaderMap) {
        let payload = body.map_or_else(Vec::new, |value| {
            serde_json::to_vec(value).expect("serialize body")
        });
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Authorization", format!("Bearer {secret}"))
            .header("Content-Type", "application/json")
            .body(Body::from(payload))
            .expect("request");
        self.send(request).await
    }

    /// Sends an authorized DELETE request.
    pub async fn delete(&self, uri: &str, secret: &str) -> (StatusCode, Value, HeaderMap) {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .header("Authorization", format!("Bearer {secret}"))
            .body(Body::empty())
            .expect("request");
        self.send(request).await
    }

    /// Polls until at least one of the study's jobs is running.
    pub async fn wait_running_job(&self, study_id: &str) {
        for _ in 0..500 {
            let jobs = self
                .jobs
                .find_by_study(&StudyId::new(study_id))
                .await
                .expect("jobs read");
            if jobs.iter().any(|job| job.status == bentham_core::JobStatus::Running) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no job entered the running state in time");
    }

    /// Polls the status endpoint until the externalized status matches.
    pub async fn wait_external_status(&self, study_id: &str, secret: &str, wanted: &str) -> Value {
        for _ in 0..500 {
            let (status, body, _) = self.get(&format!("/v1/studies/{study_id}"), secret).await;
            assert_eq!(status, StatusCode::OK, "status endpoint failed: {body}");
            if body["data"]["status"] == wanted {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("study {study_id} never reached external status {wanted}");
    }

    /// Polls until the study reaches any terminal external status.
    pub async fn wait_terminal(&self, study_id: &str, secret: &str) -> Value {
        for _ in 0..500 {
            let (status, body, _) = self.get(&format!("/v1/studies/{study_id}"), secret).await;
            assert_eq!(status, StatusCode::OK, "status endpoint failed: {body}");
            let label = body["data"]["status"].as_str().unwrap_or_default().to_string();
            if matches!(label.as_str(), "completed" | "failed" | "cancelled") {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("study {study_id} never settled");
    }

    /// Reads the study directly from the repository.
    pub async fn study(&self, tenant_id: &str, study_id: &str) -> Option<bentham_core::Study> {
        self.studies
            .find_by_id(&TenantId::new(tenant_id), &StudyId::new(study_id))
            .await
            .expect("store read")
    }
}

// ============================================================================
// SECTION: Manifest Builder
// ============================================================================

/// Builds a well-formed manifest over the given surfaces.
#[must_use]
pub fn manifest(queries: usize, surface_ids: &[&str], deadline: Timestamp) -> StudyManifest {
    StudyManifest {
        name: "system study".to_string(),
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

/// Serializes a manifest into a request body value.
#[must_use]
pub fn manifest_body(manifest: &StudyManifest) -> Value {
    serde_json::to_value(manifest).expect("manifest serializes")
}
