// crates/bentham-gateway/tests/security.rs
// ============================================================================
// Module: Gateway Security Tests
// Description: Router-level tests for auth hardening and header discipline.
// ============================================================================
//! ## Overview
//! Drives the assembled router: hostile bearer payloads are never echoed,
//! every response carries the security headers, and no response discloses
//! a version or internal detail.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
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
use bentham_core::CostRates;
use bentham_core::Executor;
use bentham_core::ExecutorConfig;
use bentham_core::InMemoryJobStore;
use bentham_core::InMemoryStudyStore;
use bentham_core::JobRepository;
use bentham_core::ManualClock;
use bentham_core::Orchestrator;
use bentham_core::RecoveryConfig;
use bentham_core::StudyRepository;
use bentham_core::SurfaceHealthBoard;
use bentham_core::TenantId;
use bentham_core::Timestamp;
use bentham_core::ValidatorConfig;
use bentham_gateway::AppState;
use bentham_gateway::GatewayConfig;
use bentham_gateway::NoopAuditSink;
use bentham_gateway::NoopMetrics;
use bentham_gateway::StaticProbe;
use bentham_gateway::build_router;
use bentham_surfaces::EchoSurface;
use bentham_surfaces::SurfaceRegistry;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const EPOCH: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000);

fn router_with_key() -> (Router, String) {
    let studies = Arc::new(InMemoryStudyStore::new());
    let jobs = Arc::new(InMemoryJobStore::new());
    let board = Arc::new(SurfaceHealthBoard::new(BreakerConfig::default()));
    let clock = Arc::new(ManualClock::new(EPOCH));
    let registry = SurfaceRegistry::builder().surface("chatgpt", EchoSurface::new()).build();
    let executor = Arc::new(Executor::new(
        Arc::clone(&studies) as Arc<dyn StudyRepository>,
        Arc::clone(&jobs) as Arc<dyn JobRepository>,
        Arc::new(registry),
        Arc::clone(&board),
        RecoveryConfig::default(),
        Arc::clone(&clock) as bentham_core::SharedClock,
        ExecutorConfig::default(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&studies) as Arc<dyn StudyRepository>,
        Arc::clone(&jobs) as Arc<dyn JobRepository>,
        Arc::new(BasicValidator::new(ValidatorConfig::default())),
        executor,
        Arc::clone(&clock) as bentham_core::SharedClock,
        CostRates::default(),
    ));

    let secret = generate_api_key();
    let keys = Arc::new(ApiKeyStore::new());
    keys.add_key(ApiKeyRecord {
        key_id: ApiKeyId::new("k1"),
        tenant_id: TenantId::new("T1"),
        key_hash: hash_secret(&secret),
        name: "security key".to_string(),
        permissions: BTreeSet::new(),
        rate_limit: 1_000,
        created_at: EPOCH,
        expires_at: None,
    })
    .expect("add key");

    let probes: Vec<Box<dyn bentham_gateway::HealthProbe>> = vec![
        Box::new(StaticProbe::new("database", true)),
        Box::new(StaticProbe::new("redis", true)),
        Box::new(StaticProbe::new("orchestrator", true)),
    ];
    let state = AppState {
        orchestrator,
        keys,
        limiter: Arc::new(RateLimiter::new(RateLimiterConfig::default())),
        clock: clock as bentham_core::SharedClock,
        config: GatewayConfig::default(),
        metrics: Arc::new(NoopMetrics),
        audit: Arc::new(NoopAuditSink),
        probes: Arc::new(probes),
    };
    (build_router(state), secret)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, String, axum::http::HeaderMap) {
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string(), headers)
}

// ============================================================================
// SECTION: Hostile Bearer Payloads
// ============================================================================

#[tokio::test]
async fn hostile_bearer_payloads_are_never_echoed() {
    let payloads = [
        "<script>alert(1)</script>",
        "javascript:alert(1)",
        "x onerror=alert(1)",
        "x onload=alert(1)",
        "' UNION SELECT * FROM keys --",
        "../../../../etc/passwd",
    ];
    let suspicious =
        ["<script", "javascript:", "onerror=", "onload=", "UNION", "/etc/passwd"];
    for payload in payloads {
        let (router, _secret) = router_with_key();
        let request = Request::builder()
            .method("GET")
            .uri("/v1/studies/any")
            .header("Authorization", format!("Bearer {payload}"))
            .body(Body::empty())
            .expect("request");
        let (status, body, _headers) = send(router, request).await;
        assert!(status.is_client_error(), "payload {payload:?} produced {status}");
        for marker in suspicious {
            assert!(!body.contains(marker), "response echoed {marker:?}");
        }
    }
}

// ============================================================================
// SECTION: Header Discipline
// ============================================================================

#[tokio::test]
async fn every_route_carries_the_security_headers() {
    let (router, secret) = router_with_key();
    let requests = [
        ("GET", "/v1/health", None),
        ("GET", "/v1/studies/missing", Some(secret.clone())),
        ("POST", "/v1/studies/missing/pause", Some(secret.clone())),
        ("GET", "/v1/costs/missing", Some(secret.clone())),
    ];
    for (method, uri, auth) in requests {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(secret) = auth {
            builder = builder.header("Authorization", format!("Bearer {secret}"));
        }
        let request = builder.body(Body::empty()).expect("request");
        let (_status, _body, headers) = send(router.clone(), request).await;
        assert_eq!(
            headers.get("X-Content-Type-Options").map(|v| v.as_bytes()),
            Some(b"nosniff".as_slice()),
            "route {uri}"
        );
        assert_eq!(
            headers.get("X-Frame-Options").map(|v| v.as_bytes()),
            Some(b"SAMEORIGIN".as_slice()),
            "route {uri}"
        );
        assert!(headers.get("Server").is_none(), "route {uri} disclosed a server header");
    }
}

// ============================================================================
// SECTION: Disclosure Discipline
// ============================================================================

#[tokio::test]
async fn not_found_bodies_reveal_no_internal_detail() {
    let (router, secret) = router_with_key();
    let request = Request::builder()
        .method("GET")
        .uri("/v1/studies/study_owned_by_someone_else")
        .header("Authorization", format!("Bearer {secret}"))
        .body(Body::empty())
        .expect("request");
    let (status, body, _headers) = send(router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("STUDY_NOT_FOUND"));
    for forbidden in ["tenant", "hash", "sql", "postgres", "redis://", "stack"] {
        assert!(!body.to_lowercase().contains(forbidden), "body leaked {forbidden:?}");
    }
}
