// crates/bentham-core/tests/recovery.rs
// ============================================================================
// Module: Recovery Manager Tests
// Description: Tests for the failover chain and circuit breaker.
// ============================================================================
//! ## Overview
//! Validates retry classification, fallback ordering, breaker state
//! transitions, deadline observation, and cancellation of pending sleeps.

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

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use bentham_core::AdapterFailure;
use bentham_core::AdapterResponse;
use bentham_core::BreakerConfig;
use bentham_core::CancellationSource;
use bentham_core::CancellationToken;
use bentham_core::CdpFallback;
use bentham_core::CircuitState;
use bentham_core::Clock;
use bentham_core::EvidenceLevel;
use bentham_core::FailureKind;
use bentham_core::ManualClock;
use bentham_core::QueryRequest;
use bentham_core::RecoveryConfig;
use bentham_core::RecoveryManager;
use bentham_core::RecoveryStrategy;
use bentham_core::SessionId;
use bentham_core::SurfaceAdapter;
use bentham_core::SurfaceHealthBoard;
use bentham_core::SurfaceId;
use bentham_core::RecoveryTask;
use bentham_core::Timestamp;

use common::EPOCH;
use common::ScriptedAdapter;
use common::failed;
use common::ok_response;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Chain deadline far beyond every scripted wait.
const FAR_DEADLINE: Timestamp = Timestamp::from_unix_millis(1_700_000_000_000 + 86_400_000);

fn sample_request() -> QueryRequest {
    QueryRequest {
        query: "what is bentham".to_string(),
        model: None,
        system_prompt: None,
        history: Vec::new(),
        temperature: None,
        max_tokens: None,
        location: None,
        evidence_level: EvidenceLevel::Metadata,
        session_id: SessionId::new("sess_test"),
        options: None,
    }
}

fn manager(
    max_retries: u32,
    threshold: u32,
    reset_ms: i64,
) -> (RecoveryManager, Arc<SurfaceHealthBoard>, Arc<ManualClock>) {
    let board = Arc::new(SurfaceHealthBoard::new(BreakerConfig {
        failure_threshold: threshold,
        reset_ms,
    }));
    let clock = Arc::new(ManualClock::new(EPOCH));
    let manager = RecoveryManager::new(
        RecoveryConfig {
            max_retries,
            base_backoff_ms: 100,
            backoff_cap_ms: 5_000,
            jitter_ms: 0,
        },
        Arc::clone(&board),
        Arc::clone(&clock) as bentham_core::SharedClock,
    );
    (manager, board, clock)
}

struct ScriptedCdp {
    outcome: Result<AdapterResponse, AdapterFailure>,
}

#[async_trait]
impl CdpFallback for ScriptedCdp {
    async fn invoke(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        self.outcome.clone()
    }
}

fn chain_task<'a>(
    surface_id: &'a SurfaceId,
    request: &'a QueryRequest,
    primary: &'a dyn SurfaceAdapter,
    alternates: &'a [Arc<dyn SurfaceAdapter>],
    cdp_fallback: Option<&'a dyn CdpFallback>,
) -> RecoveryTask<'a> {
    RecoveryTask {
        surface_id,
        request,
        primary,
        alternates,
        cdp_fallback,
        deadline: FAR_DEADLINE,
    }
}

// ============================================================================
// SECTION: Retry Policy
// ============================================================================

#[tokio::test]
async fn network_errors_retry_until_exhausted() {
    let (manager, _board, _clock) = manager(3, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![
        failed(FailureKind::NetworkError),
        failed(FailureKind::NetworkError),
        ok_response("answer"),
    ]);
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.strategy, Some(RecoveryStrategy::Primary));
    assert_eq!(result.attempts, 3);
    assert_eq!(result.errors.len(), 2);
}

#[tokio::test]
async fn anti_bot_breaks_out_of_the_retry_loop() {
    let (manager, _board, _clock) = manager(5, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![failed(FailureKind::AntiBot)]);
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(!result.success);
    assert_eq!(adapter.calls(), 1);
    assert_eq!(result.final_error, Some(FailureKind::AntiBot));
}

#[tokio::test]
async fn rate_limit_backoff_advances_the_clock_exponentially() {
    let (manager, _board, clock) = manager(3, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![
        failed(FailureKind::RateLimit),
        failed(FailureKind::RateLimit),
        ok_response("answer"),
    ]);
    let before = clock.now();
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(result.success);
    // Two waits: 100 * 2^0 and 100 * 2^1 milliseconds.
    assert_eq!(before.millis_until(clock.now()), 300);
}

// ============================================================================
// SECTION: Fallback Ordering
// ============================================================================

#[tokio::test]
async fn cdp_fallback_runs_before_alternates() {
    let (manager, _board, _clock) = manager(1, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![failed(FailureKind::SessionExpired)]);
    let alternates: Vec<Arc<dyn SurfaceAdapter>> =
        vec![Arc::new(ScriptedAdapter::new(vec![ok_response("alt answer")]))];
    let cdp = ScriptedCdp {
        outcome: ok_response("cdp answer"),
    };
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &alternates, Some(&cdp)),
            &CancellationToken::never(),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.strategy, Some(RecoveryStrategy::CdpFallback));
}

#[tokio::test]
async fn alternates_win_when_primary_and_cdp_fail() {
    let (manager, _board, _clock) = manager(1, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![failed(FailureKind::AntiBot)]);
    let alternates: Vec<Arc<dyn SurfaceAdapter>> = vec![
        Arc::new(ScriptedAdapter::new(vec![failed(FailureKind::NetworkError)])),
        Arc::new(ScriptedAdapter::new(vec![ok_response("second answer")])),
    ];
    let cdp = ScriptedCdp {
        outcome: failed(FailureKind::SessionExpired),
    };
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &alternates, Some(&cdp)),
            &CancellationToken::never(),
        )
        .await;
    assert!(result.success);
    assert_eq!(result.strategy, Some(RecoveryStrategy::AlternativeSurface));
    assert_eq!(result.errors.len(), 3);
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

#[tokio::test]
async fn circuit_opens_after_threshold_and_closes_after_reset() {
    let (manager, board, clock) = manager(1, 3, 60_000);
    let surface = SurfaceId::new("stormy");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![
        failed(FailureKind::NetworkError),
        failed(FailureKind::NetworkError),
        failed(FailureKind::NetworkError),
        failed(FailureKind::NetworkError),
    ]);

    for _ in 0..3 {
        let result = manager
            .execute(
                &chain_task(&surface, &request, &adapter, &[], None),
                &CancellationToken::never(),
            )
            .await;
        assert!(!result.success);
    }
    assert_eq!(adapter.calls(), 3);
    let health = board.snapshot(&surface).expect("health record");
    assert_eq!(health.state, CircuitState::Open);
    assert_eq!(health.failure_count, 3);

    // The fourth chain trips without an underlying call or an attempt.
    let tripped = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(!tripped.success);
    assert_eq!(tripped.attempts, 0);
    assert_eq!(tripped.final_error, Some(FailureKind::CircuitOpen));
    assert_eq!(adapter.calls(), 3);

    // After the reset interval a success closes the breaker.
    clock.advance_millis(60_000);
    let recovered = ScriptedAdapter::new(vec![ok_response("back online")]);
    let result = manager
        .execute(
            &chain_task(&surface, &request, &recovered, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(result.success);
    let health = board.snapshot(&surface).expect("health record");
    assert_eq!(health.state, CircuitState::Closed);
    assert_eq!(health.failure_count, 0);
}

#[tokio::test]
async fn half_open_failure_reopens_with_a_fresh_timestamp() {
    let (manager, board, clock) = manager(1, 1, 60_000);
    let surface = SurfaceId::new("flaky");
    let request = sample_request();

    let adapter = ScriptedAdapter::new(vec![failed(FailureKind::NetworkError)]);
    let result = manager
        .execute(
            &chain_task(&surface, &request, &adapter, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(!result.success);
    assert_eq!(board.snapshot(&surface).expect("record").state, CircuitState::Open);

    clock.advance_millis(60_000);
    let probe = ScriptedAdapter::new(vec![failed(FailureKind::NetworkError)]);
    let result = manager
        .execute(
            &chain_task(&surface, &request, &probe, &[], None),
            &CancellationToken::never(),
        )
        .await;
    assert!(!result.success);
    let health = board.snapshot(&surface).expect("record");
    assert_eq!(health.state, CircuitState::Open);
    let reopened_at = health.opened_at.expect("opened timestamp");
    assert!(reopened_at > EPOCH.plus_millis(59_999));
}

// ============================================================================
// SECTION: Deadlines and Cancellation
// ============================================================================

#[tokio::test]
async fn chains_past_their_deadline_settle_as_timeout() {
    let (manager, _board, clock) = manager(3, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![ok_response("never reached")]);
    clock.advance_millis(10_000);
    let task = RecoveryTask {
        surface_id: &surface,
        request: &request,
        primary: &adapter,
        alternates: &[],
        cdp_fallback: None,
        deadline: EPOCH.plus_millis(5_000),
    };
    let result = manager.execute(&task, &CancellationToken::never()).await;
    assert!(!result.success);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.final_error, Some(FailureKind::Timeout));
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn cancellation_aborts_the_chain_before_fallbacks() {
    let (manager, _board, _clock) = manager(1, 10, 60_000);
    let surface = SurfaceId::new("chatgpt");
    let request = sample_request();
    let adapter = ScriptedAdapter::new(vec![failed(FailureKind::NetworkError)]);
    let alternates: Vec<Arc<dyn SurfaceAdapter>> =
        vec![Arc::new(ScriptedAdapter::new(vec![ok_response("never reached")]))];
    let (source, token) = CancellationSource::new();
    source.cancel();
    let result = manager
        .execute(&chain_task(&surface, &request, &adapter, &alternates, None), &token)
        .await;
    assert!(!result.success);
    assert_eq!(result.attempts, 0);
    assert_eq!(result.final_error, Some(FailureKind::Cancelled));
    assert_eq!(adapter.calls(), 0);
}
