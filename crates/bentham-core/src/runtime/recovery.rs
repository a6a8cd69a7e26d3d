// crates/bentham-core/src/runtime/recovery.rs
// ============================================================================
// Module: Recovery Manager
// Description: Failover chain wrapping a single adapter invocation.
// Purpose: Retry with typed backoff, fall back, and track surface health.
// Dependencies: rand, tokio, crate::{core, interfaces, runtime::breaker}
// ============================================================================

//! ## Overview
//! The recovery manager wraps one adapter invocation in a failover chain:
//! circuit check, primary adapter with classification-driven backoff, an
//! optional CDP fallback invoked once, then alternative adapters with one
//! attempt each. Cancellation and the task deadline are observed at every
//! suspension point: pending sleeps abort immediately, in-flight adapter
//! calls are abandoned on cancel, and a chain that outlives its deadline
//! settles as `TIMEOUT`. A surface records at most one failure per chain,
//! and only when every path failed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;

use crate::core::cancel::CancellationToken;
use crate::core::failure::FailureKind;
use crate::core::identifiers::SurfaceId;
use crate::core::time::SharedClock;
use crate::core::time::Timestamp;
use crate::interfaces::AdapterFailure;
use crate::interfaces::AdapterResponse;
use crate::interfaces::QueryRequest;
use crate::interfaces::SurfaceAdapter;
use crate::runtime::breaker::CircuitCheck;
use crate::runtime::breaker::SurfaceHealthBoard;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Recovery manager configuration.
///
/// # Invariants
/// - `max_retries >= 1`; it bounds primary-adapter attempts per chain.
/// - Rate-limit backoff is `min(base * 2^attempt + jitter, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum primary-adapter attempts per chain.
    pub max_retries: u32,
    /// Base backoff in milliseconds.
    pub base_backoff_ms: u64,
    /// Upper bound on a single backoff wait in milliseconds.
    pub backoff_cap_ms: u64,
    /// Maximum random jitter added to rate-limit backoff in milliseconds.
    pub jitter_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1_000,
            backoff_cap_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

// ============================================================================
// SECTION: CDP Fallback
// ============================================================================

/// Fallback that drives an existing browser tab over CDP.
///
/// Invoked at most once per chain, after the primary retry loop fails.
#[async_trait]
pub trait CdpFallback: Send + Sync {
    /// Executes the query through the CDP-mediated path.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterFailure`] with a stable classification on failure.
    async fn invoke(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure>;
}

// ============================================================================
// SECTION: Recovery Task
// ============================================================================

/// One failover-chain invocation for a single cell.
///
/// # Invariants
/// - `deadline` bounds the whole chain; suspension points observe it.
/// - `alternates` are tried in order, one attempt each.
pub struct RecoveryTask<'a> {
    /// Surface identifier whose breaker and health record apply.
    pub surface_id: &'a SurfaceId,
    /// Query request forwarded to every path.
    pub request: &'a QueryRequest,
    /// Primary adapter for the surface.
    pub primary: &'a dyn SurfaceAdapter,
    /// Ordered alternative adapters, one attempt each.
    pub alternates: &'a [Arc<dyn SurfaceAdapter>],
    /// Optional CDP fallback invoked once.
    pub cdp_fallback: Option<&'a dyn CdpFallback>,
    /// Absolute deadline for the whole chain.
    pub deadline: Timestamp,
}

// ============================================================================
// SECTION: Recovery Result
// ============================================================================

/// Strategy that produced the successful response.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    /// Primary adapter succeeded.
    Primary,
    /// CDP fallback succeeded.
    CdpFallback,
    /// An alternative adapter succeeded.
    AlternativeSurface,
}

/// Outcome of one recovery chain.
///
/// # Invariants
/// - `success = true` implies `response` and `strategy` are present.
/// - `errors` preserves classification order across the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryResult {
    /// Whether any path produced a response.
    pub success: bool,
    /// Strategy that produced the response.
    pub strategy: Option<RecoveryStrategy>,
    /// Total adapter invocations across every path.
    pub attempts: u32,
    /// Total wall time for the chain in milliseconds.
    pub total_elapsed_ms: u64,
    /// Ordered classified error strings accumulated across the chain.
    pub errors: Vec<String>,
    /// Classification of the final failure when the chain failed.
    pub final_error: Option<FailureKind>,
    /// Successful response when present.
    pub response: Option<AdapterResponse>,
}

// ============================================================================
// SECTION: Recovery Manager
// ============================================================================

/// Failover chain executor with per-surface circuit state.
///
/// # Invariants
/// - At most one failure is recorded on the surface per chain.
/// - A circuit trip consumes no attempts and performs no underlying call.
pub struct RecoveryManager {
    /// Retry and backoff configuration.
    config: RecoveryConfig,
    /// Process-wide surface health board.
    board: Arc<SurfaceHealthBoard>,
    /// Clock used for timestamps and backoff waits.
    clock: SharedClock,
}

impl RecoveryManager {
    /// Creates a recovery manager over the given health board.
    #[must_use]
    pub fn new(config: RecoveryConfig, board: Arc<SurfaceHealthBoard>, clock: SharedClock) -> Self {
        Self {
            config,
            board,
            clock,
        }
    }

    /// Returns the shared health board.
    #[must_use]
    pub fn board(&self) -> &Arc<SurfaceHealthBoard> {
        &self.board
    }

    /// Runs the failover chain for one cell.
    pub async fn execute(&self, task: &RecoveryTask<'_>, cancel: &CancellationToken) -> RecoveryResult {
        let started = self.clock.now();
        let mut chain = ChainState::new();

        if started > task.deadline {
            chain.record_error(FailureKind::Timeout, "deadline passed before execution");
            return chain.into_failure(started, self.clock.now());
        }
        if self.board.check(task.surface_id, started) == CircuitCheck::Trip {
            chain.record_error(FailureKind::CircuitOpen, "circuit open for surface");
            return chain.into_failure(started, self.clock.now());
        }

        match self.run_primary(task, cancel, &mut chain, started).await {
            PrimaryOutcome::Terminal(result) => return *result,
            PrimaryOutcome::DeadlineExceeded => {
                self.board.record_failure(task.surface_id, FailureKind::Timeout, self.clock.now());
                return chain.into_failure(started, self.clock.now());
            }
            PrimaryOutcome::Exhausted => {}
        }

        if let Some(fallback) = task.cdp_fallback {
            if cancel.is_cancelled() {
                chain.record_error(FailureKind::Cancelled, "cancelled before cdp fallback");
                return chain.into_failure(started, self.clock.now());
            }
            chain.attempts += 1;
            match fallback.invoke(task.request, cancel).await {
                Ok(response) => {
                    self.board.record_success(task.surface_id, self.clock.now());
                    return chain.into_success(
                        RecoveryStrategy::CdpFallback,
                        response,
                        started,
                        self.clock.now(),
                    );
                }
                Err(failure) => chain.record_error(failure.kind, &failure.message),
            }
        }

        for alternate in task.alternates {
            if cancel.is_cancelled() {
                chain.record_error(FailureKind::Cancelled, "cancelled before alternative surface");
                return chain.into_failure(started, self.clock.now());
            }
            if self.clock.now() > task.deadline {
                chain.record_error(FailureKind::Timeout, "deadline passed before alternative surface");
                break;
            }
            chain.attempts += 1;
            match alternate.query(task.request, cancel).await {
                Ok(response) => {
                    return chain.into_success(
                        RecoveryStrategy::AlternativeSurface,
                        response,
                        started,
                        self.clock.now(),
                    );
                }
                Err(failure) => chain.record_error(failure.kind, &failure.message),
            }
        }

        self.board.record_failure(
            task.surface_id,
            chain.final_error.unwrap_or(FailureKind::Unknown),
            self.clock.now(),
        );
        chain.into_failure(started, self.clock.now())
    }

    /// Runs the primary retry loop.
    async fn run_primary(
        &self,
        task: &RecoveryTask<'_>,
        cancel: &CancellationToken,
        chain: &mut ChainState,
        started: Timestamp,
    ) -> PrimaryOutcome {
        for attempt in 0..self.config.max_retries {
            if cancel.is_cancelled() {
                chain.record_error(FailureKind::Cancelled, "cancelled before attempt");
                return PrimaryOutcome::Terminal(Box::new(chain.clone().into_failure(started, self.clock.now())));
            }
            if self.clock.now() > task.deadline {
                chain.record_error(FailureKind::Timeout, "deadline passed before attempt");
                return PrimaryOutcome::DeadlineExceeded;
            }
            chain.attempts += 1;
            let outcome = tokio::select! {
                biased;
                outcome = task.primary.query(task.request, cancel) => Some(outcome),
                () = cancel.cancelled() => None,
            };
            let Some(outcome) = outcome else {
                // The in-flight call could not be cancelled; abandon it.
                chain.record_error(FailureKind::Cancelled, "in-flight call abandoned");
                task.primary.close().await;
                return PrimaryOutcome::Terminal(Box::new(chain.clone().into_failure(started, self.clock.now())));
            };
            match outcome {
                Ok(response) => {
                    self.board.record_success(task.surface_id, self.clock.now());
                    return PrimaryOutcome::Terminal(Box::new(chain.clone().into_success(
                        RecoveryStrategy::Primary,
                        response,
                        started,
                        self.clock.now(),
                    )));
                }
                Err(failure) => {
                    chain.record_error(failure.kind, &failure.message);
                    if failure.kind == FailureKind::Cancelled {
                        return PrimaryOutcome::Terminal(Box::new(
                            chain.clone().into_failure(started, self.clock.now()),
                        ));
                    }
                    if failure.kind.invalidates_session()
                        || !failure.kind.is_retryable_same_path()
                        || attempt + 1 >= self.config.max_retries
                    {
                        break;
                    }
                    let wait = self.backoff_for(failure.kind, attempt);
                    tokio::select! {
                        () = self.clock.sleep(wait) => {}
                        () = cancel.cancelled() => {
                            chain.record_error(FailureKind::Cancelled, "cancelled during backoff");
                            return PrimaryOutcome::Terminal(Box::new(
                                chain.clone().into_failure(started, self.clock.now()),
                            ));
                        }
                    }
                    if self.clock.now() > task.deadline {
                        chain.record_error(FailureKind::Timeout, "deadline passed during backoff");
                        return PrimaryOutcome::DeadlineExceeded;
                    }
                }
            }
        }
        PrimaryOutcome::Exhausted
    }

    /// Computes the backoff wait for a classified failure.
    fn backoff_for(&self, kind: FailureKind, attempt: u32) -> Duration {
        let millis = if kind == FailureKind::RateLimit {
            let shift = attempt.min(16);
            let exponential = self.config.base_backoff_ms.saturating_mul(1_u64 << shift);
            let jitter = if self.config.jitter_ms == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=self.config.jitter_ms)
            };
            exponential.saturating_add(jitter).min(self.config.backoff_cap_ms)
        } else {
            self.config.base_backoff_ms
        };
        Duration::from_millis(millis)
    }
}

/// Outcome of the primary retry loop.
enum PrimaryOutcome {
    /// The chain is settled; return this result as-is.
    Terminal(Box<RecoveryResult>),
    /// The chain deadline passed; settle as a timeout failure.
    DeadlineExceeded,
    /// Every primary attempt failed; continue with fallback paths.
    Exhausted,
}

// ============================================================================
// SECTION: Chain State
// ============================================================================

/// Mutable accumulator threaded through the failover chain.
///
/// # Invariants
/// - `errors` and `final_error` stay aligned: the last recorded error is
///   the final classification.
#[derive(Debug, Clone)]
struct ChainState {
    /// Total adapter invocations so far.
    attempts: u32,
    /// Ordered classified error strings.
    errors: Vec<String>,
    /// Classification of the most recent failure.
    final_error: Option<FailureKind>,
}

impl ChainState {
    /// Creates an empty chain accumulator.
    const fn new() -> Self {
        Self {
            attempts: 0,
            errors: Vec::new(),
            final_error: None,
        }
    }

    /// Records a classified error on the chain.
    fn record_error(&mut self, kind: FailureKind, message: &str) {
        self.errors.push(format!("{kind}: {message}"));
        self.final_error = Some(kind);
    }

    /// Finalizes the chain as a success.
    fn into_success(
        self,
        strategy: RecoveryStrategy,
        response: AdapterResponse,
        started: Timestamp,
        now: Timestamp,
    ) -> RecoveryResult {
        RecoveryResult {
            success: true,
            strategy: Some(strategy),
            attempts: self.attempts,
            total_elapsed_ms: elapsed_ms(started, now),
            errors: self.errors,
            final_error: None,
            response: Some(response),
        }
    }

    /// Finalizes the chain as a failure.
    fn into_failure(self, started: Timestamp, now: Timestamp) -> RecoveryResult {
        RecoveryResult {
            success: false,
            strategy: None,
            attempts: self.attempts,
            total_elapsed_ms: elapsed_ms(started, now),
            errors: self.errors,
            final_error: self.final_error,
            response: None,
        }
    }
}

/// Returns the non-negative elapsed milliseconds between two timestamps.
fn elapsed_ms(started: Timestamp, now: Timestamp) -> u64 {
    u64::try_from(started.millis_until(now)).unwrap_or(0)
}
