// crates/bentham-surfaces/src/scripted.rs
// ============================================================================
// Module: Scripted Surfaces
// Description: Deterministic reference adapters for tests and demos.
// Purpose: Drive the control plane without network access.
// Dependencies: bentham-core
// ============================================================================

//! ## Overview
//! Two deterministic adapters: [`ScriptedSurface`] consumes a queue of
//! outcomes front to back and counts invocations; [`EchoSurface`] answers
//! every query with a derived echo. Both are used by the gateway and
//! system test suites and double as reference implementations of the
//! adapter contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use bentham_core::AdapterFailure;
use bentham_core::AdapterResponse;
use bentham_core::CancellationToken;
use bentham_core::FailureKind;
use bentham_core::QueryRequest;
use bentham_core::SurfaceAdapter;

// ============================================================================
// SECTION: Scripted Surface
// ============================================================================

/// Adapter returning a scripted queue of outcomes.
///
/// # Invariants
/// - Outcomes are consumed front to back; an exhausted script fails with
///   `UNKNOWN`.
pub struct ScriptedSurface {
    /// Outcome queue consumed front to back.
    outcomes: Mutex<VecDeque<Result<AdapterResponse, AdapterFailure>>>,
    /// Total invocation count.
    calls: AtomicU32,
}

impl ScriptedSurface {
    /// Creates an adapter over the given outcome script.
    #[must_use]
    pub fn new(outcomes: Vec<Result<AdapterResponse, AdapterFailure>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicU32::new(0),
        }
    }

    /// Returns the number of invocations so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Builds a successful scripted outcome.
    #[must_use]
    pub fn ok(text: &str) -> Result<AdapterResponse, AdapterFailure> {
        Ok(AdapterResponse {
            text: text.to_string(),
            citations: Vec::new(),
            duration_ms: 10,
            ttfb_ms: Some(5),
            token_usage: None,
            provenance: None,
        })
    }

    /// Builds a classified scripted failure.
    #[must_use]
    pub fn err(kind: FailureKind) -> Result<AdapterResponse, AdapterFailure> {
        Err(AdapterFailure::new(kind, "scripted failure"))
    }
}

#[async_trait]
impl SurfaceAdapter for ScriptedSurface {
    async fn query(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcomes.lock().ok().and_then(|mut outcomes| outcomes.pop_front());
        outcome
            .unwrap_or_else(|| Err(AdapterFailure::new(FailureKind::Unknown, "script exhausted")))
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        Ok(())
    }

    async fn close(&self) {}
}

// ============================================================================
// SECTION: Gated Surface
// ============================================================================

/// Adapter that blocks each call until the caller releases a gate permit.
///
/// # Invariants
/// - One permit is consumed per call; an open gate never re-closes itself.
pub struct GatedSurface {
    /// Gate consumed once per call.
    gate: std::sync::Arc<tokio::sync::Semaphore>,
    /// Response text returned after the gate opens.
    text: String,
}

impl GatedSurface {
    /// Creates a gated adapter with a closed gate.
    #[must_use]
    pub fn new(text: &str) -> (Self, std::sync::Arc<tokio::sync::Semaphore>) {
        let gate = std::sync::Arc::new(tokio::sync::Semaphore::new(0));
        (
            Self {
                gate: std::sync::Arc::clone(&gate),
                text: text.to_string(),
            },
            gate,
        )
    }
}

#[async_trait]
impl SurfaceAdapter for GatedSurface {
    async fn query(
        &self,
        _request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        match self.gate.acquire().await {
            Ok(permit) => {
                permit.forget();
                Ok(AdapterResponse {
                    text: self.text.clone(),
                    citations: Vec::new(),
                    duration_ms: 10,
                    ttfb_ms: Some(5),
                    token_usage: None,
                    provenance: None,
                })
            }
            Err(_) => Err(AdapterFailure::new(FailureKind::SessionExpired, "gate closed")),
        }
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        Ok(())
    }

    async fn close(&self) {}
}

// ============================================================================
// SECTION: Echo Surface
// ============================================================================

/// Adapter answering every query with a derived echo.
///
/// # Invariants
/// - Responses are a pure function of the query text.
#[derive(Debug, Default)]
pub struct EchoSurface;

impl EchoSurface {
    /// Creates an echo surface.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SurfaceAdapter for EchoSurface {
    async fn query(
        &self,
        request: &QueryRequest,
        _cancel: &CancellationToken,
    ) -> Result<AdapterResponse, AdapterFailure> {
        Ok(AdapterResponse {
            text: format!("echo: {}", request.query),
            citations: Vec::new(),
            duration_ms: 1,
            ttfb_ms: Some(1),
            token_usage: None,
            provenance: None,
        })
    }

    async fn health_check(&self) -> Result<(), AdapterFailure> {
        Ok(())
    }

    async fn close(&self) {}
}
