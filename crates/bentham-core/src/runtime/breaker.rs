// crates/bentham-core/src/runtime/breaker.rs
// ============================================================================
// Module: Surface Circuit Breaker
// Description: Per-surface health records and circuit state machine.
// Purpose: Short-circuit calls to surfaces after sustained failure.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! The health board holds one record per surface: last success/failure
//! timestamps, a running failure count, the circuit state, and the last
//! error classification. It is process-wide and shared by every executor
//! worker under a mutex with short critical sections. The state machine is
//! closed → open (threshold crossed) → half-open (reset interval elapsed);
//! a single success closes a half-open circuit, a single failure re-opens
//! it with a refreshed timestamp.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;

use crate::core::failure::FailureKind;
use crate::core::identifiers::SurfaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Circuit State
// ============================================================================

/// Circuit state for one surface.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    #[default]
    Closed,
    /// Calls fail fast until the reset interval elapses.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

/// Per-surface health record.
///
/// # Invariants
/// - `failure_count` resets to zero on any recorded success.
/// - `opened_at` is present iff the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SurfaceHealth {
    /// Timestamp of the last recorded success.
    pub last_success: Option<Timestamp>,
    /// Timestamp of the last recorded failure.
    pub last_failure: Option<Timestamp>,
    /// Consecutive failures since the last success.
    pub failure_count: u32,
    /// Current circuit state.
    pub state: CircuitState,
    /// Timestamp at which the circuit opened.
    pub opened_at: Option<Timestamp>,
    /// Classification of the last failure.
    pub last_error: Option<FailureKind>,
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Circuit breaker configuration.
///
/// # Invariants
/// - `failure_threshold >= 1`; a threshold of 1 opens on the first failure.
/// - `reset_ms` is the minimum open duration before a probe is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failures required to open the circuit.
    pub failure_threshold: u32,
    /// Open interval in milliseconds before probing resumes.
    pub reset_ms: i64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_ms: 60_000,
        }
    }
}

// ============================================================================
// SECTION: Health Board
// ============================================================================

/// Outcome of a circuit admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitCheck {
    /// The call may proceed.
    Proceed,
    /// The circuit is open; fail fast without an underlying call.
    Trip,
}

/// Process-wide board of per-surface health records.
///
/// # Invariants
/// - All mutation happens in short critical sections under one mutex.
/// - Records are created lazily on first check or recording.
#[derive(Debug)]
pub struct SurfaceHealthBoard {
    /// Breaker configuration shared by every surface.
    config: BreakerConfig,
    /// Health records keyed by surface.
    records: Mutex<BTreeMap<SurfaceId, SurfaceHealth>>,
}

impl SurfaceHealthBoard {
    /// Creates a board with the given configuration.
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Checks whether a call to the surface may proceed.
    ///
    /// An open circuit whose reset interval has elapsed moves to half-open
    /// and admits exactly this call as a probe.
    pub fn check(&self, surface_id: &SurfaceId, now: Timestamp) -> CircuitCheck {
        let Ok(mut records) = self.records.lock() else {
            return CircuitCheck::Proceed;
        };
        let record = records.entry(surface_id.clone()).or_default();
        match record.state {
            CircuitState::Closed | CircuitState::HalfOpen => CircuitCheck::Proceed,
            CircuitState::Open => {
                let elapsed = record
                    .opened_at
                    .is_none_or(|opened| opened.millis_until(now) >= self.config.reset_ms);
                if elapsed {
                    record.state = CircuitState::HalfOpen;
                    CircuitCheck::Proceed
                } else {
                    CircuitCheck::Trip
                }
            }
        }
    }

    /// Records a successful call, closing the circuit.
    pub fn record_success(&self, surface_id: &SurfaceId, now: Timestamp) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        let record = records.entry(surface_id.clone()).or_default();
        record.last_success = Some(now);
        record.failure_count = 0;
        record.state = CircuitState::Closed;
        record.opened_at = None;
    }

    /// Records a failed recovery chain for the surface.
    ///
    /// A half-open circuit re-opens with a refreshed timestamp; a closed
    /// circuit opens once the failure count crosses the threshold.
    pub fn record_failure(&self, surface_id: &SurfaceId, kind: FailureKind, now: Timestamp) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        let record = records.entry(surface_id.clone()).or_default();
        record.last_failure = Some(now);
        record.last_error = Some(kind);
        record.failure_count = record.failure_count.saturating_add(1);
        if record.state == CircuitState::HalfOpen
            || record.failure_count >= self.config.failure_threshold
        {
            record.state = CircuitState::Open;
            record.opened_at = Some(now);
        }
    }

    /// Returns a snapshot of the surface's health record when present.
    #[must_use]
    pub fn snapshot(&self, surface_id: &SurfaceId) -> Option<SurfaceHealth> {
        let records = self.records.lock().ok()?;
        records.get(surface_id).cloned()
    }
}
