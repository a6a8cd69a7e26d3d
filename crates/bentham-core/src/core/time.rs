// crates/bentham-core/src/core/time.rs
// ============================================================================
// Module: Bentham Time Model
// Description: Canonical timestamps and the clock seam for runtime waits.
// Purpose: Keep deadline checks and breaker resets deterministic under test.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! The control plane never reads wall-clock time directly. Every component
//! that needs "now" or a bounded wait takes a [`Clock`] so that deadline
//! evaluation, backoff sleeps, and circuit-breaker resets replay
//! deterministically in tests. Production wiring uses [`SystemClock`];
//! tests use [`ManualClock`], whose sleeps advance logical time instead of
//! blocking.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers via a [`Clock`]; the core
///   never reads wall-clock time directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp advanced by the given number of milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns the signed distance to `other` in milliseconds.
    #[must_use]
    pub const fn millis_until(self, other: Self) -> i64 {
        other.0.saturating_sub(self.0)
    }
}

// ============================================================================
// SECTION: Clock Seam
// ============================================================================

/// Clock abstraction supplying "now" and bounded waits.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;

    /// Waits for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Shared clock handle used by runtime components.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock implementation backed by the system time and tokio timers.
///
/// # Invariants
/// - `now` is non-decreasing barring host clock adjustments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::from_unix_millis(millis)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deterministic test clock whose sleeps advance logical time and return.
///
/// # Invariants
/// - `now` only moves forward via `advance` or completed sleeps.
/// - Sleeps never block; they account their duration and yield once.
#[derive(Debug)]
pub struct ManualClock {
    /// Current logical time in unix epoch milliseconds.
    now_millis: AtomicI64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given timestamp.
    #[must_use]
    pub const fn new(start: Timestamp) -> Self {
        Self {
            now_millis: AtomicI64::new(start.as_unix_millis()),
        }
    }

    /// Advances logical time by the given number of milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.now_millis.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}
