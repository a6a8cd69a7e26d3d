// crates/bentham-core/src/core/cancel.rs
// ============================================================================
// Module: Cancellation Token
// Description: Hierarchical cooperative cancellation for study execution.
// Purpose: Abort pending sleeps and in-flight adapter calls on cancel.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! One cancellation token propagates from the orchestrator through the
//! executor and recovery manager down to adapters. Every suspension point
//! observes the token: retry sleeps race against it, fallbacks check it
//! before invocation, and adapters that cannot abort are abandoned with
//! their resources closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use tokio::sync::watch;

// ============================================================================
// SECTION: Token
// ============================================================================

/// Cooperative cancellation token.
///
/// # Invariants
/// - Once cancelled, a token never resets.
/// - Clones observe the same cancellation source.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    /// Receiver half observed at suspension points.
    rx: watch::Receiver<bool>,
}

/// Cancellation source owned by the orchestrator.
///
/// # Invariants
/// - Dropping the source does not cancel outstanding tokens.
#[derive(Debug)]
pub struct CancellationSource {
    /// Sender half flipping the cancellation flag.
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    /// Creates a new cancellation source and its first token.
    #[must_use]
    pub fn new() -> (Self, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                tx,
            },
            CancellationToken {
                rx,
            },
        )
    }

    /// Cancels every token derived from this source.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Returns a fresh token observing this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancellationToken {
    /// Returns a token that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        Self {
            rx,
        }
    }

    /// Returns true when cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until cancellation is requested.
    ///
    /// Returns immediately when the token is already cancelled. If the
    /// source is dropped without cancelling, this pends forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Source dropped without cancelling; pend forever so select! arms
        // relying on cancellation never fire spuriously.
        std::future::pending::<()>().await;
    }
}
