// crates/bentham-core/src/core/study.rs
// ============================================================================
// Module: Study State
// Description: Runtime state for an admitted manifest.
// Purpose: Track lifecycle status, cell counters, timestamps, and costs.
// Dependencies: serde, crate::core::{cost, identifiers, manifest, time}
// ============================================================================

//! ## Overview
//! A study is the runtime record derived from an admitted manifest. Its
//! status moves through a fixed DAG; terminal states have no outgoing
//! transitions. Cell counters are strictly additive and only mutated by the
//! executor. Reads always observe a committed point in the transition
//! sequence because status changes go through compare-and-set store updates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::cost::CostActuals;
use crate::core::cost::CostEstimate;
use crate::core::identifiers::StudyId;
use crate::core::identifiers::TenantId;
use crate::core::manifest::StudyManifest;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Study Status
// ============================================================================

/// Study lifecycle status.
///
/// # Invariants
/// - Transitions follow [`StudyStatus::can_transition_to`]; the DAG is
///   `validating → queued → executing ⇄ paused`, with `executing` reaching
///   `completed` or `failed`, and `cancelled` reachable from any
///   non-terminal state.
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyStatus {
    /// Manifest admitted and undergoing validation.
    Validating,
    /// Job matrix emitted; awaiting executor pickup.
    Queued,
    /// Workers are draining the job matrix.
    Executing,
    /// Workers stopped claiming new jobs for this study.
    Paused,
    /// Completion criteria satisfied.
    Completed,
    /// Completion criteria unsatisfiable or deadline exceeded.
    Failed,
    /// Cancelled by the tenant.
    Cancelled,
}

impl StudyStatus {
    /// Returns true when the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true when the DAG permits a transition to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Validating => matches!(next, Self::Queued | Self::Failed | Self::Cancelled),
            Self::Queued => matches!(next, Self::Executing | Self::Failed | Self::Cancelled),
            Self::Executing => matches!(
                next,
                Self::Paused | Self::Completed | Self::Failed | Self::Cancelled
            ),
            Self::Paused => matches!(next, Self::Executing | Self::Failed | Self::Cancelled),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }

    /// Returns the externalized label used in HTTP bodies.
    ///
    /// The internal `executing` state is reported as `running`; every other
    /// state uses its snake_case name.
    #[must_use]
    pub const fn external_label(self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Queued => "queued",
            Self::Executing => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

// ============================================================================
// SECTION: Study Record
// ============================================================================

/// Runtime state for an admitted manifest.
///
/// # Invariants
/// - `completed_cells + failed_cells <= total_cells` at all times.
/// - `total_cells` equals the initially emitted job count.
/// - The manifest is immutable after admission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    /// Globally unique study identifier.
    pub study_id: StudyId,
    /// Owning tenant identifier.
    pub tenant_id: TenantId,
    /// The admitted manifest.
    pub manifest: StudyManifest,
    /// Current lifecycle status.
    pub status: StudyStatus,
    /// Cause recorded when the study fails.
    pub failure_cause: Option<String>,
    /// Total emitted cells.
    pub total_cells: u64,
    /// Cells that reached a succeeded state.
    pub completed_cells: u64,
    /// Cells that reached a failed state.
    pub failed_cells: u64,
    /// Admission timestamp.
    pub created_at: Timestamp,
    /// Execution start timestamp.
    pub started_at: Option<Timestamp>,
    /// Completion timestamp for terminal states.
    pub completed_at: Option<Timestamp>,
    /// Admission-time cost estimate.
    pub estimated_cost: CostEstimate,
    /// Actual cost accumulated by the executor.
    pub actual_cost: CostActuals,
}

impl Study {
    /// Returns the number of cells that are neither succeeded nor failed.
    #[must_use]
    pub const fn pending_cells(&self) -> u64 {
        self.total_cells
            .saturating_sub(self.completed_cells)
            .saturating_sub(self.failed_cells)
    }

    /// Returns completion percentage rounded to the nearest integer.
    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        if self.total_cells == 0 {
            return 0;
        }
        let settled = self.completed_cells.saturating_add(self.failed_cells);
        let percent = (settled.saturating_mul(200)).div_euclid(self.total_cells);
        let rounded = percent.div_euclid(2) + percent.rem_euclid(2);
        u8::try_from(rounded.min(100)).unwrap_or(100)
    }
}
