// crates/bentham-core/tests/proptest_lifecycle.rs
// ============================================================================
// Module: Lifecycle Property Tests
// Description: Property tests for the status DAG and derived counters.
// ============================================================================
//! ## Overview
//! Property-based checks over the study status DAG, completion-percentage
//! bounds, and matrix cardinality.

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

use bentham_core::CostActuals;
use bentham_core::CostEstimate;
use bentham_core::Study;
use bentham_core::StudyId;
use bentham_core::StudyStatus;
use bentham_core::TenantId;
use bentham_core::emit_job_matrix;
use proptest::prelude::*;
use proptest::sample::select;

use common::EPOCH;
use common::sample_manifest;

// ============================================================================
// SECTION: Strategies
// ============================================================================

const ALL_STATUSES: [StudyStatus; 7] = [
    StudyStatus::Validating,
    StudyStatus::Queued,
    StudyStatus::Executing,
    StudyStatus::Paused,
    StudyStatus::Completed,
    StudyStatus::Failed,
    StudyStatus::Cancelled,
];

// ============================================================================
// SECTION: Status DAG
// ============================================================================

proptest! {
    #[test]
    fn terminal_states_have_no_outgoing_transitions(
        from in select(ALL_STATUSES.to_vec()),
        to in select(ALL_STATUSES.to_vec()),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    #[test]
    fn transitions_never_skip_admission(
        to in select(ALL_STATUSES.to_vec()),
    ) {
        // Validating only reaches queued or a terminal abort.
        if StudyStatus::Validating.can_transition_to(to) {
            prop_assert!(matches!(
                to,
                StudyStatus::Queued | StudyStatus::Failed | StudyStatus::Cancelled
            ));
        }
    }

    #[test]
    fn completion_percentage_is_bounded(
        total in 0_u64..10_000,
        completed in 0_u64..10_000,
        failed in 0_u64..10_000,
    ) {
        let completed = completed.min(total);
        let failed = failed.min(total - completed);
        let study = Study {
            study_id: StudyId::new("study_prop"),
            tenant_id: TenantId::new("T1"),
            manifest: sample_manifest(1, &["chatgpt"], EPOCH.plus_millis(1)),
            status: StudyStatus::Executing,
            failure_cause: None,
            total_cells: total,
            completed_cells: completed,
            failed_cells: failed,
            created_at: EPOCH,
            started_at: None,
            completed_at: None,
            estimated_cost: CostEstimate::zero(),
            actual_cost: CostActuals::zero(),
        };
        prop_assert!(study.completion_percentage() <= 100);
        prop_assert!(study.pending_cells() <= total);
        prop_assert!(study.completed_cells + study.failed_cells <= study.total_cells);
    }

    #[test]
    fn matrix_cardinality_matches_the_manifest(
        queries in 1_usize..6,
        extra_surfaces in any::<bool>(),
    ) {
        let surfaces: Vec<&str> = if extra_surfaces {
            vec!["chatgpt", "perplexity"]
        } else {
            vec!["chatgpt"]
        };
        let manifest = sample_manifest(queries, &surfaces, EPOCH.plus_millis(1));
        let jobs = emit_job_matrix(&StudyId::new("study_prop"), &manifest);
        prop_assert_eq!(jobs.len() as u64, manifest.cell_count());
    }
}
