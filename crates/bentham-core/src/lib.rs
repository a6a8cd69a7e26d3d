// crates/bentham-core/src/lib.rs
// ============================================================================
// Module: Bentham Core Library
// Description: Execution control plane for multi-tenant prompt studies.
// Purpose: Model studies, drain job matrices, and orchestrate lifecycles.
// Dependencies: async-trait, rand, serde, serde_json, sha2, thiserror, tokio
// ============================================================================

//! ## Overview
//! Bentham Core is the execution control plane: tenants submit declarative
//! study manifests describing a matrix of queries, surfaces, and locations;
//! the orchestrator admits them, the executor drains the derived job
//! matrix through a recovery-managed failover chain, and tenant-scoped
//! queries expose status, results, and costs.
//! Invariants:
//! - A study's settled-cell count is monotonic and never exceeds its total.
//! - Cell identity is the idempotency key; a succeeded cell never re-runs.
//! - Tenant scoping is enforced at the repository in addition to callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::cancel::CancellationSource;
pub use crate::core::cancel::CancellationToken;
pub use crate::core::cost::CostActuals;
pub use crate::core::cost::CostEstimate;
pub use crate::core::cost::CostRates;
pub use crate::core::cost::DEFAULT_CURRENCY;
pub use crate::core::failure::FailureKind;
pub use crate::core::identifiers::ApiKeyId;
pub use crate::core::identifiers::JobId;
pub use crate::core::identifiers::LocationId;
pub use crate::core::identifiers::SessionId;
pub use crate::core::identifiers::StudyId;
pub use crate::core::identifiers::SurfaceId;
pub use crate::core::identifiers::TenantId;
pub use crate::core::job::Citation;
pub use crate::core::job::Job;
pub use crate::core::job::JobResult;
pub use crate::core::job::JobStatus;
pub use crate::core::job::ResponseTiming;
pub use crate::core::job::SessionContext;
pub use crate::core::job::StructuredResponse;
pub use crate::core::job::TokenUsage;
pub use crate::core::job::ValidationSummary;
pub use crate::core::manifest::CompletionCriteria;
pub use crate::core::manifest::EvidenceLevel;
pub use crate::core::manifest::LocationSpec;
pub use crate::core::manifest::ProxyType;
pub use crate::core::manifest::QualityGates;
pub use crate::core::manifest::QuerySpec;
pub use crate::core::manifest::RequiredSurfaces;
pub use crate::core::manifest::SessionIsolation;
pub use crate::core::manifest::StudyManifest;
pub use crate::core::manifest::SurfaceRef;
pub use crate::core::study::Study;
pub use crate::core::study::StudyStatus;
pub use crate::core::time::Clock;
pub use crate::core::time::ManualClock;
pub use crate::core::time::SharedClock;
pub use crate::core::time::SystemClock;
pub use crate::core::time::Timestamp;
pub use crate::interfaces::AdapterFailure;
pub use crate::interfaces::AdapterResponse;
pub use crate::interfaces::ConversationTurn;
pub use crate::interfaces::JobPatch;
pub use crate::interfaces::JobRepository;
pub use crate::interfaces::ManifestValidator;
pub use crate::interfaces::QueryRequest;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::StudyPatch;
pub use crate::interfaces::StudyRepository;
pub use crate::interfaces::SurfaceAdapter;
pub use crate::interfaces::SurfaceResolver;
pub use crate::interfaces::ValidationReport;
pub use crate::runtime::breaker::BreakerConfig;
pub use crate::runtime::breaker::CircuitCheck;
pub use crate::runtime::breaker::CircuitState;
pub use crate::runtime::breaker::SurfaceHealth;
pub use crate::runtime::breaker::SurfaceHealthBoard;
pub use crate::runtime::executor::Executor;
pub use crate::runtime::executor::ExecutorConfig;
pub use crate::runtime::executor::JobEvent;
pub use crate::runtime::matrix::cell_job_id;
pub use crate::runtime::matrix::emit_job_matrix;
pub use crate::runtime::memory::InMemoryJobStore;
pub use crate::runtime::memory::InMemoryStudyStore;
pub use crate::runtime::orchestrator::CellRecord;
pub use crate::runtime::orchestrator::CostReport;
pub use crate::runtime::orchestrator::Orchestrator;
pub use crate::runtime::orchestrator::OrchestratorError;
pub use crate::runtime::orchestrator::ResultsSummary;
pub use crate::runtime::orchestrator::StudyAdmission;
pub use crate::runtime::orchestrator::StudyProgress;
pub use crate::runtime::orchestrator::StudyResults;
pub use crate::runtime::orchestrator::StudyStatusReport;
pub use crate::runtime::orchestrator::SurfaceBreakdown;
pub use crate::runtime::orchestrator::TransitionOutcome;
pub use crate::runtime::recovery::CdpFallback;
pub use crate::runtime::recovery::RecoveryConfig;
pub use crate::runtime::recovery::RecoveryManager;
pub use crate::runtime::recovery::RecoveryResult;
pub use crate::runtime::recovery::RecoveryStrategy;
pub use crate::runtime::recovery::RecoveryTask;
pub use crate::runtime::validate::BasicValidator;
pub use crate::runtime::validate::ValidatorConfig;
