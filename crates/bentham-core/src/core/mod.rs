// crates/bentham-core/src/core/mod.rs
// ============================================================================
// Module: Bentham Core Types
// Description: Data model for manifests, studies, jobs, and failures.
// Purpose: Provide the canonical records shared by every control-plane layer.
// Dependencies: serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! Core types are plain serializable records with documented invariants.
//! Runtime behavior (matrix emission, recovery, execution, orchestration)
//! lives in [`crate::runtime`]; integration seams live in
//! [`crate::interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cancel;
pub mod cost;
pub mod failure;
pub mod identifiers;
pub mod job;
pub mod manifest;
pub mod study;
pub mod time;
