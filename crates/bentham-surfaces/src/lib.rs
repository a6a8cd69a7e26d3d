// crates/bentham-surfaces/src/lib.rs
// ============================================================================
// Module: Bentham Surfaces Library
// Description: Surface registry and reference adapter implementations.
// Purpose: Resolve surface identifiers to adapters at composition time.
// Dependencies: bentham-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Bentham Surfaces provides the registry the executor resolves adapters
//! through, plus two adapter families: a REST chat-completion adapter for
//! JSON HTTP surfaces and deterministic scripted adapters for tests and
//! demos. Browser-driven families plug in through the same core contract.
//! Invariants:
//! - Registry contents are fixed at process start.
//! - Denied or unregistered surfaces resolve to nothing; callers fail the
//!   cell with `SURFACE_UNAVAILABLE`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod registry;
pub mod rest;
pub mod scripted;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use registry::SurfaceAccessPolicy;
pub use registry::SurfaceRegistry;
pub use registry::SurfaceRegistryBuilder;
pub use rest::RestSurfaceAdapter;
pub use rest::RestSurfaceConfig;
pub use scripted::EchoSurface;
pub use scripted::GatedSurface;
pub use scripted::ScriptedSurface;
