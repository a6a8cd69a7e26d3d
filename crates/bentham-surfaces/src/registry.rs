// crates/bentham-surfaces/src/registry.rs
// ============================================================================
// Module: Surface Registry
// Description: Registry mapping surface identifiers to adapters.
// Purpose: Resolve executor lookups with allowlist and denylist policy.
// Dependencies: bentham-core
// ============================================================================

//! ## Overview
//! The surface registry resolves adapter lookups by surface identifier and
//! enforces allowlist and denylist policy. Discovery happens at process
//! start through the builder; the registry is immutable afterwards and
//! implements the core [`SurfaceResolver`] seam for the executor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use bentham_core::SurfaceAdapter;
use bentham_core::SurfaceId;
use bentham_core::SurfaceResolver;

// ============================================================================
// SECTION: Access Policy
// ============================================================================

/// Access policy controlling which surfaces may be resolved.
///
/// # Invariants
/// - `denylist` overrides `allowlist` when both are present.
/// - If `allowlist` is `None`, all surfaces are allowed unless denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceAccessPolicy {
    /// Optional allowlist of surface identifiers.
    pub allowlist: Option<BTreeSet<String>>,
    /// Explicit denylist of surface identifiers.
    pub denylist: BTreeSet<String>,
}

impl SurfaceAccessPolicy {
    /// Returns a policy that permits all surfaces.
    #[must_use]
    pub const fn allow_all() -> Self {
        Self {
            allowlist: None,
            denylist: BTreeSet::new(),
        }
    }

    /// Returns true when the surface is allowed by policy.
    #[must_use]
    pub fn is_allowed(&self, surface_id: &str) -> bool {
        if self.denylist.contains(surface_id) {
            return false;
        }
        if let Some(allowlist) = &self.allowlist {
            return allowlist.contains(surface_id);
        }
        true
    }
}

impl Default for SurfaceAccessPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Builder for the surface registry.
///
/// # Invariants
/// - Registrations are keyed by surface id; later registrations overwrite
///   earlier ones.
#[derive(Default)]
pub struct SurfaceRegistryBuilder {
    /// Adapters keyed by surface.
    adapters: BTreeMap<SurfaceId, Arc<dyn SurfaceAdapter>>,
    /// Access policy applied on resolution.
    policy: SurfaceAccessPolicy,
}

impl SurfaceRegistryBuilder {
    /// Registers an adapter for the given surface.
    #[must_use]
    pub fn surface(mut self, surface_id: impl Into<String>, adapter: impl SurfaceAdapter + 'static) -> Self {
        self.adapters.insert(SurfaceId::new(surface_id), Arc::new(adapter));
        self
    }

    /// Registers a shared adapter for the given surface.
    #[must_use]
    pub fn shared_surface(mut self, surface_id: impl Into<String>, adapter: Arc<dyn SurfaceAdapter>) -> Self {
        self.adapters.insert(SurfaceId::new(surface_id), adapter);
        self
    }

    /// Sets the access policy.
    #[must_use]
    pub fn policy(mut self, policy: SurfaceAccessPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the immutable registry.
    #[must_use]
    pub fn build(self) -> SurfaceRegistry {
        SurfaceRegistry {
            adapters: self.adapters,
            policy: self.policy,
        }
    }
}

/// Immutable registry mapping surface identifiers to adapters.
///
/// # Invariants
/// - Never mutated after `build`; discovery is a composition-time choice.
pub struct SurfaceRegistry {
    /// Adapters keyed by surface.
    adapters: BTreeMap<SurfaceId, Arc<dyn SurfaceAdapter>>,
    /// Access policy applied on resolution.
    policy: SurfaceAccessPolicy,
}

impl SurfaceRegistry {
    /// Returns a builder for the registry.
    #[must_use]
    pub fn builder() -> SurfaceRegistryBuilder {
        SurfaceRegistryBuilder::default()
    }

    /// Returns the registered surface identifiers in order.
    #[must_use]
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        self.adapters.keys().cloned().collect()
    }
}

impl SurfaceResolver for SurfaceRegistry {
    fn resolve(&self, surface_id: &SurfaceId) -> Option<Arc<dyn SurfaceAdapter>> {
        if !self.policy.is_allowed(surface_id.as_str()) {
            return None;
        }
        self.adapters.get(surface_id).cloned()
    }
}
