// crates/bentham-core/src/runtime/validate.rs
// ============================================================================
// Module: Manifest Validation
// Description: Reference well-formedness validator for study manifests.
// Purpose: Reject malformed manifests deterministically before admission.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The basic validator checks manifest well-formedness: non-empty matrix
//! axes, threshold bounds, a future deadline, and structural caps. It is
//! deterministic and tenant-agnostic. Deployments with richer validation
//! plug their own [`ManifestValidator`] implementation into the
//! orchestrator; this one is the reference wiring.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use crate::core::identifiers::SurfaceId;
use crate::core::manifest::StudyManifest;
use crate::core::time::Timestamp;
use crate::interfaces::ManifestValidator;
use crate::interfaces::ValidationReport;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Structural caps applied by the basic validator.
///
/// # Invariants
/// - Caps bound matrix axes; the gateway separately bounds request bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Maximum queries per manifest.
    pub max_queries: usize,
    /// Maximum surfaces per manifest.
    pub max_surfaces: usize,
    /// Maximum locations per manifest.
    pub max_locations: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_queries: 5_000,
            max_surfaces: 50,
            max_locations: 100,
        }
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Reference well-formedness validator.
///
/// # Invariants
/// - Deterministic: identical manifests and admission times produce
///   identical reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicValidator {
    /// Structural caps.
    config: ValidatorConfig,
}

impl BasicValidator {
    /// Creates a validator with the given caps.
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
        }
    }
}

impl ManifestValidator for BasicValidator {
    fn validate(&self, manifest: &StudyManifest, now: Timestamp) -> ValidationReport {
        let mut errors: Vec<String> = Vec::new();

        if manifest.name.trim().is_empty() {
            errors.push("manifest name must not be empty".to_string());
        }
        if manifest.queries.is_empty() {
            errors.push("manifest requires at least one query".to_string());
        }
        if manifest.queries.len() > self.config.max_queries {
            errors.push(format!(
                "manifest exceeds the query cap of {}",
                self.config.max_queries
            ));
        }
        if manifest.queries.iter().any(|query| query.text.trim().is_empty()) {
            errors.push("query text must not be empty".to_string());
        }
        if manifest.surfaces.is_empty() {
            errors.push("manifest requires at least one surface".to_string());
        }
        if manifest.surfaces.len() > self.config.max_surfaces {
            errors.push(format!(
                "manifest exceeds the surface cap of {}",
                self.config.max_surfaces
            ));
        }
        if manifest.locations.is_empty() {
            errors.push("manifest requires at least one location".to_string());
        }
        if manifest.locations.len() > self.config.max_locations {
            errors.push(format!(
                "manifest exceeds the location cap of {}",
                self.config.max_locations
            ));
        }

        let threshold = manifest.completion_criteria.coverage_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            errors.push("coverage threshold must be within [0, 1]".to_string());
        }

        let declared: BTreeSet<&SurfaceId> =
            manifest.surfaces.iter().map(|surface| &surface.surface_id).collect();
        for required in &manifest.completion_criteria.required_surfaces.surface_ids {
            if !declared.contains(required) {
                errors.push(format!("required surface {required} is not declared"));
            }
        }

        if manifest.deadline <= now {
            errors.push("deadline must be strictly in the future".to_string());
        }

        if errors.is_empty() {
            ValidationReport::valid()
        } else {
            ValidationReport::invalid(errors)
        }
    }
}
