// crates/bentham-core/src/core/cost.rs
// ============================================================================
// Module: Cost Model
// Description: Admission estimates and accumulated actuals per study.
// Purpose: Track per-tenant cost in a single currency with a surface breakdown.
// Dependencies: serde, crate::core::identifiers
// ============================================================================

//! ## Overview
//! Costs are tracked in one currency per deployment. The orchestrator
//! computes a min/max estimate at admission from per-surface unit rates;
//! the executor accumulates actuals from adapter-reported token usage. The
//! breakdown is keyed by surface so tenants can attribute spend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::SurfaceId;

// ============================================================================
// SECTION: Currency
// ============================================================================

/// Default deployment currency.
pub const DEFAULT_CURRENCY: &str = "USD";

// ============================================================================
// SECTION: Estimates
// ============================================================================

/// Admission-time cost estimate for a study.
///
/// # Invariants
/// - `min <= max`; both are totals over every emitted cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Lower bound for the study total.
    pub min: f64,
    /// Upper bound for the study total.
    pub max: f64,
    /// Currency code for both bounds.
    pub currency: String,
}

impl CostEstimate {
    /// Returns a zero estimate in the default currency.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Per-surface unit rates used for admission estimates.
///
/// # Invariants
/// - Rates are per cell in the deployment currency; unknown surfaces fall
///   back to `default_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRates {
    /// Per-cell rate applied when a surface has no explicit rate.
    pub default_rate: f64,
    /// Explicit per-cell rates keyed by surface.
    pub surface_rates: BTreeMap<SurfaceId, f64>,
    /// Multiplier applied to the upper bound to account for retries.
    pub retry_headroom: f64,
}

impl CostRates {
    /// Returns the per-cell rate for a surface.
    #[must_use]
    pub fn rate_for(&self, surface_id: &SurfaceId) -> f64 {
        self.surface_rates.get(surface_id).copied().unwrap_or(self.default_rate)
    }
}

impl Default for CostRates {
    fn default() -> Self {
        Self {
            default_rate: 0.01,
            surface_rates: BTreeMap::new(),
            retry_headroom: 2.0,
        }
    }
}

// ============================================================================
// SECTION: Actuals
// ============================================================================

/// Actual cost accumulated for a study.
///
/// # Invariants
/// - `total` equals the sum of the breakdown values.
/// - Strictly additive; only the executor mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostActuals {
    /// Study total in the deployment currency.
    pub total: f64,
    /// Currency code for the total and the breakdown.
    pub currency: String,
    /// Per-surface spend breakdown.
    pub breakdown: BTreeMap<SurfaceId, f64>,
}

impl CostActuals {
    /// Returns zero actuals in the default currency.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            total: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            breakdown: BTreeMap::new(),
        }
    }

    /// Adds spend for a surface, keeping the total and breakdown aligned.
    pub fn record(&mut self, surface_id: &SurfaceId, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        self.total += amount;
        *self.breakdown.entry(surface_id.clone()).or_insert(0.0) += amount;
    }
}
