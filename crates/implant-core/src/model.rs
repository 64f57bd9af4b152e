// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Implant Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Dose profile models evaluated by the implant tracer.
//!
//! A model is a pure pair of functions over beam-aligned coordinates:
//!   dose(depth, lateral) = f(depth) · g(lateral, depth)
//! Models must return a finite value for any real input; regions where the
//! physics is undefined (negative depth, say) are zeroed here, not in the
//! tracer.

use implant_types::config::ModelParameters;
use implant_types::constants::{
    DEFAULT_DEPTH_STRAGGLE, DEFAULT_DOSE, DEFAULT_LATERAL_STRAGGLE, DEFAULT_PROJECTED_RANGE,
    MIN_STRAGGLE,
};
use std::f64::consts::PI;

/// Depth and lateral dose profile.
pub trait ImplantModel: Send + Sync {
    /// Dose density at beam-aligned `depth`.
    fn depth_profile(&self, depth: f64, params: &ModelParameters) -> f64;

    /// Lateral spreading weight at distance `lateral` from the beam axis.
    fn lateral_profile(&self, lateral: f64, depth: f64, params: &ModelParameters) -> f64;
}

fn gaussian(x: f64, mean: f64, sigma: f64) -> f64 {
    let s = sigma.abs().max(MIN_STRAGGLE);
    let u = (x - mean) / s;
    (-0.5 * u * u).exp() / ((2.0 * PI).sqrt() * s)
}

/// Gaussian range distribution with Gaussian lateral straggling.
///
/// Parameter keys (each overrides the field of the same name):
/// `projected_range`, `depth_straggle`, `lateral_straggle`, `lateral_growth`,
/// `dose`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianImplant {
    /// Rp
    pub projected_range: f64,
    /// ΔRp
    pub depth_straggle: f64,
    /// ΔRl at the surface.
    pub lateral_straggle: f64,
    /// Relative ΔRl growth per unit depth.
    pub lateral_growth: f64,
    pub dose: f64,
}

impl Default for GaussianImplant {
    fn default() -> Self {
        Self {
            projected_range: DEFAULT_PROJECTED_RANGE,
            depth_straggle: DEFAULT_DEPTH_STRAGGLE,
            lateral_straggle: DEFAULT_LATERAL_STRAGGLE,
            lateral_growth: 0.0,
            dose: DEFAULT_DOSE,
        }
    }
}

impl GaussianImplant {
    /// Lateral straggle at `depth`: ΔRl · (1 + growth · max(depth, 0)).
    pub fn lateral_straggle_at(&self, depth: f64, params: &ModelParameters) -> f64 {
        let base = params.get_or("lateral_straggle", self.lateral_straggle);
        let growth = params.get_or("lateral_growth", self.lateral_growth);
        (base * (1.0 + growth * depth.max(0.0))).abs().max(MIN_STRAGGLE)
    }
}

impl ImplantModel for GaussianImplant {
    fn depth_profile(&self, depth: f64, params: &ModelParameters) -> f64 {
        if !depth.is_finite() || depth < 0.0 {
            return 0.0;
        }
        let rp = params.get_or("projected_range", self.projected_range);
        let straggle = params.get_or("depth_straggle", self.depth_straggle);
        let dose = params.get_or("dose", self.dose);
        dose * gaussian(depth, rp, straggle)
    }

    fn lateral_profile(&self, lateral: f64, depth: f64, params: &ModelParameters) -> f64 {
        if !lateral.is_finite() {
            return 0.0;
        }
        gaussian(lateral, 0.0, self.lateral_straggle_at(depth, params))
    }
}

/// Uniform dose between two depths, uniform weight inside a lateral cutoff.
///
/// Parameter keys: `depth_min`, `depth_max`, `lateral_cutoff`, `dose`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxImplant {
    pub depth_min: f64,
    pub depth_max: f64,
    pub lateral_cutoff: f64,
    pub dose: f64,
}

impl BoxImplant {
    pub fn new(depth_min: f64, depth_max: f64) -> Self {
        Self {
            depth_min,
            depth_max,
            ..Default::default()
        }
    }
}

impl Default for BoxImplant {
    fn default() -> Self {
        Self {
            depth_min: 0.0,
            depth_max: 1.0,
            lateral_cutoff: f64::INFINITY,
            dose: DEFAULT_DOSE,
        }
    }
}

impl ImplantModel for BoxImplant {
    fn depth_profile(&self, depth: f64, params: &ModelParameters) -> f64 {
        let lo = params.get_or("depth_min", self.depth_min);
        let hi = params.get_or("depth_max", self.depth_max);
        if depth >= lo && depth <= hi {
            params.get_or("dose", self.dose)
        } else {
            0.0
        }
    }

    fn lateral_profile(&self, lateral: f64, _depth: f64, params: &ModelParameters) -> f64 {
        let cutoff = params.get_or("lateral_cutoff", self.lateral_cutoff);
        if lateral.abs() <= cutoff {
            1.0
        } else {
            0.0
        }
    }
}

/// Model assembled from two closures.
pub struct FnImplant<D, L>
where
    D: Fn(f64, &ModelParameters) -> f64 + Send + Sync,
    L: Fn(f64, f64, &ModelParameters) -> f64 + Send + Sync,
{
    pub depth: D,
    pub lateral: L,
}

impl<D, L> ImplantModel for FnImplant<D, L>
where
    D: Fn(f64, &ModelParameters) -> f64 + Send + Sync,
    L: Fn(f64, f64, &ModelParameters) -> f64 + Send + Sync,
{
    fn depth_profile(&self, depth: f64, params: &ModelParameters) -> f64 {
        (self.depth)(depth, params)
    }

    fn lateral_profile(&self, lateral: f64, depth: f64, params: &ModelParameters) -> f64 {
        (self.lateral)(lateral, depth, params)
    }
}
