// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

/// Integer material tag carried by every cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub i32);

impl MaterialId {
    /// Vacuum / mask. The beam stops on it and deposits nothing.
    pub const VACUUM: MaterialId = MaterialId(0);

    pub fn is_vacuum(self) -> bool {
        self == Self::VACUUM
    }

    pub fn is_solid(self) -> bool {
        !self.is_vacuum()
    }
}

impl From<i32> for MaterialId {
    fn from(id: i32) -> Self {
        MaterialId(id)
    }
}

/// Axis-aligned domain box. Axis 0 is lateral, axis 1 is depth, axis 2 is
/// only meaningful for 3D cell sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        BoundingBox { min, max }
    }

    /// 2D box; the third axis collapses to zero.
    pub fn planar(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        BoundingBox {
            min: [x_min, y_min, 0.0],
            max: [x_max, y_max, 0.0],
        }
    }

    /// |max − min| along `axis`.
    pub fn extent(&self, axis: usize) -> f64 {
        (self.max[axis] - self.min[axis]).abs()
    }
}

/// Terminal state of one beam column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnOutcome {
    /// Entry point found in solid material; dose was rastered from it.
    Deposited,
    /// Entry search reached a vacuum cell and stopped there.
    Blocked,
    /// Entry search left the domain without finding any cell.
    OutOfDomain,
}

/// Diagnostic counters for one implant call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImplantSummary {
    /// Beam columns traced.
    pub columns: usize,
    pub deposited_columns: usize,
    pub blocked_columns: usize,
    pub out_of_domain_columns: usize,
    /// Non-zero `+=` updates applied to the concentration field.
    pub deposits: usize,
    /// Raster lookups that fell outside every cell.
    pub index_misses: usize,
    /// Sum of all deposited contributions.
    pub total_dose: f64,
    /// True when the call was a no-op because of a configuration error.
    pub skipped: bool,
}

impl ImplantSummary {
    pub fn skipped() -> Self {
        ImplantSummary {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn record_outcome(&mut self, outcome: ColumnOutcome) {
        self.columns += 1;
        match outcome {
            ColumnOutcome::Deposited => self.deposited_columns += 1,
            ColumnOutcome::Blocked => self.blocked_columns += 1,
            ColumnOutcome::OutOfDomain => self.out_of_domain_columns += 1,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &ImplantSummary) {
        self.columns += other.columns;
        self.deposited_columns += other.deposited_columns;
        self.blocked_columns += other.blocked_columns;
        self.out_of_domain_columns += other.out_of_domain_columns;
        self.deposits += other.deposits;
        self.index_misses += other.index_misses;
        self.total_dose += other.total_dose;
        self.skipped |= other.skipped;
    }
}
