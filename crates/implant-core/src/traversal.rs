// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Beam Traversal
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Column-wise beam traversal: entry search and raster deposition.
//!
//! The lateral axis is split into `N_x = ⌊W/δ⌋` beam columns. Column `i`
//! starts at the top surface, x₀ = i·δ − W/2 + δ, y₀ = H − δ, and walks
//! back along the beam (y −= δ·cos θ, x −= δ·sin θ) until it finds a cell.
//! A solid cell is the entry point; from there a window of
//! (scan_depth + 2) × (N_x + 1) lattice points is rastered and each hit is
//! projected into beam coordinates:
//!   depth   = cos θ · y + sin θ · (x₀ − x)
//!   lateral = |cos θ · (x₀ − x) − sin θ · y|
//!
//! The window is heuristic. It can miss cells under the beam and visit cells
//! off the beam, and columns never shadow each other.

use implant_types::config::ModelParameters;
use implant_types::error::{ImplantError, ImplantResult};
use implant_types::state::{BoundingBox, ColumnOutcome, MaterialId};
use ndarray::ArrayView1;

use crate::cell_set::{axis_cells, CellGrid};
use crate::model::ImplantModel;

/// Per-call beam geometry, computed once from the grid and the angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamGeometry {
    /// δ
    pub delta: f64,
    /// W, lateral extent.
    pub x_length: f64,
    /// H, depth extent.
    pub y_length: f64,
    /// N_x
    pub cells_x: usize,
    /// N_y, the initial scan-depth budget of every column.
    pub cells_y: usize,
    pub cos_theta: f64,
    pub sin_theta: f64,
    /// Out-of-plane coordinate the beam travels in (3D cell sets).
    pub z_plane: f64,
}

impl BeamGeometry {
    pub fn new(bounds: &BoundingBox, delta: f64, angle_deg: f64) -> ImplantResult<Self> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(ImplantError::ConfigError(format!(
                "grid delta must be finite and > 0, got {delta}"
            )));
        }
        if !angle_deg.is_finite() {
            return Err(ImplantError::ConfigError(format!(
                "implant angle must be finite, got {angle_deg}"
            )));
        }
        let x_length = bounds.extent(0);
        let y_length = bounds.extent(1);
        if !x_length.is_finite() || !y_length.is_finite() {
            return Err(ImplantError::ConfigError(
                "bounding box extents must be finite".to_string(),
            ));
        }
        let radians = angle_deg.to_radians();
        Ok(BeamGeometry {
            delta,
            x_length,
            y_length,
            cells_x: axis_cells(x_length, delta),
            cells_y: axis_cells(y_length, delta),
            cos_theta: radians.cos(),
            sin_theta: radians.sin(),
            z_plane: 0.5 * (bounds.min[2] + bounds.max[2]),
        })
    }

    /// Top-surface start of beam column `column`.
    pub fn column_origin(&self, column: usize) -> (f64, f64) {
        (
            column as f64 * self.delta - self.x_length / 2.0 + self.delta,
            self.y_length - self.delta,
        )
    }

    /// Beam-aligned depth of a raster point relative to the entry point.
    pub fn depth(&self, entry_x: f64, shifted_x: f64, y_cord: f64) -> f64 {
        self.cos_theta * y_cord + self.sin_theta * (entry_x - shifted_x)
    }

    /// Distance of a raster point from the beam axis.
    pub fn lateral(&self, entry_x: f64, shifted_x: f64, y_cord: f64) -> f64 {
        (self.cos_theta * (entry_x - shifted_x) - self.sin_theta * y_cord).abs()
    }

    /// One δ step back along the beam.
    fn step_back(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.delta * self.sin_theta, y - self.delta * self.cos_theta)
    }

    /// Every step moves δ, so at least one coordinate grows past its extent
    /// in a bounded number of steps.
    /// The `|x| > W` bound assumes a laterally centred box.
    fn exits_domain(&self, x: f64, y: f64) -> bool {
        y.abs() > self.y_length || x.abs() > self.x_length
    }
}

/// First solid cell on the beam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPoint {
    pub x: f64,
    pub y: f64,
    pub index: usize,
    /// Remaining depth budget, N_y minus the number of misses.
    pub scan_depth: i64,
}

/// Result of walking one column down to the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntrySearch {
    Entry(EntryPoint),
    /// The first cell found is vacuum.
    Blocked { index: usize },
    OutOfDomain,
}

/// Walk column `column` back along the beam until it hits a cell.
pub fn search_entry<G: CellGrid + ?Sized>(
    grid: &G,
    material: &ArrayView1<'_, MaterialId>,
    geometry: &BeamGeometry,
    column: usize,
) -> EntrySearch {
    let (mut x, mut y) = geometry.column_origin(column);
    let mut scan_depth = geometry.cells_y as i64;
    loop {
        match grid.index_of([x, y, geometry.z_plane]) {
            None => {
                (x, y) = geometry.step_back(x, y);
                scan_depth -= 1;
                if geometry.exits_domain(x, y) {
                    return EntrySearch::OutOfDomain;
                }
            }
            Some(index) => {
                let is_vacuum = material.get(index).map_or(true, |m| m.is_vacuum());
                return if is_vacuum {
                    EntrySearch::Blocked { index }
                } else {
                    EntrySearch::Entry(EntryPoint {
                        x,
                        y,
                        index,
                        scan_depth,
                    })
                };
            }
        }
    }
}

/// One pending `concentration[index] += dose`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deposit {
    pub index: usize,
    pub dose: f64,
}

/// Everything one column contributes, not yet applied to the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTrace {
    pub column: usize,
    pub outcome: ColumnOutcome,
    /// Non-zero contributions only.
    pub deposits: Vec<Deposit>,
    pub index_misses: usize,
}

impl ColumnTrace {
    pub fn new(column: usize) -> Self {
        ColumnTrace {
            column,
            outcome: ColumnOutcome::OutOfDomain,
            deposits: Vec::new(),
            index_misses: 0,
        }
    }
}

/// Raster the deposition window below an entry point, appending to
/// `deposits`. Returns the number of lookup misses.
///
/// Contributions that are zero, negative or non-finite are skipped, so the
/// field never decreases and only cells that change are recorded.
pub fn raster_deposit<G, M>(
    grid: &G,
    geometry: &BeamGeometry,
    entry: &EntryPoint,
    model: &M,
    params: &ModelParameters,
    deposits: &mut Vec<Deposit>,
) -> usize
where
    G: CellGrid + ?Sized,
    M: ImplantModel + ?Sized,
{
    let rows = (entry.scan_depth + 2).max(0) as usize;
    let cols = geometry.cells_x + 1;
    let half_width = geometry.x_length / 2.0;

    let mut misses = 0usize;
    for j in 0..rows {
        let y_cord = j as f64 * geometry.delta;
        let shifted_y = entry.y - y_cord;
        for k in 0..cols {
            let shifted_x = k as f64 * geometry.delta - half_width;
            let Some(index) = grid.index_of([shifted_x, shifted_y, geometry.z_plane]) else {
                misses += 1;
                log::trace!("index miss @ [{shifted_x}, {shifted_y}]");
                continue;
            };
            let depth = geometry.depth(entry.x, shifted_x, y_cord);
            let lateral = geometry.lateral(entry.x, shifted_x, y_cord);
            let dose = model.depth_profile(depth, params) * model.lateral_profile(lateral, depth, params);
            if !dose.is_finite() {
                log::debug!("dropping non-finite dose {dose} at depth={depth}, lateral={lateral}");
                continue;
            }
            if dose > 0.0 {
                deposits.push(Deposit { index, dose });
            }
        }
    }
    misses
}

/// Entry search followed by deposition for a single column, written into
/// `trace`. The deposit buffer is cleared first and its capacity reused.
pub fn trace_column_into<G, M>(
    grid: &G,
    geometry: &BeamGeometry,
    column: usize,
    model: &M,
    params: &ModelParameters,
    trace: &mut ColumnTrace,
) where
    G: CellGrid + ?Sized,
    M: ImplantModel + ?Sized,
{
    trace.column = column;
    trace.deposits.clear();
    trace.index_misses = 0;

    let material = grid.material();
    trace.outcome = match search_entry(grid, &material, geometry, column) {
        EntrySearch::Entry(entry) => {
            trace.index_misses =
                raster_deposit(grid, geometry, &entry, model, params, &mut trace.deposits);
            ColumnOutcome::Deposited
        }
        EntrySearch::Blocked { index } => {
            log::debug!("column {column}: beam stopped on vacuum cell {index}");
            ColumnOutcome::Blocked
        }
        EntrySearch::OutOfDomain => {
            log::debug!("column {column}: beam left the domain without reaching a cell");
            ColumnOutcome::OutOfDomain
        }
    };
}

/// [`trace_column_into`] with a fresh trace.
pub fn trace_column<G, M>(
    grid: &G,
    geometry: &BeamGeometry,
    column: usize,
    model: &M,
    params: &ModelParameters,
) -> ColumnTrace
where
    G: CellGrid + ?Sized,
    M: ImplantModel + ?Sized,
{
    let mut trace = ColumnTrace::new(column);
    trace_column_into(grid, geometry, column, model, params, &mut trace);
    trace
}
