// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Cell Set
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Dense cell sets: the grid the implant tracer walks over.
//!
//! A cell set is a uniform lattice over a bounding box in which only the
//! active sites carry a cell index. Inactive sites are gaps; a lookup that
//! lands in a gap or outside the box returns `None`.

use implant_types::constants::CELL_SNAP_TOLERANCE;
use implant_types::error::{ImplantError, ImplantResult};
use implant_types::state::{BoundingBox, MaterialId};
use ndarray::{Array1, ArrayView1, ArrayViewMut1};

/// Grid access needed by the implant tracer.
///
/// Implementations own their storage; the tracer only borrows it for the
/// duration of one call.
pub trait CellGrid {
    fn bounding_box(&self) -> BoundingBox;

    /// Isotropic cell spacing δ.
    fn grid_delta(&self) -> f64;

    /// Cell covering `coords`, or `None` outside the domain or in a gap.
    /// Must not panic for any input, including non-finite coordinates.
    fn index_of(&self, coords: [f64; 3]) -> Option<usize>;

    /// Material id per cell index.
    fn material(&self) -> ArrayView1<'_, MaterialId>;

    /// Concentration per cell index.
    fn concentration_mut(&mut self) -> ArrayViewMut1<'_, f64>;
}

/// Upper bound on lattice sites; the site table must fit one allocation.
const MAX_LATTICE_SITES: usize = isize::MAX as usize / std::mem::size_of::<Option<usize>>();

/// Number of whole cells of width `delta` in `extent`.
pub(crate) fn axis_cells(extent: f64, delta: f64) -> usize {
    (extent / delta + CELL_SNAP_TOLERANCE).floor().max(0.0) as usize
}

/// Uniform 2D or 3D cell set with per-cell material and concentration.
#[derive(Debug, Clone)]
pub struct DenseCellSet {
    bounds: BoundingBox,
    delta: f64,
    dimension: usize,
    cells_per_axis: [usize; 3],
    /// Lattice site → cell index.
    lattice: Vec<Option<usize>>,
    /// Cell index → lattice site.
    sites: Vec<usize>,
    material: Array1<MaterialId>,
    concentration: Array1<f64>,
}

impl DenseCellSet {
    /// Every lattice site active, all vacuum.
    pub fn new(bounds: BoundingBox, delta: f64, dimension: usize) -> ImplantResult<Self> {
        Self::filled(bounds, delta, dimension, MaterialId::VACUUM)
    }

    /// Every lattice site active with the same material.
    pub fn filled(
        bounds: BoundingBox,
        delta: f64,
        dimension: usize,
        material: MaterialId,
    ) -> ImplantResult<Self> {
        Self::from_fn(bounds, delta, dimension, |_| Some(material))
    }

    /// Build from a classifier evaluated at each lattice cell centre.
    /// `Some(material)` activates the cell, `None` leaves a gap.
    pub fn from_fn<F>(
        bounds: BoundingBox,
        delta: f64,
        dimension: usize,
        mut classify: F,
    ) -> ImplantResult<Self>
    where
        F: FnMut([f64; 3]) -> Option<MaterialId>,
    {
        let (bounds, cells_per_axis) = validate_lattice(bounds, delta, dimension)?;
        let [nx, ny, nz] = cells_per_axis;

        let mut lattice = vec![None; nx * ny * nz];
        let mut sites = Vec::new();
        let mut materials = Vec::new();
        for iz in 0..nz {
            for iy in 0..ny {
                for ix in 0..nx {
                    let center = site_center(&bounds, delta, dimension, [ix, iy, iz]);
                    if let Some(material) = classify(center) {
                        let site = (iz * ny + iy) * nx + ix;
                        lattice[site] = Some(sites.len());
                        sites.push(site);
                        materials.push(material);
                    }
                }
            }
        }

        let n_cells = sites.len();
        Ok(DenseCellSet {
            bounds,
            delta,
            dimension,
            cells_per_axis,
            lattice,
            sites,
            material: Array1::from_vec(materials),
            concentration: Array1::zeros(n_cells),
        })
    }

    /// Planar material layers stacked along the depth axis.
    ///
    /// Each `(top, material)` fills from the previous layer's top (or the
    /// domain floor) up to `top`. Sites above the highest layer are gaps.
    pub fn stacked_layers(
        bounds: BoundingBox,
        delta: f64,
        dimension: usize,
        layers: &[(f64, MaterialId)],
    ) -> ImplantResult<Self> {
        if layers.iter().any(|(top, _)| !top.is_finite()) {
            return Err(ImplantError::ConfigError(
                "layer tops must be finite".to_string(),
            ));
        }
        let mut sorted = layers.to_vec();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self::from_fn(bounds, delta, dimension, |center| {
            sorted
                .iter()
                .find(|(top, _)| center[1] < *top)
                .map(|&(_, material)| material)
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn cells_per_axis(&self) -> [usize; 3] {
        self.cells_per_axis
    }

    /// Active cells.
    pub fn number_of_cells(&self) -> usize {
        self.sites.len()
    }

    pub fn concentration(&self) -> ArrayView1<'_, f64> {
        self.concentration.view()
    }

    pub fn total_concentration(&self) -> f64 {
        self.concentration.sum()
    }

    pub fn reset_concentration(&mut self) {
        self.concentration.fill(0.0);
    }

    pub fn set_material(&mut self, index: usize, material: MaterialId) -> ImplantResult<()> {
        let cells = self.number_of_cells();
        let slot = self
            .material
            .get_mut(index)
            .ok_or(ImplantError::CellOutOfBounds { index, cells })?;
        *slot = material;
        Ok(())
    }

    /// Centre of an active cell.
    pub fn cell_center(&self, index: usize) -> Option<[f64; 3]> {
        let site = *self.sites.get(index)?;
        let [nx, ny, _] = self.cells_per_axis;
        let ix = site % nx;
        let iy = (site / nx) % ny;
        let iz = site / (nx * ny);
        Some(site_center(&self.bounds, self.delta, self.dimension, [ix, iy, iz]))
    }

    fn lattice_coord(&self, value: f64, axis: usize) -> Option<usize> {
        if !value.is_finite() {
            return None;
        }
        let f = (value - self.bounds.min[axis]) / self.delta + CELL_SNAP_TOLERANCE;
        if f < 0.0 {
            return None;
        }
        let i = f.floor() as usize;
        (i < self.cells_per_axis[axis]).then_some(i)
    }
}

impl CellGrid for DenseCellSet {
    fn bounding_box(&self) -> BoundingBox {
        self.bounds
    }

    fn grid_delta(&self) -> f64 {
        self.delta
    }

    fn index_of(&self, coords: [f64; 3]) -> Option<usize> {
        let ix = self.lattice_coord(coords[0], 0)?;
        let iy = self.lattice_coord(coords[1], 1)?;
        let iz = if self.dimension == 3 {
            self.lattice_coord(coords[2], 2)?
        } else {
            0
        };
        let [nx, ny, _] = self.cells_per_axis;
        self.lattice[(iz * ny + iy) * nx + ix]
    }

    fn material(&self) -> ArrayView1<'_, MaterialId> {
        self.material.view()
    }

    fn concentration_mut(&mut self) -> ArrayViewMut1<'_, f64> {
        self.concentration.view_mut()
    }
}

/// Normalize the box and count cells per axis. 2D sets get a single layer
/// along the third axis.
fn validate_lattice(
    bounds: BoundingBox,
    delta: f64,
    dimension: usize,
) -> ImplantResult<(BoundingBox, [usize; 3])> {
    if dimension != 2 && dimension != 3 {
        return Err(ImplantError::ConfigError(format!(
            "cell set dimension must be 2 or 3, got {dimension}"
        )));
    }
    if !delta.is_finite() || delta <= 0.0 {
        return Err(ImplantError::ConfigError(format!(
            "grid delta must be finite and > 0, got {delta}"
        )));
    }
    let mut normalized = bounds;
    let mut cells = [1usize; 3];
    for axis in 0..dimension {
        let (a, b) = (bounds.min[axis], bounds.max[axis]);
        if !a.is_finite() || !b.is_finite() {
            return Err(ImplantError::ConfigError(format!(
                "bounding box axis {axis} must be finite, got [{a}, {b}]"
            )));
        }
        normalized.min[axis] = a.min(b);
        normalized.max[axis] = a.max(b);
        cells[axis] = axis_cells(normalized.extent(axis), delta);
        if cells[axis] == 0 {
            return Err(ImplantError::ConfigError(format!(
                "bounding box axis {axis} is narrower than one cell (extent={}, delta={delta})",
                normalized.extent(axis)
            )));
        }
    }
    let sites = cells.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n));
    if !sites.is_some_and(|n| n <= MAX_LATTICE_SITES) {
        return Err(ImplantError::ConfigError(format!(
            "lattice of {cells:?} sites is too large (delta={delta})"
        )));
    }
    Ok((normalized, cells))
}

fn site_center(bounds: &BoundingBox, delta: f64, dimension: usize, site: [usize; 3]) -> [f64; 3] {
    let mut center = [0.0; 3];
    for axis in 0..3 {
        center[axis] = if axis < dimension {
            bounds.min[axis] + (site[axis] as f64 + 0.5) * delta
        } else {
            0.5 * (bounds.min[axis] + bounds.max[axis])
        };
    }
    center
}
