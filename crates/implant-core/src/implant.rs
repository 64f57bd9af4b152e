// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Implant
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Apply an implant model to a cell set.
//!
//! `Implant` holds the beam configuration and the profile model. Each call
//! borrows the cell set, traces every beam column and accumulates the dose
//! into the concentration field. Nothing is kept between calls.

use std::sync::Arc;

use implant_types::config::{ImplantConfig, ModelParameters};
use implant_types::error::{ImplantError, ImplantResult};
use implant_types::state::ImplantSummary;
use rayon::prelude::*;

use crate::cell_set::CellGrid;
use crate::model::ImplantModel;
use crate::traversal::{trace_column, trace_column_into, BeamGeometry, ColumnTrace};

/// Columns traced per worker thread between two reduction passes.
const COLUMNS_PER_THREAD: usize = 8;

/// Raster lookups one parallel batch may hold in flight, summed over its
/// columns' full windows.
const PENDING_LOOKUP_BUDGET: usize = 1 << 20;

/// Beam tracer and dose accumulator.
#[derive(Clone, Default)]
pub struct Implant {
    model: Option<Arc<dyn ImplantModel>>,
    config: ImplantConfig,
}

impl std::fmt::Debug for Implant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Implant")
            .field("has_model", &self.model.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl Implant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model<M: ImplantModel + 'static>(model: M, config: ImplantConfig) -> Self {
        Implant {
            model: Some(Arc::new(model)),
            config,
        }
    }

    pub fn set_model(&mut self, model: Arc<dyn ImplantModel>) {
        self.model = Some(model);
    }

    pub fn set_config(&mut self, config: ImplantConfig) {
        self.config = config;
    }

    pub fn set_angle(&mut self, angle_deg: f64) {
        self.config.angle_deg = angle_deg;
    }

    pub fn set_parameters(&mut self, parameters: ModelParameters) {
        self.config.parameters = parameters;
    }

    pub fn set_mask_materials(&mut self, mask_materials: &[i32]) {
        self.config.mask_materials = mask_materials.to_vec();
    }

    pub fn config(&self) -> &ImplantConfig {
        &self.config
    }

    /// Trace all columns sequentially.
    ///
    /// Configuration errors (missing model or cell set, bad angle, bad
    /// spacing) are logged as warnings and leave the cell set untouched.
    pub fn apply<G: CellGrid + ?Sized>(&self, cell_set: Option<&mut G>) -> ImplantSummary {
        self.try_apply(cell_set).unwrap_or_else(|e| {
            log::warn!("{e}");
            ImplantSummary::skipped()
        })
    }

    /// [`Implant::apply`] with the configuration error returned instead of
    /// logged.
    pub fn try_apply<G: CellGrid + ?Sized>(
        &self,
        cell_set: Option<&mut G>,
    ) -> ImplantResult<ImplantSummary> {
        let (model, cell_set, geometry) = self.prepare(cell_set)?;
        let params = &self.config.parameters;

        let mut summary = ImplantSummary::default();
        let mut trace = ColumnTrace::new(0);
        for column in 0..geometry.cells_x {
            trace_column_into(&*cell_set, &geometry, column, model, params, &mut trace);
            accumulate(cell_set, &trace, &mut summary);
        }
        Ok(summary)
    }

    /// Trace columns on the rayon pool.
    ///
    /// Raster windows of neighbouring columns overlap, so columns only
    /// produce deposit lists in parallel; the lists are then applied in
    /// column order. The result is bit-identical to [`Implant::apply`].
    pub fn apply_parallel<G: CellGrid + Sync + ?Sized>(
        &self,
        cell_set: Option<&mut G>,
    ) -> ImplantSummary {
        self.try_apply_parallel(cell_set).unwrap_or_else(|e| {
            log::warn!("{e}");
            ImplantSummary::skipped()
        })
    }

    pub fn try_apply_parallel<G: CellGrid + Sync + ?Sized>(
        &self,
        cell_set: Option<&mut G>,
    ) -> ImplantResult<ImplantSummary> {
        let (model, cell_set, geometry) = self.prepare(cell_set)?;
        let params = &self.config.parameters;

        let batch = parallel_batch(rayon::current_num_threads(), &geometry);
        let mut summary = ImplantSummary::default();
        let mut start = 0;
        while start < geometry.cells_x {
            let end = (start + batch).min(geometry.cells_x);
            let grid: &G = cell_set;
            let traces: Vec<ColumnTrace> = (start..end)
                .into_par_iter()
                .map(|column| trace_column(grid, &geometry, column, model, params))
                .collect();
            for trace in &traces {
                accumulate(cell_set, trace, &mut summary);
            }
            start = end;
        }
        Ok(summary)
    }

    /// Validate inputs and compute the per-call beam geometry.
    fn prepare<'g, G: CellGrid + ?Sized>(
        &self,
        cell_set: Option<&'g mut G>,
    ) -> ImplantResult<(&dyn ImplantModel, &'g mut G, BeamGeometry)> {
        let model = self
            .model
            .as_deref()
            .ok_or(ImplantError::MissingInput("implant model"))?;
        let cell_set = cell_set.ok_or(ImplantError::MissingInput("cell set"))?;
        self.config.validate()?;

        let geometry = BeamGeometry::new(
            &cell_set.bounding_box(),
            cell_set.grid_delta(),
            self.config.angle_deg,
        )?;
        log::info!(
            "implant: x_length={}, y_length={}, x_cells={}, y_cells={}, angle={}°",
            geometry.x_length,
            geometry.y_length,
            geometry.cells_x,
            geometry.cells_y,
            self.config.angle_deg
        );
        if !self.config.mask_materials.is_empty() {
            log::debug!(
                "implant: mask materials {:?} (material 0 stops the beam)",
                self.config.mask_materials
            );
        }
        Ok((model, cell_set, geometry))
    }
}

/// Columns per parallel batch: at least one per thread, at most
/// `COLUMNS_PER_THREAD` per thread, and fewer when the raster windows are
/// large enough to exceed `PENDING_LOOKUP_BUDGET`.
fn parallel_batch(threads: usize, geometry: &BeamGeometry) -> usize {
    let threads = threads.max(1);
    let window = (geometry.cells_y + 2)
        .saturating_mul(geometry.cells_x + 1)
        .max(1);
    (PENDING_LOOKUP_BUDGET / window).clamp(threads, threads.saturating_mul(COLUMNS_PER_THREAD))
}

/// Apply one column's deposits to the concentration field.
fn accumulate<G: CellGrid + ?Sized>(
    cell_set: &mut G,
    trace: &ColumnTrace,
    summary: &mut ImplantSummary,
) {
    let mut column = ImplantSummary::default();
    column.record_outcome(trace.outcome);
    column.index_misses = trace.index_misses;

    let mut concentration = cell_set.concentration_mut();
    for deposit in &trace.deposits {
        match concentration.get_mut(deposit.index) {
            Some(c) => {
                *c += deposit.dose;
                column.deposits += 1;
                column.total_dose += deposit.dose;
            }
            None => {
                log::debug!(
                    "column {}: cell index {} outside the concentration field",
                    trace.column,
                    deposit.index
                );
                column.index_misses += 1;
            }
        }
    }
    summary.merge(&column);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell_set::DenseCellSet;
    use crate::model::{BoxImplant, GaussianImplant};
    use implant_types::state::{BoundingBox, MaterialId};

    fn slab() -> DenseCellSet {
        DenseCellSet::filled(BoundingBox::planar(-1.0, 1.0, 0.0, 2.0), 0.2, 2, MaterialId(1))
            .unwrap()
    }

    fn box_implant(angle_deg: f64) -> Implant {
        Implant::with_model(
            BoxImplant::new(0.0, 1.0),
            ImplantConfig::new(angle_deg, ModelParameters::new()),
        )
    }

    #[test]
    fn test_missing_model_is_noop() {
        let mut cells = slab();
        let implant = Implant::new();
        let summary = implant.apply(Some(&mut cells));
        assert!(summary.skipped);
        assert_eq!(cells.total_concentration(), 0.0);
        assert!(matches!(
            implant.try_apply(Some(&mut cells)),
            Err(ImplantError::MissingInput("implant model"))
        ));
    }

    #[test]
    fn test_missing_cell_set_is_noop() {
        let implant = box_implant(0.0);
        let summary = implant.apply::<DenseCellSet>(None);
        assert!(summary.skipped);
        assert_eq!(summary.columns, 0);
        assert!(matches!(
            implant.try_apply::<DenseCellSet>(None),
            Err(ImplantError::MissingInput("cell set"))
        ));
        assert!(implant.apply_parallel::<DenseCellSet>(None).skipped);
    }

    #[test]
    fn test_invalid_angle_is_noop() {
        let mut cells = slab();
        let implant = box_implant(f64::NAN);
        let summary = implant.apply(Some(&mut cells));
        assert!(summary.skipped);
        assert_eq!(cells.total_concentration(), 0.0);
    }

    #[test]
    fn test_box_profile_scenario() {
        let mut cells = slab();
        let summary = box_implant(0.0).apply(Some(&mut cells));

        // The last column starts on the open upper face x = W/2 and never
        // finds a cell; the other nine all enter at the top row.
        assert_eq!(summary.columns, 10);
        assert_eq!(summary.deposited_columns, 9);
        assert_eq!(summary.out_of_domain_columns, 1);
        assert_eq!(summary.blocked_columns, 0);

        let conc = cells.concentration();
        for index in 0..cells.number_of_cells() {
            let center = cells.cell_center(index).unwrap();
            let depth_from_top = 1.8 - (center[1] - 0.1);
            let expected = if depth_from_top <= 1.0 + 1e-9 { 9.0 } else { 0.0 };
            assert!(
                (conc[index] - expected).abs() < 1e-12,
                "cell at {:?}: {} != {expected}",
                center,
                conc[index]
            );
        }
        assert!((summary.total_dose - 9.0 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_vacuum_surface_deposits_nothing() {
        let mut cells = DenseCellSet::stacked_layers(
            BoundingBox::planar(-1.0, 1.0, 0.0, 2.0),
            0.2,
            2,
            &[(1.0, MaterialId(1)), (2.0, MaterialId::VACUUM)],
        )
        .unwrap();
        let summary = box_implant(0.0).apply(Some(&mut cells));
        assert_eq!(summary.blocked_columns, 9);
        assert_eq!(summary.deposited_columns, 0);
        assert_eq!(summary.deposits, 0);
        assert_eq!(cells.total_concentration(), 0.0);
    }

    #[test]
    fn test_trench_surface_finds_lower_entry() {
        // surface at y = 1.0 with nothing above it
        let mut cells = DenseCellSet::stacked_layers(
            BoundingBox::planar(-1.0, 1.0, 0.0, 2.0),
            0.2,
            2,
            &[(1.0, MaterialId(1))],
        )
        .unwrap();
        let summary = box_implant(0.0).apply(Some(&mut cells));
        assert_eq!(summary.deposited_columns, 9);

        let conc = cells.concentration();
        for index in 0..cells.number_of_cells() {
            let center = cells.cell_center(index).unwrap();
            // every active cell lies within 1.0 of the y = 1.0 surface
            assert!(conc[index] > 0.0, "cell at {center:?} received no dose");
        }
    }

    #[test]
    fn test_repeated_apply_is_monotone() {
        let mut cells = slab();
        let implant = Implant::with_model(
            GaussianImplant::default(),
            ImplantConfig::new(15.0, ModelParameters::new()),
        );
        implant.apply(Some(&mut cells));
        let first = cells.concentration().to_owned();
        implant.apply(Some(&mut cells));
        for (a, b) in first.iter().zip(cells.concentration().iter()) {
            assert!(b >= a, "concentration decreased: {a} -> {b}");
            assert!(*b >= 0.0);
        }
        assert!(cells.total_concentration() > 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let implant = Implant::with_model(
            GaussianImplant::default(),
            ImplantConfig::new(
                -20.0,
                ModelParameters::new().with("lateral_growth", 0.5),
            ),
        );
        let mut seq = slab();
        let mut par = slab();
        let s1 = implant.apply(Some(&mut seq));
        let s2 = implant.apply_parallel(Some(&mut par));
        assert_eq!(s1, s2);
        for (a, b) in seq.concentration().iter().zip(par.concentration().iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_setters_update_config() {
        let mut implant = Implant::new();
        implant.set_model(Arc::new(BoxImplant::default()));
        implant.set_angle(30.0);
        implant.set_parameters(ModelParameters::new().with("dose", 2.0));
        implant.set_mask_materials(&[0, 3]);
        assert_eq!(implant.config().angle_deg, 30.0);
        assert_eq!(implant.config().parameters.get("dose"), Some(2.0));
        assert_eq!(implant.config().mask_materials, vec![0, 3]);

        let mut cells = slab();
        let summary = implant.apply(Some(&mut cells));
        assert!(!summary.skipped);
        assert!(summary.deposits > 0);
    }

    #[test]
    fn test_three_dimensional_slab_uses_midplane_layer() {
        // midplane z = 0 sits on the face between layers 1 and 2
        let bb = BoundingBox::new([-1.0, 0.0, -0.5], [1.0, 2.0, 0.5]);
        let mut cells = DenseCellSet::filled(bb, 0.25, 3, MaterialId(1)).unwrap();
        let implant = box_implant(0.0);
        let summary = implant.apply(Some(&mut cells));
        assert_eq!(summary.columns, 8);
        assert_eq!(summary.deposited_columns, 7);

        let conc = cells.concentration();
        for index in 0..cells.number_of_cells() {
            let c = cells.cell_center(index).unwrap();
            let in_layer = (c[2] - 0.125).abs() < 1e-12;
            // top row centre 1.875; depth band [0, 1] spans five rows
            let in_band = c[1] > 0.75;
            let expected = if in_layer && in_band { 7.0 } else { 0.0 };
            assert!(
                (conc[index] - expected).abs() < 1e-12,
                "cell at {c:?}: {} != {expected}",
                conc[index]
            );
        }
        assert!((summary.total_dose - 7.0 * 8.0 * 5.0).abs() < 1e-9);

        let mut par = DenseCellSet::filled(bb, 0.25, 3, MaterialId(1)).unwrap();
        assert_eq!(implant.apply_parallel(Some(&mut par)), summary);
        assert_eq!(par.concentration(), cells.concentration());
    }

    #[test]
    fn test_summary_counts_only_nonzero_deposits() {
        let mut cells = slab();
        let summary = box_implant(0.0).apply(Some(&mut cells));
        // nine columns, six rows of ten cells each
        assert_eq!(summary.deposits, 9 * 60);
        let nonzero = cells.concentration().iter().filter(|c| **c > 0.0).count();
        assert_eq!(nonzero, 60);
    }

    #[test]
    fn test_parallel_batch_bounds_pending_lookups() {
        let bb = BoundingBox::planar(-1.0, 1.0, 0.0, 2.0);
        let small = BeamGeometry::new(&bb, 0.2, 0.0).unwrap();
        assert_eq!(parallel_batch(4, &small), 4 * COLUMNS_PER_THREAD);
        assert_eq!(parallel_batch(0, &small), COLUMNS_PER_THREAD);

        let large = BeamGeometry::new(&bb, 2.0 / 600.0, 0.0).unwrap();
        let window = (large.cells_y + 2) * (large.cells_x + 1);
        let batch = parallel_batch(4, &large);
        assert_eq!(batch, 4);
        assert!(batch * window <= 4 * PENDING_LOOKUP_BUDGET);

        let medium = BeamGeometry::new(&bb, 2.0 / 200.0, 0.0).unwrap();
        let window = (medium.cells_y + 2) * (medium.cells_x + 1);
        let batch = parallel_batch(4, &medium);
        assert!(batch >= 4 && batch < 4 * COLUMNS_PER_THREAD);
        assert!(batch * window <= PENDING_LOOKUP_BUDGET);
    }

    #[test]
    fn test_mask_materials_do_not_change_result() {
        let mut plain = slab();
        let mut masked = slab();
        let implant = box_implant(10.0);
        let mut with_mask = implant.clone();
        with_mask.set_mask_materials(&[1]);
        implant.apply(Some(&mut plain));
        with_mask.apply(Some(&mut masked));
        assert_eq!(plain.concentration(), masked.concentration());
    }
}
