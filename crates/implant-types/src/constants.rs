// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Snap tolerance for coordinate → cell lookups, in cell widths.
/// Lattice-aligned points reached by repeated `x -= δ` stepping land a few
/// ULPs below the cell face they sit on; this pulls them back onto it.
pub const CELL_SNAP_TOLERANCE: f64 = 1e-6;

/// Smallest straggle [length units] a profile model will divide by.
pub const MIN_STRAGGLE: f64 = 1e-12;

/// Default projected range Rp for the Gaussian model.
pub const DEFAULT_PROJECTED_RANGE: f64 = 0.5;

/// Default depth straggle ΔRp for the Gaussian model.
pub const DEFAULT_DEPTH_STRAGGLE: f64 = 0.15;

/// Default lateral straggle ΔRl for the Gaussian model.
pub const DEFAULT_LATERAL_STRAGGLE: f64 = 0.1;

/// Default implanted dose (areal, arbitrary units).
pub const DEFAULT_DOSE: f64 = 1.0;
