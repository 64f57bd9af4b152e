// ─────────────────────────────────────────────────────────────────────
// SCPN Implant — Implant Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Ion implantation dose engine on dense cell sets.
//!
//! Cell sets, profile models, column-wise beam traversal and the `Implant`
//! driver that accumulates dose into the concentration field.

pub mod cell_set;
pub mod implant;
pub mod model;
pub mod traversal;

