//! Upscaling of fracture hydraulic properties onto grid cells.
//!
//! A fracture crossing a cell is treated as a slab of thickness `b` (aperture)
//! spanning the cell normal to the fracture's dominant axis. With the
//! stair-step correction the contribution is reduced by the ratio between the
//! cell thickness along that axis and the projected thickness
//! `|n_x| dx + |n_y| dy + |n_z| dz`, which is how many more cells an inclined
//! plane occupies than an axis-aligned one of the same area.

use std::collections::HashMap;

use log::info;
use rayon::prelude::*;

use crate::Vector;
use crate::ecpm::domain::{CellSize, Grid};
use crate::ecpm::tag::CellFractureMap;
use crate::ecpm::tensor::PermTensor;
use crate::error::{MapDfnError, Result};
use crate::network::ResolvedFracture;

/// Bulk properties of the rock matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixProperties {
    /// Porosity, in `(0, 1]`.
    pub porosity: f64,
    /// Isotropic permeability (m^2), positive.
    pub permeability: f64,
}

impl MatrixProperties {
    pub fn new(porosity: f64, permeability: f64) -> Result<Self> {
        if !(porosity.is_finite() && porosity > 0. && porosity <= 1.) {
            return Err(MapDfnError::config(format!(
                "matrix porosity must be in (0, 1], got {porosity}"
            )));
        }
        if !(permeability.is_finite() && permeability > 0.) {
            return Err(MapDfnError::config(format!(
                "matrix permeability must be positive, got {permeability}"
            )));
        }
        Ok(Self {
            porosity,
            permeability,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscaleOptions {
    /// Fold off-diagonal tensor terms into the diagonal.
    pub lump_diag_terms: bool,
    /// Apply the stair-step correction to fracture contributions.
    pub correction_factor: bool,
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self {
            lump_diag_terms: false,
            correction_factor: true,
        }
    }
}

/// Upscaled properties of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellProperties {
    pub porosity: f64,
    pub k_iso: f64,
    pub k_aniso: PermTensor,
    /// True if at least one fracture intersects the cell.
    pub fractured: bool,
}

/// Per-cell fields, indexed like the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct UpscaledFields {
    pub porosity: Vec<f64>,
    pub k_iso: Vec<f64>,
    pub k_aniso: Vec<PermTensor>,
    fractured: Vec<bool>,
}

impl UpscaledFields {
    pub fn num_cells(&self) -> usize {
        self.porosity.len()
    }

    pub fn cell(&self, idx: usize) -> CellProperties {
        CellProperties {
            porosity: self.porosity[idx],
            k_iso: self.k_iso[idx],
            k_aniso: self.k_aniso[idx],
            fractured: self.fractured[idx],
        }
    }

    pub fn is_fractured(&self, idx: usize) -> bool {
        self.fractured[idx]
    }
}

/// Contribution of one fracture to any cell it crosses.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    porosity: f64,
    k_iso: f64,
    k_aniso: PermTensor,
}

/// Stair-step correction factor for a plane with unit normal `normal`.
///
/// Equals 1 for planes normal to a coordinate axis and decreases as the
/// plane tilts (down to 1/3 for a cube cell and a (1,1,1) normal).
pub fn stair_step_factor(normal: Vector, cell: &CellSize) -> f64 {
    let d_n = cell.get(normal.dominant_axis());
    let projected =
        normal.dx.abs() * cell.dx + normal.dy.abs() * cell.dy + normal.dz.abs() * cell.dz;
    d_n / projected
}

fn contribution(f: &ResolvedFracture, cell: &CellSize, correction_factor: bool) -> Contribution {
    let d_n = cell.get(f.normal.dominant_axis());
    let c = if correction_factor {
        stair_step_factor(f.normal, cell)
    } else {
        1.
    };
    let k = c * f.transmissivity / d_n;
    Contribution {
        porosity: c * f.aperture / d_n,
        k_iso: k,
        k_aniso: PermTensor::in_plane(f.normal, k),
    }
}

/// Computes porosity and permeability for every cell.
///
/// Cells without fractures take the matrix values exactly. Fractured cells sum
/// the contributions of every fracture listed for them in `map`.
///
/// The matrix permeability is not added to fractured cells. Each fracture adds
/// `k (I - n n^T)`, so the tensor has no component along the normal of its
/// fractures: a cell holding only a horizontal fracture has `zz == 0`, and
/// lumping does not change that for axis-aligned fractures. Solvers that need
/// a positive definite tensor must floor it themselves.
pub fn upscale(
    grid: &Grid,
    map: &CellFractureMap,
    fractures: &[ResolvedFracture],
    matrix: &MatrixProperties,
    options: &UpscaleOptions,
) -> Result<UpscaledFields> {
    let num_cells = grid.num_cells();
    if map.num_cells() != num_cells {
        return Err(MapDfnError::config(format!(
            "cell map has {} cells, grid has {num_cells}",
            map.num_cells()
        )));
    }

    let contributions: HashMap<u32, Contribution> = fractures
        .iter()
        .map(|f| (f.id, contribution(f, &grid.cell_size, options.correction_factor)))
        .collect();
    if let Some(id) = map
        .iter()
        .flatten()
        .find(|id| !contributions.contains_key(id))
    {
        return Err(MapDfnError::config(format!(
            "cell map references unknown fracture {id}"
        )));
    }

    info!(
        lump_diag_terms = options.lump_diag_terms,
        correction_factor = options.correction_factor;
        "Upscaling fracture properties"
    );

    let mut porosity = vec![matrix.porosity; num_cells];
    let mut k_iso = vec![matrix.permeability; num_cells];
    let mut k_aniso = vec![PermTensor::isotropic(matrix.permeability); num_cells];
    let mut fractured = vec![false; num_cells];

    porosity
        .par_iter_mut()
        .zip(k_iso.par_iter_mut())
        .zip(k_aniso.par_iter_mut())
        .zip(fractured.par_iter_mut())
        .enumerate()
        .for_each(|(idx, (((phi, k), tensor), is_fractured))| {
            let ids = map.fractures_in(idx);
            if ids.is_empty() {
                return;
            }
            let mut sum_phi = 0.;
            let mut sum_k = 0.;
            let mut sum_tensor = PermTensor::ZERO;
            for id in ids {
                let c = &contributions[id];
                sum_phi += c.porosity;
                sum_k += c.k_iso;
                sum_tensor += c.k_aniso;
            }
            *phi = sum_phi.min(1.);
            *k = sum_k;
            *tensor = if options.lump_diag_terms {
                sum_tensor.lumped()
            } else {
                sum_tensor
            };
            *is_fractured = true;
        });

    Ok(UpscaledFields {
        porosity,
        k_iso,
        k_aniso,
        fractured,
    })
}
