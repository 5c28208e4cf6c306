//! Domain discretization into a regular hexahedral grid.
//!
//! Cells are indexed x fastest, then y, then z:
//! `index = i + nx * (j + ny * k)`. Tagging, upscaling and writing all use
//! this ordering.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::Point;
use crate::error::{MapDfnError, Result};

/// Maximum number of decimal shifts tried when aligning a cell size to an integer.
const MAX_DECIMAL_DIGITS: usize = 15;

/// Relative tolerance for "is an integer" checks on scaled values and ratios.
const DIVISIBILITY_TOL: f64 = 1e-9;

/// Axis-aligned box extents (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Domain {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Builds a domain from a 3-component slice, as given by callers.
    pub fn from_components(values: &[f64], what: &str) -> Result<Self> {
        let [x, y, z] = three_components(values, what)?;
        let domain = Self::new(x, y, z);
        domain.validate()?;
        Ok(domain)
    }

    pub fn validate(&self) -> Result<()> {
        for (axis, v) in ["x", "y", "z"].iter().zip(self.to_array()) {
            if !(v.is_finite() && v > 0.) {
                return Err(MapDfnError::config(format!(
                    "domain extent along {axis} must be positive, got {v}"
                )));
            }
        }
        Ok(())
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.to_array()[axis]
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Cell edge lengths (m), one per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSize {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl CellSize {
    pub fn new(dx: f64, dy: f64, dz: f64) -> Result<Self> {
        let size = Self { dx, dy, dz };
        for (axis, v) in ["x", "y", "z"].iter().zip(size.to_array()) {
            if !(v.is_finite() && v > 0.) {
                return Err(MapDfnError::config(format!(
                    "cell size along {axis} must be positive, got {v}"
                )));
            }
        }
        Ok(size)
    }

    pub fn uniform(d: f64) -> Result<Self> {
        Self::new(d, d, d)
    }

    /// Normalizes a scalar (1 value) or per-axis (3 values) cell size.
    pub fn from_components(values: &[f64]) -> Result<Self> {
        match values {
            [d] => Self::uniform(*d),
            [dx, dy, dz] => Self::new(*dx, *dy, *dz),
            _ => Err(MapDfnError::config(format!(
                "cell size must be a single value or a list of three values, got {} values",
                values.len()
            ))),
        }
    }

    pub fn get(&self, axis: usize) -> f64 {
        self.to_array()[axis]
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.dx, self.dy, self.dz]
    }

    pub fn volume(&self) -> f64 {
        self.dx * self.dy * self.dz
    }
}

/// Regular grid covering a domain centered at the DFN origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub cell_size: CellSize,
}

impl Grid {
    pub fn num_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.nx * (j + self.ny * k)
    }

    /// Inverse of [`Grid::index`].
    pub fn ijk(&self, index: usize) -> (usize, usize, usize) {
        let i = index % self.nx;
        let j = (index / self.nx) % self.ny;
        let k = index / (self.nx * self.ny);
        (i, j, k)
    }

    /// Coordinate of the `n`-th cell face along `axis`.
    ///
    /// Faces are integer multiples of half a cell counted from the DFN origin,
    /// `(2n - N) * d / 2`. Adjacent cells share bit-identical faces, and so do
    /// a full grid and any centered sub-grid with the same cell size.
    pub fn face(&self, axis: usize, n: usize) -> f64 {
        let half_steps = 2 * n as i64 - self.dims()[axis] as i64;
        half_steps as f64 * (0.5 * self.cell_size.get(axis))
    }

    /// Lower corner of cell (0, 0, 0) in DFN coordinates.
    pub fn origin(&self) -> Point {
        Point::new(self.face(0, 0), self.face(1, 0), self.face(2, 0))
    }

    /// Min and max corners of cell `(i, j, k)`.
    pub fn cell_bounds(&self, i: usize, j: usize, k: usize) -> (Point, Point) {
        (
            Point::new(self.face(0, i), self.face(1, j), self.face(2, k)),
            Point::new(self.face(0, i + 1), self.face(1, j + 1), self.face(2, k + 1)),
        )
    }

    /// Min and max corners of the whole grid.
    pub fn bounds(&self) -> (Point, Point) {
        (
            self.origin(),
            Point::new(self.face(0, self.nx), self.face(1, self.ny), self.face(2, self.nz)),
        )
    }

    /// Face coordinates along `axis` (`n + 1` values) shifted so the first
    /// face sits at `start`.
    pub fn face_coordinates(&self, axis: usize, start: f64) -> Vec<f64> {
        let d = self.cell_size.get(axis);
        (0..=self.dims()[axis]).map(|n| start + n as f64 * d).collect()
    }
}

/// Region of the DFN that is mapped, and where its output is anchored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingRegion {
    pub domain: Domain,
    /// Origin written to the output files.
    pub output_origin: Point,
    pub is_sub_domain: bool,
}

impl MappingRegion {
    /// Selects the full DFN domain or a sub-domain box.
    ///
    /// `sub_domain` and `sub_origin` must be given together. The sub-domain is
    /// centered at the DFN origin; `sub_origin` only moves the output
    /// coordinates.
    pub fn select(
        full: &Domain,
        sub_domain: Option<&[f64]>,
        sub_origin: Option<&[f64]>,
    ) -> Result<Self> {
        match (sub_domain, sub_origin) {
            (Some(box_), Some(origin)) => {
                let domain = Domain::from_components(box_, "sub_domain")?;
                let [ox, oy, oz] = three_components(origin, "sub_origin")?;
                let output_origin = Point::new(ox, oy, oz);
                if !output_origin.is_finite() {
                    return Err(MapDfnError::config("sub_origin must be finite"));
                }
                Ok(Self {
                    domain,
                    output_origin,
                    is_sub_domain: true,
                })
            }
            (None, None) => {
                full.validate()?;
                Ok(Self {
                    domain: *full,
                    output_origin: Point::origin(),
                    is_sub_domain: false,
                })
            }
            _ => Err(MapDfnError::config(
                "sub_domain and sub_origin must be specified together",
            )),
        }
    }
}

/// Discretizes `domain` (centered at the DFN origin) with `cell_size`.
///
/// Fails if any cell size does not evenly divide the domain extent.
pub fn discretize(domain: &Domain, cell_size: &CellSize) -> Result<Grid> {
    domain.validate()?;
    info!("Computing discrete domain parameters");

    let mut dims = [0usize; 3];
    for axis in 0..3 {
        dims[axis] = cell_count(domain.extent(axis), cell_size.get(axis)).ok_or_else(|| {
            MapDfnError::config(format!(
                "the cell size {:?} m does not evenly divide the domain {} x {} x {} m^3",
                cell_size.to_array(),
                domain.x,
                domain.y,
                domain.z
            ))
        })?;
    }

    let [nx, ny, nz] = dims;
    let num_cells = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(nz))
        .ok_or_else(|| MapDfnError::config(format!("grid {nx} x {ny} x {nz} is too large")))?;

    debug!(cell_size:? = cell_size.to_array(); "Hexahedron edge length");
    info!(nx, ny, nz, num_cells; "Domain discretized");

    Ok(Grid {
        nx,
        ny,
        nz,
        cell_size: *cell_size,
    })
}

/// Number of cells of size `cell` along an extent, if `cell` divides it evenly.
pub fn cell_count(extent: f64, cell: f64) -> Option<usize> {
    if !(extent.is_finite() && extent > 0. && cell.is_finite() && cell > 0.) {
        return None;
    }
    let divisible = match decimal_aligned_divisible(extent, cell) {
        Some(divisible) => divisible,
        None => ratio_is_integral(extent, cell),
    };
    if !divisible {
        return None;
    }
    let n = (extent / cell).round();
    if n < 1. || n > usize::MAX as f64 {
        return None;
    }
    Some(n as usize)
}

/// Shifts both values by powers of ten until `cell` is an integer and checks
/// the integer remainder.
///
/// Returns `None` when `cell` needs more than `MAX_DECIMAL_DIGITS` decimals or
/// the scaled values leave the exactly representable integer range.
fn decimal_aligned_divisible(extent: f64, cell: f64) -> Option<bool> {
    let (mut c, mut d) = (cell, extent);
    for _ in 0..=MAX_DECIMAL_DIGITS {
        if is_integral(c) {
            if !is_integral(d) {
                // The extent has more decimals than the cell size
                return Some(false);
            }
            let (ci, di) = (c.round(), d.round());
            if ci < 1. || di >= 2f64.powi(53) {
                return None;
            }
            return Some((di as u64) % (ci as u64) == 0);
        }
        c *= 10.;
        d *= 10.;
    }
    None
}

fn ratio_is_integral(extent: f64, cell: f64) -> bool {
    is_integral(extent / cell)
}

fn is_integral(v: f64) -> bool {
    (v - v.round()).abs() <= DIVISIBILITY_TOL * v.abs().max(1.)
}

fn three_components(values: &[f64], what: &str) -> Result<[f64; 3]> {
    match values {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => Err(MapDfnError::config(format!(
            "{what} must be a list of three values, got {} values",
            values.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(d: f64) -> Domain {
        Domain::new(d, d, d)
    }

    #[test]
    fn test_decimal_cell_sizes() {
        assert_eq!(cell_count(10.0, 0.1), Some(100));
        assert_eq!(cell_count(1.0, 0.1), Some(10));
        assert_eq!(cell_count(0.3, 0.1), Some(3));
        assert_eq!(cell_count(0.9, 0.03), Some(30));
        assert_eq!(cell_count(10.0, 2.5), Some(4));
        assert_eq!(cell_count(0.9, 0.1 + 0.2), Some(3));
    }

    #[test]
    fn test_non_divisible() {
        assert_eq!(cell_count(10.0, 3.0), None);
        assert_eq!(cell_count(10.0, 0.03), None);
        assert_eq!(cell_count(10.05, 0.1), None);
        assert_eq!(cell_count(1.0, 3.0), None);
        assert_eq!(cell_count(10.0, 0.0), None);
        assert_eq!(cell_count(10.0, -1.0), None);
    }

    #[test]
    fn test_discretize_unit_cells() {
        let grid = discretize(&cube(10.), &CellSize::uniform(1.).unwrap()).unwrap();
        assert_eq!(grid.dims(), [10, 10, 10]);
        assert_eq!(grid.num_cells(), 1000);
        assert!(grid.origin().is_close(&Point::new(-5., -5., -5.)));
        assert_eq!(grid.face(0, 5), 0.);
        assert_eq!(grid.bounds().1, Point::new(5., 5., 5.));
    }

    #[test]
    fn test_discretize_anisotropic_cells() {
        let domain = Domain::new(10., 4., 2.);
        let grid = discretize(&domain, &CellSize::new(0.5, 1., 0.25).unwrap()).unwrap();
        assert_eq!(grid.dims(), [20, 4, 8]);
        assert_eq!(grid.num_cells(), 20 * 4 * 8);
    }

    #[test]
    fn test_discretize_rejects_non_divisible() {
        let err = discretize(&cube(10.), &CellSize::new(1., 3., 1.).unwrap()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cell_size_components() {
        assert_eq!(
            CellSize::from_components(&[2.]).unwrap(),
            CellSize::uniform(2.).unwrap()
        );
        assert!(CellSize::from_components(&[1., 2.]).is_err());
        assert!(CellSize::from_components(&[1., 2., 3., 4.]).is_err());
        assert!(CellSize::from_components(&[]).is_err());
        assert!(CellSize::from_components(&[1., f64::NAN, 1.]).is_err());
    }

    #[test]
    fn test_index_roundtrip() {
        let grid = discretize(&Domain::new(3., 4., 5.), &CellSize::uniform(1.).unwrap()).unwrap();
        assert_eq!(grid.index(0, 0, 0), 0);
        assert_eq!(grid.index(1, 0, 0), 1);
        assert_eq!(grid.index(0, 1, 0), 3);
        assert_eq!(grid.index(0, 0, 1), 12);
        for idx in 0..grid.num_cells() {
            let (i, j, k) = grid.ijk(idx);
            assert_eq!(grid.index(i, j, k), idx);
        }
    }

    #[test]
    fn test_adjacent_cells_share_faces() {
        let grid = discretize(&cube(1.), &CellSize::uniform(0.1).unwrap()).unwrap();
        for i in 0..grid.nx - 1 {
            let (_, max_a) = grid.cell_bounds(i, 0, 0);
            let (min_b, _) = grid.cell_bounds(i + 1, 0, 0);
            assert_eq!(max_a.x, min_b.x);
        }
    }

    #[test]
    fn test_sub_grid_shares_faces_with_full_grid() {
        let cell = CellSize::uniform(0.1).unwrap();
        let full = discretize(&cube(2.), &cell).unwrap();
        let sub = discretize(&cube(1.), &cell).unwrap();
        let offset = (full.nx - sub.nx) / 2;
        for axis in 0..3 {
            for n in 0..=sub.dims()[axis] {
                assert_eq!(sub.face(axis, n), full.face(axis, n + offset));
            }
        }
        assert_eq!(sub.cell_bounds(2, 3, 4), full.cell_bounds(7, 8, 9));
    }

    #[test]
    fn test_face_coordinates() {
        let grid = discretize(&cube(2.), &CellSize::uniform(0.5).unwrap()).unwrap();
        assert_eq!(grid.face_coordinates(0, 0.), vec![0., 0.5, 1., 1.5, 2.]);
        assert_eq!(grid.face_coordinates(2, 5.), vec![5., 5.5, 6., 6.5, 7.]);
    }

    #[test]
    fn test_region_selection() {
        let full = cube(10.);
        let region = MappingRegion::select(&full, None, None).unwrap();
        assert!(!region.is_sub_domain);
        assert!(region.output_origin.is_close(&Point::origin()));

        let region =
            MappingRegion::select(&full, Some(&[1., 1., 1.]), Some(&[5., 5., 5.])).unwrap();
        assert!(region.is_sub_domain);
        assert_eq!(region.domain, cube(1.));
        assert!(region.output_origin.is_close(&Point::new(5., 5., 5.)));
    }

    #[test]
    fn test_region_requires_both_parts() {
        let full = cube(10.);
        assert!(MappingRegion::select(&full, Some(&[1., 1., 1.]), None).is_err());
        assert!(MappingRegion::select(&full, None, Some(&[5., 5., 5.])).is_err());
        assert!(MappingRegion::select(&full, Some(&[1., 1.]), Some(&[5., 5., 5.])).is_err());
        assert!(MappingRegion::select(&full, Some(&[1., 1., 1.]), Some(&[5., 5.])).is_err());
        assert!(MappingRegion::select(&full, Some(&[1., -1., 1.]), Some(&[0., 0., 0.])).is_err());
    }
}
