//! Cell-fracture tagging.
//!
//! For every grid cell, collects the ids of all fractures whose polygon
//! intersects the cell. Fractures are bucketed by z-slab using their bounding
//! boxes, so each cell only runs the exact test against nearby candidates.

use log::{debug, info};
use rayon::prelude::*;

use crate::ecpm::domain::Grid;
use crate::geom::bboxes::are_bboxes_overlapping;
use crate::network::{ResolvedFracture, ResolvedNetwork};

/// Per-cell sorted lists of intersecting fracture ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellFractureMap {
    cells: Vec<Vec<u32>>,
}

impl CellFractureMap {
    /// Wraps per-cell id lists, sorting and deduplicating each one.
    pub fn from_cells(mut cells: Vec<Vec<u32>>) -> Self {
        for ids in cells.iter_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        Self { cells }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Fracture ids intersecting the cell, in ascending order.
    pub fn fractures_in(&self, cell: usize) -> &[u32] {
        &self.cells[cell]
    }

    pub fn is_fractured(&self, cell: usize) -> bool {
        !self.cells[cell].is_empty()
    }

    /// Number of cells intersected by at least one fracture.
    pub fn num_fractured_cells(&self) -> usize {
        self.cells.iter().filter(|ids| !ids.is_empty()).count()
    }

    /// Total number of (cell, fracture) pairs.
    pub fn num_tags(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u32]> {
        self.cells.iter().map(Vec::as_slice)
    }
}

/// Counters reported alongside a [`CellFractureMap`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSummary {
    pub fractured_cells: usize,
    pub tags: usize,
    /// Fractures whose bounding box misses the grid.
    pub outside: usize,
    /// Fractures skipped for degenerate geometry.
    pub skipped: Vec<u32>,
}

/// Inclusive range of cell indices along x and y touched by a fracture's bbox.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    fracture: usize,
    i: (usize, usize),
    j: (usize, usize),
}

impl Candidate {
    fn covers(&self, i: usize, j: usize) -> bool {
        self.i.0 <= i && i <= self.i.1 && self.j.0 <= j && j <= self.j.1
    }
}

/// Tags the cells of `grid` with the resolved fractures of a network.
pub fn tag_network(grid: &Grid, network: &ResolvedNetwork) -> (CellFractureMap, TagSummary) {
    let (slabs, outside) = build_slabs(grid, &network.fractures);
    let map = tag_with_slabs(grid, &network.fractures, &slabs);
    let summary = TagSummary {
        fractured_cells: map.num_fractured_cells(),
        tags: map.num_tags(),
        outside,
        skipped: network.skipped.clone(),
    };
    (map, summary)
}

/// Tags every cell of `grid` with the fractures intersecting it.
pub fn tag_cells(grid: &Grid, fractures: &[ResolvedFracture]) -> CellFractureMap {
    let (slabs, _) = build_slabs(grid, fractures);
    tag_with_slabs(grid, fractures, &slabs)
}

fn tag_with_slabs(
    grid: &Grid,
    fractures: &[ResolvedFracture],
    slabs: &[Vec<Candidate>],
) -> CellFractureMap {
    info!(num_cells = grid.num_cells(), num_fractures = fractures.len(); "Tagging cells");

    let mut cells: Vec<Vec<u32>> = vec![Vec::new(); grid.num_cells()];
    cells.par_iter_mut().enumerate().for_each(|(idx, ids)| {
        let (i, j, k) = grid.ijk(idx);
        let (cmin, cmax) = grid.cell_bounds(i, j, k);
        for cand in slabs[k].iter() {
            if !cand.covers(i, j) {
                continue;
            }
            let f = &fractures[cand.fracture];
            if f.polygon.intersects_cell(cmin, cmax) {
                ids.push(f.id);
            }
        }
        ids.sort_unstable();
    });

    let map = CellFractureMap { cells };
    info!(
        fractured_cells = map.num_fractured_cells(),
        tags = map.num_tags();
        "Cell tagging complete"
    );
    map
}

/// Tags cells by testing every fracture against every cell.
///
/// Same predicate as [`tag_cells`] without the spatial index. Quadratic; meant
/// for verification on small grids.
pub fn tag_cells_exhaustive(grid: &Grid, fractures: &[ResolvedFracture]) -> CellFractureMap {
    let cells = (0..grid.num_cells())
        .map(|idx| {
            let (i, j, k) = grid.ijk(idx);
            let (cmin, cmax) = grid.cell_bounds(i, j, k);
            fractures
                .iter()
                .filter(|f| f.polygon.intersects_cell(cmin, cmax))
                .map(|f| f.id)
                .collect()
        })
        .collect();
    CellFractureMap::from_cells(cells)
}

/// Buckets fractures by the z-slabs their bounding boxes reach. Also returns
/// the number of fractures that miss the grid.
fn build_slabs(grid: &Grid, fractures: &[ResolvedFracture]) -> (Vec<Vec<Candidate>>, usize) {
    let mut slabs: Vec<Vec<Candidate>> = vec![Vec::new(); grid.nz];
    let (gmin, gmax) = grid.bounds();
    let mut outside = 0usize;

    for (fi, f) in fractures.iter().enumerate() {
        let (fmin, fmax) = f.polygon.bbox();
        if !are_bboxes_overlapping(fmin, fmax, gmin, gmax) {
            outside += 1;
            continue;
        }
        let ranges = (
            index_range(grid, 0, fmin.x, fmax.x),
            index_range(grid, 1, fmin.y, fmax.y),
            index_range(grid, 2, fmin.z, fmax.z),
        );
        let (Some(i), Some(j), Some((k0, k1))) = ranges else {
            outside += 1;
            continue;
        };
        for slab in slabs[k0..=k1].iter_mut() {
            slab.push(Candidate { fracture: fi, i, j });
        }
    }

    if outside > 0 {
        debug!(outside; "Fractures outside the mapped region");
    }
    (slabs, outside)
}

/// Cell index range along `axis` covering `[lo, hi]`, widened by one cell on
/// each side to absorb rounding, clamped to the grid.
fn index_range(grid: &Grid, axis: usize, lo: f64, hi: f64) -> Option<(usize, usize)> {
    let n = grid.dims()[axis] as f64;
    let o = grid.face(axis, 0);
    let d = grid.cell_size.get(axis);
    let first = ((lo - o) / d).floor() - 1.;
    let last = ((hi - o) / d).floor() + 1.;
    if last < 0. || first > n - 1. {
        return None;
    }
    let first = first.max(0.) as usize;
    let last = last.min(n - 1.) as usize;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecpm::domain::{CellSize, Domain, discretize};
    use crate::network::Fracture;

    fn grid(extent: f64, cell: f64) -> Grid {
        discretize(
            &Domain::new(extent, extent, extent),
            &CellSize::uniform(cell).unwrap(),
        )
        .unwrap()
    }

    fn resolve(fractures: &[Fracture]) -> Vec<ResolvedFracture> {
        fractures.iter().map(|f| f.resolve().unwrap()).collect()
    }

    #[test]
    fn test_horizontal_fracture_tags_one_layer() {
        let g = grid(10., 1.);
        let frs = resolve(&[Fracture::ellipse(1, 6., [0.; 3], [0., 0., 1.], 1e-3)]);
        let map = tag_cells(&g, &frs);
        assert_eq!(map.num_cells(), 1000);

        // The plane z=0 is the lower face of layer k=5
        for idx in 0..g.num_cells() {
            let (_, _, k) = g.ijk(idx);
            if k != 5 {
                assert!(!map.is_fractured(idx), "cell {idx} in layer {k}");
            }
        }
        assert_eq!(map.fractures_in(g.index(5, 5, 5)), &[1]);
        assert_eq!(map.fractures_in(g.index(4, 4, 5)), &[1]);
        // Corners of the domain stay untouched
        assert!(!map.is_fractured(g.index(0, 0, 0)));
        assert!(!map.is_fractured(g.index(9, 9, 9)));
    }

    #[test]
    fn test_multiple_fractures_per_cell() {
        let g = grid(4., 1.);
        let frs = resolve(&[
            Fracture::rectangle(3, 1.5, [0.5, 0.5, 0.5], [0., 0., 1.], 1e-3),
            Fracture::rectangle(1, 1.5, [0.5, 0.5, 0.5], [1., 0., 0.], 1e-3),
        ]);
        let map = tag_cells(&g, &frs);
        // Cell [0,1)^3 holds both planes x=0.5 and z=0.5; ids come sorted
        assert_eq!(map.fractures_in(g.index(2, 2, 2)), &[1, 3]);
        assert_eq!(map.fractures_in(g.index(2, 2, 3)), &[1]);
    }

    #[test]
    fn test_fracture_outside_domain() {
        let g = grid(4., 1.);
        let frs = resolve(&[Fracture::ellipse(1, 1., [10., 10., 10.], [0., 0., 1.], 1e-3)]);
        let map = tag_cells(&g, &frs);
        assert_eq!(map.num_fractured_cells(), 0);
        assert_eq!(map.num_tags(), 0);
    }

    #[test]
    fn test_slab_index_matches_exhaustive() {
        let g = grid(6., 0.5);
        let frs = resolve(&[
            Fracture::ellipse(1, 2.5, [-0.3, 0.7, 0.2], [1., 2., 3.], 1e-3).with_num_vertices(12),
            Fracture::rectangle(2, 4., [0.5, -1., 0.], [0., 1., 0.2], 1e-4).with_beta(25.),
            Fracture::ellipse(3, 1.2, [2., 2., -2.], [-1., 0.3, 0.], 1e-3).with_aspect_ratio(0.5),
            Fracture::rectangle(4, 1., [0., 0., 0.], [0., 0., 1.], 1e-3),
            Fracture::polygon(5, vec![[-3., -3., -3.], [3., -3., 3.], [0., 3., 0.]], 1e-3),
        ]);
        let fast = tag_cells(&g, &frs);
        let slow = tag_cells_exhaustive(&g, &frs);
        assert_eq!(fast, slow);
        assert!(fast.num_fractured_cells() > 0);
    }

    #[test]
    fn test_tag_network_summary() {
        use crate::ecpm::domain::Domain;
        use crate::network::FractureNetwork;

        let g = grid(4., 1.);
        let network = FractureNetwork::new(
            Domain::new(4., 4., 4.),
            vec![
                Fracture::rectangle(1, 1.5, [0.5, 0.5, 0.5], [0., 0., 1.], 1e-3),
                Fracture::ellipse(2, 1., [10., 10., 10.], [0., 0., 1.], 1e-3),
                Fracture::ellipse(3, 0., [0.; 3], [0., 0., 1.], 1e-3),
            ],
        )
        .unwrap();
        let (map, summary) = tag_network(&g, &network.resolve());
        assert_eq!(summary.skipped, vec![3]);
        assert_eq!(summary.outside, 1);
        // Square [-1, 2]^2 at z=0.5 covers 3 x 3 cells of layer k=2
        assert_eq!(summary.fractured_cells, 9);
        assert_eq!(summary.tags, 9);
        assert_eq!(map.num_fractured_cells(), 9);
    }

    #[test]
    fn test_from_cells_sorts_and_dedups() {
        let map = CellFractureMap::from_cells(vec![vec![3, 1, 3], vec![]]);
        assert_eq!(map.fractures_in(0), &[1, 3]);
        assert!(!map.is_fractured(1));
        assert_eq!(map.iter().count(), 2);
    }
}
