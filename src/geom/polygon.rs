//! Planar convex polygons and their intersection with axis-aligned cells.

use thiserror::Error;

use crate::geom::EPS;
use crate::geom::bboxes::bounding_box;
use crate::{Point, Vector};

/// Relative tolerance used for planarity and convexity checks.
const SHAPE_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolygonError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon vertices are not finite")]
    NonFinite,
    #[error("polygon vertices are collinear")]
    Collinear,
    #[error("polygon vertices are not coplanar")]
    NonPlanar,
    #[error("polygon is not convex")]
    NonConvex,
}

/// Convex polygon lying in a single plane.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarPolygon {
    pts: Vec<Point>,
    normal: Vector,
    /// Bounding box corners (min, max).
    bbox: (Point, Point),
    /// Edge vectors `pts[i] -> pts[i + 1]`.
    edges: Vec<Vector>,
}

impl PlanarPolygon {
    /// Creates a polygon from ordered vertices.
    ///
    /// The normal is computed with Newell's method, so its sign follows the
    /// vertex winding. Vertices must be coplanar and form a convex outline.
    pub fn new(pts: Vec<Point>) -> Result<Self, PolygonError> {
        if pts.len() < 3 {
            return Err(PolygonError::TooFewVertices(pts.len()));
        }
        if pts.iter().any(|p| !p.is_finite()) {
            return Err(PolygonError::NonFinite);
        }

        let normal = newell_normal(&pts).ok_or(PolygonError::Collinear)?;
        let (pmin, pmax) = bounding_box(&pts).ok_or(PolygonError::TooFewVertices(0))?;
        let size = Vector::from_points(pmin, pmax).length();

        let offset = normal.dot(Vector::from_a_point(pts[0]));
        for p in pts.iter() {
            let dist = normal.dot(Vector::from_a_point(*p)) - offset;
            if dist.abs() > SHAPE_TOL * size.max(1.) {
                return Err(PolygonError::NonPlanar);
            }
        }

        let n = pts.len();
        let edges: Vec<Vector> = (0..n)
            .map(|i| Vector::from_points(pts[i], pts[(i + 1) % n]))
            .collect();

        // Consecutive edges must all turn the same way around the normal
        for i in 0..n {
            let turn = edges[i].cross(edges[(i + 1) % n]).dot(normal);
            if turn < -SHAPE_TOL * size.max(1.).powi(2) {
                return Err(PolygonError::NonConvex);
            }
        }

        Ok(Self {
            pts,
            normal,
            bbox: (pmin, pmax),
            edges,
        })
    }

    pub fn vertices(&self) -> &[Point] {
        &self.pts
    }

    /// Unit normal of the polygon plane.
    pub fn normal(&self) -> Vector {
        self.normal
    }

    pub fn bbox(&self) -> (Point, Point) {
        self.bbox
    }

    /// Polygon area.
    pub fn area(&self) -> f64 {
        let p0 = Vector::from_a_point(self.pts[0]);
        let mut sum = Vector::new(0., 0., 0.);
        for i in 1..self.pts.len() - 1 {
            let a = Vector::from_a_point(self.pts[i]) - p0;
            let b = Vector::from_a_point(self.pts[i + 1]) - p0;
            sum = sum + a.cross(b);
        }
        0.5 * sum.dot(self.normal).abs()
    }

    /// Checks whether the polygon intersects the cell `[cmin, cmax)`.
    ///
    /// Uses the separating axis theorem. Along the coordinate axes the cell is
    /// half-open: touching only its upper face is not an intersection, touching
    /// its lower face is. All other candidate axes are inclusive within `EPS`.
    ///
    /// An inclined polygon that passes exactly through a cell edge or vertex
    /// therefore intersects every cell sharing that edge or vertex, while an
    /// axis-aligned polygon on a face intersects only the cell above it.
    pub fn intersects_cell(&self, cmin: Point, cmax: Point) -> bool {
        let (pmin, pmax) = self.bbox;
        for axis in 0..3 {
            if pmax.coord(axis) < cmin.coord(axis) || pmin.coord(axis) >= cmax.coord(axis) {
                return false;
            }
        }

        let center = Vector::new(
            0.5 * (cmin.x + cmax.x),
            0.5 * (cmin.y + cmax.y),
            0.5 * (cmin.z + cmax.z),
        );
        let half = Vector::new(
            0.5 * (cmax.x - cmin.x),
            0.5 * (cmax.y - cmin.y),
            0.5 * (cmax.z - cmin.z),
        );

        if self.is_separated_along(self.normal, center, half) {
            return false;
        }

        for edge in self.edges.iter() {
            for axis in 0..3 {
                let candidate = Vector::unit_axis(axis).cross(*edge);
                if candidate.length() < EPS {
                    continue;
                }
                if self.is_separated_along(candidate, center, half) {
                    return false;
                }
            }
        }

        true
    }

    fn is_separated_along(&self, axis: Vector, center: Vector, half: Vector) -> bool {
        let radius =
            half.dx * axis.dx.abs() + half.dy * axis.dy.abs() + half.dz * axis.dz.abs();
        let c = center.dot(axis);
        let (lo, hi) = self.pts.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let s = Vector::from_a_point(*p).dot(axis);
            (lo.min(s), hi.max(s))
        });
        let tol = EPS * axis.length() * (1. + c.abs() + radius);
        hi < c - radius - tol || lo > c + radius + tol
    }
}

/// Unit normal of a polygon using Newell's method.
fn newell_normal(pts: &[Point]) -> Option<Vector> {
    let n = pts.len();
    let mut v = Vector::new(0., 0., 0.);
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        v.dx += (a.y - b.y) * (a.z + b.z);
        v.dy += (a.z - b.z) * (a.x + b.x);
        v.dz += (a.x - b.x) * (a.y + b.y);
    }
    v.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_at_z(z: f64, half: f64) -> PlanarPolygon {
        PlanarPolygon::new(vec![
            Point::new(-half, -half, z),
            Point::new(half, -half, z),
            Point::new(half, half, z),
            Point::new(-half, half, z),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_square() {
        let sq = square_at_z(0., 1.);
        assert!(sq.normal().is_close(&Vector::new(0., 0., 1.)));
        assert!((sq.area() - 4.).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_polygons() {
        let p = |x, y, z| Point::new(x, y, z);
        assert_eq!(
            PlanarPolygon::new(vec![p(0., 0., 0.), p(1., 0., 0.)]),
            Err(PolygonError::TooFewVertices(2))
        );
        assert_eq!(
            PlanarPolygon::new(vec![p(0., 0., 0.), p(1., 0., 0.), p(2., 0., 0.)]),
            Err(PolygonError::Collinear)
        );
        assert_eq!(
            PlanarPolygon::new(vec![
                p(0., 0., 0.),
                p(1., 0., 0.),
                p(1., 1., 0.5),
                p(0., 1., 0.)
            ]),
            Err(PolygonError::NonPlanar)
        );
        // L-shape
        assert_eq!(
            PlanarPolygon::new(vec![
                p(0., 0., 0.),
                p(2., 0., 0.),
                p(2., 1., 0.),
                p(1., 1., 0.),
                p(1., 2., 0.),
                p(0., 2., 0.)
            ]),
            Err(PolygonError::NonConvex)
        );
        assert_eq!(
            PlanarPolygon::new(vec![p(0., 0., 0.), p(f64::NAN, 0., 0.), p(0., 1., 0.)]),
            Err(PolygonError::NonFinite)
        );
    }

    #[test]
    fn test_cell_half_open_convention() {
        let sq = square_at_z(0., 0.5);
        let below = (Point::new(-1., -1., -1.), Point::new(1., 1., 0.));
        let above = (Point::new(-1., -1., 0.), Point::new(1., 1., 1.));
        // The plane z=0 belongs to the cell whose lower face it lies on
        assert!(!sq.intersects_cell(below.0, below.1));
        assert!(sq.intersects_cell(above.0, above.1));
    }

    #[test]
    fn test_inclined_polygon_through_shared_edge() {
        // Vertical plane x + y = 0 through the edge x = y = 0
        let wall = PlanarPolygon::new(vec![
            Point::new(-1., 1., -1.),
            Point::new(1., -1., -1.),
            Point::new(1., -1., 1.),
            Point::new(-1., 1., 1.),
        ])
        .unwrap();
        assert!(wall.intersects_cell(Point::new(-1., -1., 0.), Point::new(0., 0., 1.)));
        assert!(wall.intersects_cell(Point::new(0., 0., 0.), Point::new(1., 1., 1.)));
        assert!(!wall.intersects_cell(Point::new(0.5, 0., 0.), Point::new(1.5, 1., 1.)));
    }

    #[test]
    fn test_cell_far_away() {
        let sq = square_at_z(0., 0.5);
        assert!(!sq.intersects_cell(Point::new(2., 2., -1.), Point::new(3., 3., 1.)));
    }

    #[test]
    fn test_inclined_polygon_misses_corner_cell() {
        // Plane x + y + z = 0 clipped to a triangle; the cell near (1,1,1)
        // overlaps the triangle's bounding box but not its plane.
        let tri = PlanarPolygon::new(vec![
            Point::new(2., -1., -1.),
            Point::new(-1., 2., -1.),
            Point::new(-1., -1., 2.),
        ])
        .unwrap();
        assert!(!tri.intersects_cell(Point::new(0.5, 0.5, 0.5), Point::new(1.5, 1.5, 1.5)));
        assert!(tri.intersects_cell(Point::new(-0.5, -0.5, -0.5), Point::new(0.5, 0.5, 0.5)));
    }

    #[test]
    fn test_edge_axis_separates() {
        // A thin diagonal strip in the plane z=0.25 whose bbox covers the cell
        // corner but whose outline passes beside it.
        let strip = PlanarPolygon::new(vec![
            Point::new(0., 2., 0.25),
            Point::new(2., 0., 0.25),
            Point::new(2.1, 0.1, 0.25),
            Point::new(0.1, 2.1, 0.25),
        ])
        .unwrap();
        assert!(!strip.intersects_cell(Point::new(0., 0., 0.), Point::new(0.5, 0.5, 0.5)));
        assert!(strip.intersects_cell(Point::new(0.5, 1., 0.), Point::new(1.5, 2., 0.5)));
    }
}
