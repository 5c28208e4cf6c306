use crate::Point;
use crate::Vector;
use crate::geom::{EPS, IsClose};
use ndarray as nd;

/// Calculate rotation matrix for a unit vector `u` and angle `phi`.
///
/// A rotation in 3D can be described with an axis and angle around that axis.
/// The axis is described with a unit vector `u` `(ux**2 + uy**2 + uz**2 == 1)`
/// and the angle `phi` (in radians).
///
/// Uses the Rodrigues formula, which is more stable numerically than
/// assembling the matrix from sines and cosines term by term:
/// https://en.wikipedia.org/wiki/Rodrigues%27_rotation_formula
pub fn rotation_matrix(u: &Vector, phi: f64) -> nd::Array2<f64> {
    debug_assert!(
        u.length().is_close(1.),
        "rotation_matrix() requires u to be a unit vector"
    );

    let w: nd::Array2<f64> = nd::arr2(&[[0., -u.dz, u.dy], [u.dz, 0., -u.dx], [-u.dy, u.dx, 0.]]);

    nd::Array::eye(3) + phi.sin() * &w + (2. * (phi / 2.).sin().powi(2)) * w.dot(&w)
}

/// Rotation taking the unit vector `from` onto the unit vector `to`.
pub fn rotation_between(from: &Vector, to: &Vector) -> nd::Array2<f64> {
    let cos_phi = from.dot(*to).clamp(-1., 1.);
    let axis = from.cross(*to);
    match axis.normalize() {
        Some(u) => rotation_matrix(&u, cos_phi.acos()),
        None if cos_phi > 0. => nd::Array::eye(3),
        None => {
            // Antiparallel: half turn about any axis orthogonal to `from`
            let helper = if from.dx.abs() < 0.9 {
                Vector::unit_axis(0)
            } else {
                Vector::unit_axis(1)
            };
            let u = from
                .cross(helper)
                .normalize()
                .unwrap_or(Vector::unit_axis(2));
            rotation_matrix(&u, std::f64::consts::PI)
        }
    }
}

/// Rotate points using the rotation matrix `rot` (`p' = rot * p`).
pub fn rotate_points(pts: &[Point], rot: &nd::ArrayView2<f64>) -> Vec<Point> {
    let mut arr = nd::Array2::<f64>::zeros((pts.len(), 3));
    for (i, p) in pts.iter().enumerate() {
        arr[[i, 0]] = p.x;
        arr[[i, 1]] = p.y;
        arr[[i, 2]] = p.z;
    }
    let rotated = arr.dot(&rot.t());

    rotated
        .outer_iter()
        .map(|row| Point::new(row[0], row[1], row[2]))
        .collect()
}

/// Rotate points around the unit vector `u` with the angle `phi` (radians).
pub fn rotate_points_around_vector(pts: &[Point], u: &Vector, phi: f64) -> Vec<Point> {
    if u.length() < EPS || phi.abs() < EPS {
        // No need to rotate
        return pts.to_vec();
    }
    let rot = rotation_matrix(u, phi);

    rotate_points(pts, &rot.view())
}
