use serde::{Deserialize, Serialize};

use crate::error::{MapDfnError, Result};
use crate::geom::polygon::PlanarPolygon;
use crate::geom::rotation::{rotate_points, rotate_points_around_vector, rotation_between};
use crate::{Point, Vector};

/// Number of vertices used to approximate an ellipse when none is given.
pub const DEFAULT_ELLIPSE_VERTICES: usize = 8;

fn default_aspect_ratio() -> f64 {
    1.0
}

fn default_num_vertices() -> usize {
    DEFAULT_ELLIPSE_VERTICES
}

fn default_normal() -> [f64; 3] {
    [0., 0., 1.]
}

/// Fracture outline as issued by the network generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FractureShape {
    /// Ellipse with x semi-axis `radius` and y semi-axis `radius * aspect_ratio`,
    /// approximated by `num_vertices` points on its outline.
    Ellipse {
        radius: f64,
        #[serde(default = "default_aspect_ratio")]
        aspect_ratio: f64,
        #[serde(default = "default_num_vertices")]
        num_vertices: usize,
    },
    /// Rectangle with half-widths `radius` and `radius * aspect_ratio`.
    Rectangle {
        radius: f64,
        #[serde(default = "default_aspect_ratio")]
        aspect_ratio: f64,
    },
    /// Explicit convex outline in domain coordinates.
    ///
    /// `center`, `normal` and `beta` of the fracture are ignored for this shape.
    Polygon { vertices: Vec<[f64; 3]> },
}

/// A single fracture of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fracture {
    /// Unique, positive identifier.
    pub id: u32,
    pub shape: FractureShape,
    /// Translation of the fracture center (m).
    #[serde(default)]
    pub center: [f64; 3],
    /// Plane normal; does not need to be a unit vector.
    #[serde(default = "default_normal")]
    pub normal: [f64; 3],
    /// In-plane rotation about the normal (degrees).
    #[serde(default)]
    pub beta: f64,
    /// Aperture (m).
    pub aperture: f64,
    /// Intrinsic permeability (m^2). Defaults to the cubic law `b^2 / 12`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permeability: Option<f64>,
}

impl Fracture {
    pub fn ellipse(id: u32, radius: f64, center: [f64; 3], normal: [f64; 3], aperture: f64) -> Self {
        Self {
            id,
            shape: FractureShape::Ellipse {
                radius,
                aspect_ratio: 1.0,
                num_vertices: DEFAULT_ELLIPSE_VERTICES,
            },
            center,
            normal,
            beta: 0.0,
            aperture,
            permeability: None,
        }
    }

    pub fn rectangle(
        id: u32,
        radius: f64,
        center: [f64; 3],
        normal: [f64; 3],
        aperture: f64,
    ) -> Self {
        Self {
            shape: FractureShape::Rectangle {
                radius,
                aspect_ratio: 1.0,
            },
            ..Self::ellipse(id, radius, center, normal, aperture)
        }
    }

    pub fn polygon(id: u32, vertices: Vec<[f64; 3]>, aperture: f64) -> Self {
        Self {
            id,
            shape: FractureShape::Polygon { vertices },
            center: [0.; 3],
            normal: default_normal(),
            beta: 0.0,
            aperture,
            permeability: None,
        }
    }

    /// Sets the aspect ratio of an ellipse or rectangle. No effect on polygons.
    pub fn with_aspect_ratio(mut self, ratio: f64) -> Self {
        match &mut self.shape {
            FractureShape::Ellipse { aspect_ratio, .. }
            | FractureShape::Rectangle { aspect_ratio, .. } => *aspect_ratio = ratio,
            FractureShape::Polygon { .. } => {}
        }
        self
    }

    /// Sets the number of outline vertices of an ellipse. No effect otherwise.
    pub fn with_num_vertices(mut self, n: usize) -> Self {
        if let FractureShape::Ellipse { num_vertices, .. } = &mut self.shape {
            *num_vertices = n;
        }
        self
    }

    pub fn with_beta(mut self, beta_deg: f64) -> Self {
        self.beta = beta_deg;
        self
    }

    pub fn with_permeability(mut self, permeability: f64) -> Self {
        self.permeability = Some(permeability);
        self
    }

    /// Resolves the fracture into a planar polygon with hydraulic properties.
    ///
    /// Returns `MapDfnError::Geometry` for degenerate input.
    pub fn resolve(&self) -> Result<ResolvedFracture> {
        let fail = |reason: String| MapDfnError::Geometry {
            id: self.id,
            reason,
        };

        if !(self.aperture.is_finite() && self.aperture > 0.) {
            return Err(fail(format!("aperture must be positive, got {}", self.aperture)));
        }
        let permeability = match self.permeability {
            Some(k) if !(k.is_finite() && k > 0.) => {
                return Err(fail(format!("permeability must be positive, got {k}")));
            }
            Some(k) => k,
            None => self.aperture.powi(2) / 12.,
        };

        let polygon = match &self.shape {
            FractureShape::Ellipse {
                radius,
                aspect_ratio,
                num_vertices,
            } => {
                check_extent(*radius, *aspect_ratio).map_err(fail)?;
                if *num_vertices < 3 {
                    return Err(fail(format!(
                        "ellipse needs at least 3 vertices, got {num_vertices}"
                    )));
                }
                let local: Vec<Point> = (0..*num_vertices)
                    .map(|i| {
                        let theta = 2. * std::f64::consts::PI * i as f64 / *num_vertices as f64;
                        Point::new(radius * theta.cos(), radius * aspect_ratio * theta.sin(), 0.)
                    })
                    .collect();
                self.place(local).map_err(fail)?
            }
            FractureShape::Rectangle {
                radius,
                aspect_ratio,
            } => {
                check_extent(*radius, *aspect_ratio).map_err(fail)?;
                let (a, b) = (*radius, radius * aspect_ratio);
                let local = vec![
                    Point::new(-a, -b, 0.),
                    Point::new(a, -b, 0.),
                    Point::new(a, b, 0.),
                    Point::new(-a, b, 0.),
                ];
                self.place(local).map_err(fail)?
            }
            FractureShape::Polygon { vertices } => {
                let pts = vertices.iter().map(|v| Point::from(*v)).collect();
                PlanarPolygon::new(pts).map_err(|e| fail(e.to_string()))?
            }
        };

        let normal = polygon.normal();
        Ok(ResolvedFracture {
            id: self.id,
            polygon,
            normal,
            aperture: self.aperture,
            permeability,
            transmissivity: permeability * self.aperture,
        })
    }

    /// Rotates local outline points (in the xy plane) by `beta`, aligns the
    /// local z axis with the fracture normal and moves them to `center`.
    fn place(&self, local: Vec<Point>) -> std::result::Result<PlanarPolygon, String> {
        let normal = Vector::from(self.normal)
            .normalize()
            .ok_or_else(|| "normal vector has zero length".to_string())?;
        let center = Point::from(self.center);
        if !center.is_finite() || !self.beta.is_finite() {
            return Err("center and beta must be finite".to_string());
        }

        let spun =
            rotate_points_around_vector(&local, &Vector::unit_axis(2), self.beta.to_radians());
        let rot = rotation_between(&Vector::unit_axis(2), &normal);
        let placed = rotate_points(&spun, &rot.view())
            .into_iter()
            .map(|p| p + Vector::from_a_point(center))
            .collect();

        PlanarPolygon::new(placed).map_err(|e| e.to_string())
    }
}

fn check_extent(radius: f64, aspect_ratio: f64) -> std::result::Result<(), String> {
    if !(radius.is_finite() && radius > 0.) {
        return Err(format!("radius must be positive, got {radius}"));
    }
    if !(aspect_ratio.is_finite() && aspect_ratio > 0.) {
        return Err(format!("aspect ratio must be positive, got {aspect_ratio}"));
    }
    Ok(())
}

/// Fracture reduced to what tagging and upscaling need.
#[derive(Debug, Clone)]
pub struct ResolvedFracture {
    pub id: u32,
    pub polygon: PlanarPolygon,
    /// Unit normal of the fracture plane.
    pub normal: Vector,
    pub aperture: f64,
    pub permeability: f64,
    /// Permeability times aperture (m^3).
    pub transmissivity: f64,
}
