use std::ops::{Add, AddAssign, Mul};

use crate::Vector;

/// Symmetric 3x3 permeability tensor (m^2) stored as its 6 unique components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PermTensor {
    pub xx: f64,
    pub yy: f64,
    pub zz: f64,
    pub xy: f64,
    pub xz: f64,
    pub yz: f64,
}

impl PermTensor {
    pub const ZERO: Self = Self {
        xx: 0.,
        yy: 0.,
        zz: 0.,
        xy: 0.,
        xz: 0.,
        yz: 0.,
    };

    /// `k * I`
    pub fn isotropic(k: f64) -> Self {
        Self {
            xx: k,
            yy: k,
            zz: k,
            ..Self::ZERO
        }
    }

    /// In-plane tensor `k * (I - n n^T)` of a plane with unit normal `n`.
    ///
    /// Flow along the plane sees `k`, flow across it sees nothing.
    pub fn in_plane(normal: Vector, k: f64) -> Self {
        let n = normal;
        Self {
            xx: k * (1. - n.dx * n.dx),
            yy: k * (1. - n.dy * n.dy),
            zz: k * (1. - n.dz * n.dz),
            xy: -k * n.dx * n.dy,
            xz: -k * n.dx * n.dz,
            yz: -k * n.dy * n.dz,
        }
    }

    /// Components in `[xx, yy, zz, xy, xz, yz]` order.
    pub fn components(&self) -> [f64; 6] {
        [self.xx, self.yy, self.zz, self.xy, self.xz, self.yz]
    }

    pub fn trace(&self) -> f64 {
        self.xx + self.yy + self.zz
    }

    pub fn is_diagonal(&self) -> bool {
        self.xy == 0. && self.xz == 0. && self.yz == 0.
    }

    /// Moves the magnitude of the off-diagonal terms onto the diagonal.
    ///
    /// Each diagonal term gains the absolute values of the off-diagonal terms
    /// in its row; the result is diagonal.
    pub fn lumped(&self) -> Self {
        Self {
            xx: self.xx + self.xy.abs() + self.xz.abs(),
            yy: self.yy + self.xy.abs() + self.yz.abs(),
            zz: self.zz + self.xz.abs() + self.yz.abs(),
            ..Self::ZERO
        }
    }
}

impl Add for PermTensor {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            xx: self.xx + other.xx,
            yy: self.yy + other.yy,
            zz: self.zz + other.zz,
            xy: self.xy + other.xy,
            xz: self.xz + other.xz,
            yz: self.yz + other.yz,
        }
    }
}

impl AddAssign for PermTensor {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Mul<f64> for PermTensor {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self {
            xx: self.xx * s,
            yy: self.yy * s,
            zz: self.zz * s,
            xy: self.xy * s,
            xz: self.xz * s,
            yz: self.yz * s,
        }
    }
}
