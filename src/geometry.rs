//! Patient-space geometry of slices and volumes.

use std::ops::{Add, Mul, Sub};

use ndarray::Array2;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [x, y, z, ..] => Some(Self::new(*x, *y, *z)),
            _ => None,
        }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).norm()
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Rotation plus translation. The rotation columns are the row direction,
/// the column direction and their cross product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: [Vec3; 3],
    pub translation: Vec3,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            rotation: [
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
            translation: Vec3::default(),
        }
    }
}

impl RigidTransform {
    /// Builds a pose from Image Orientation (Patient) and Image Position
    /// (Patient).
    pub fn from_cosines(cosines: [f64; 6], position: Vec3) -> Self {
        let row = Vec3::new(cosines[0], cosines[1], cosines[2]);
        let column = Vec3::new(cosines[3], cosines[4], cosines[5]);
        Self {
            rotation: [row, column, row.cross(column)],
            translation: position,
        }
    }

    /// The slice normal.
    pub fn z_axis(&self) -> Vec3 {
        self.rotation[2]
    }

    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.translation
            + self.rotation[0] * point.x
            + self.rotation[1] * point.y
            + self.rotation[2] * point.z
    }

    /// Scales each rotation column by the matching voxel size.
    pub fn scaled(&self, x: f64, y: f64, z: f64) -> AffineTransform {
        AffineTransform {
            columns: [self.rotation[0] * x, self.rotation[1] * y, self.rotation[2] * z],
            translation: self.translation,
        }
    }
}

/// Voxel index to patient coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub columns: [Vec3; 3],
    pub translation: Vec3,
}

impl AffineTransform {
    pub fn apply(&self, voxel: Vec3) -> Vec3 {
        self.translation + self.columns[0] * voxel.x + self.columns[1] * voxel.y + self.columns[2] * voxel.z
    }

    /// Row-major 4x4 matrix.
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let [a, b, c] = self.columns;
        let t = self.translation;
        [
            [a.x, b.x, c.x, t.x],
            [a.y, b.y, c.y, t.y],
            [a.z, b.z, c.z, t.z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    pub fn to_homogeneous(&self) -> Array2<f64> {
        let rows = self.to_rows();
        Array2::from_shape_fn((4, 4), |(r, c)| rows[r][c])
    }
}
