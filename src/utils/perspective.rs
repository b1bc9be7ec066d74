use nalgebra::{Matrix3, Vector3};
use tracing::warn;

use crate::utils::Point;

const DEGENERATE_W: f32 = 1e-6;

/// Planar homography mapping camera-frame coordinates onto stage coordinates.
///
/// The matrix is calibration data: it is built once from configuration and only
/// ever read while processing positions.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveTransform {
    matrix: Matrix3<f32>,
}

impl PerspectiveTransform {
    pub fn identity() -> Self {
        PerspectiveTransform {
            matrix: Matrix3::identity(),
        }
    }
    /// Builds transform from row-major 3x3 matrix
    ///
    /// Basic usage:
    ///
    /// ```
    /// use stage_blobs_rs::utils::{PerspectiveTransform, Point};
    /// let shift = PerspectiveTransform::from_rows([
    ///     [1.0, 0.0, 10.0],
    ///     [0.0, 1.0, -5.0],
    ///     [0.0, 0.0, 1.0],
    /// ]);
    /// assert_eq!(shift.apply(&Point::new(1.0, 1.0)), Point::new(11.0, -4.0));
    /// ```
    pub fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        PerspectiveTransform {
            matrix: Matrix3::from_fn(|r, c| rows[r][c]),
        }
    }
    pub fn is_invertible(&self) -> bool {
        self.matrix.determinant().abs() > DEGENERATE_W
    }
    /// Projects point through the homography. Points mapped to the line at
    /// infinity are returned untouched.
    pub fn apply(&self, p: &Point) -> Point {
        let v = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < DEGENERATE_W {
            warn!(x = p.x, y = p.y, "perspective projection is degenerate, keeping raw point");
            return *p;
        }
        Point::new(v.x / v.z, v.y / v.z)
    }
}

impl Default for PerspectiveTransform {
    fn default() -> Self {
        PerspectiveTransform::identity()
    }
}
