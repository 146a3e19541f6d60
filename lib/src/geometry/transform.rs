//! 3D affine transforms for model volumes, instances and drain holes.

use super::Point3F;
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 3D affine transformation matrix.
///
/// Represented as a 4x4 matrix in homogeneous coordinates.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    /// The 4x4 matrix stored in column-major order.
    /// [m00, m10, m20, m30, m01, m11, m21, m31, m02, m12, m22, m32, m03, m13, m23, m33]
    pub matrix: [CoordF; 16],
}

impl Transform3D {
    pub fn identity() -> Self {
        Self {
            matrix: [
                1.0, 0.0, 0.0, 0.0, // Column 0
                0.0, 1.0, 0.0, 0.0, // Column 1
                0.0, 0.0, 1.0, 0.0, // Column 2
                0.0, 0.0, 0.0, 1.0, // Column 3
            ],
        }
    }

    pub fn translation(tx: CoordF, ty: CoordF, tz: CoordF) -> Self {
        let mut t = Self::identity();
        t.set(0, 3, tx);
        t.set(1, 3, ty);
        t.set(2, 3, tz);
        t
    }

    pub fn scaling(sx: CoordF, sy: CoordF, sz: CoordF) -> Self {
        let mut t = Self::identity();
        t.set(0, 0, sx);
        t.set(1, 1, sy);
        t.set(2, 2, sz);
        t
    }

    /// Rotation around the Z axis (radians, counter-clockwise seen from above).
    pub fn rotation_z(angle: CoordF) -> Self {
        let (sin_a, cos_a) = angle.sin_cos();
        let mut t = Self::identity();
        t.set(0, 0, cos_a);
        t.set(0, 1, -sin_a);
        t.set(1, 0, sin_a);
        t.set(1, 1, cos_a);
        t
    }

    /// Rotation that maps the +Z axis onto `dir` (Rodrigues' formula).
    ///
    /// A zero direction yields the identity.
    pub fn rotation_z_to(dir: Point3F) -> Self {
        let d = dir.normalize();
        if d.length() == 0.0 {
            return Self::identity();
        }
        let z = Point3F::new(0.0, 0.0, 1.0);
        let cos_a = z.dot(&d);
        if cos_a > 1.0 - 1e-12 {
            return Self::identity();
        }
        if cos_a < -1.0 + 1e-12 {
            // Half turn around X keeps the result right-handed.
            return Self::scaling(1.0, -1.0, -1.0);
        }
        let axis = z.cross(&d).normalize();
        let sin_a = (1.0 - cos_a * cos_a).sqrt();
        let one_c = 1.0 - cos_a;
        let (x, y, zz) = (axis.x, axis.y, axis.z);

        let mut t = Self::identity();
        t.set(0, 0, cos_a + x * x * one_c);
        t.set(0, 1, x * y * one_c - zz * sin_a);
        t.set(0, 2, x * zz * one_c + y * sin_a);
        t.set(1, 0, y * x * one_c + zz * sin_a);
        t.set(1, 1, cos_a + y * y * one_c);
        t.set(1, 2, y * zz * one_c - x * sin_a);
        t.set(2, 0, zz * x * one_c - y * sin_a);
        t.set(2, 1, zz * y * one_c + x * sin_a);
        t.set(2, 2, cos_a + zz * zz * one_c);
        t
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> CoordF {
        self.matrix[col * 4 + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: CoordF) {
        self.matrix[col * 4 + row] = value;
    }

    /// Multiply this transform by another (compose transformations).
    /// Returns a transform that first applies self, then other.
    /// Mathematically: result = other * self (so result.apply(p) == other.apply(self.apply(p)))
    pub fn then(&self, other: &Transform3D) -> Self {
        let mut result = Self::identity();
        for i in 0..4 {
            for j in 0..4 {
                let mut sum = 0.0;
                for k in 0..4 {
                    sum += other.get(i, k) * self.get(k, j);
                }
                result.set(i, j, sum);
            }
        }
        result
    }

    /// Apply this transform to a point.
    pub fn apply(&self, p: Point3F) -> Point3F {
        let v = self.apply_vector(p);
        Point3F::new(
            v.x + self.get(0, 3),
            v.y + self.get(1, 3),
            v.z + self.get(2, 3),
        )
    }

    /// Apply only the linear part (no translation), e.g. to a direction.
    pub fn apply_vector(&self, v: Point3F) -> Point3F {
        Point3F::new(
            self.get(0, 0) * v.x + self.get(0, 1) * v.y + self.get(0, 2) * v.z,
            self.get(1, 0) * v.x + self.get(1, 1) * v.y + self.get(1, 2) * v.z,
            self.get(2, 0) * v.x + self.get(2, 1) * v.y + self.get(2, 2) * v.z,
        )
    }

    pub fn translation_component(&self) -> Point3F {
        Point3F::new(self.get(0, 3), self.get(1, 3), self.get(2, 3))
    }

    /// Angle of the transformed X axis around Z, in radians.
    pub fn z_rotation_angle(&self) -> CoordF {
        self.get(1, 0).atan2(self.get(0, 0))
    }

    /// Determinant of the 3x3 rotation/scale part.
    pub fn determinant_3x3(&self) -> CoordF {
        self.get(0, 0) * (self.get(1, 1) * self.get(2, 2) - self.get(1, 2) * self.get(2, 1))
            - self.get(0, 1) * (self.get(1, 0) * self.get(2, 2) - self.get(1, 2) * self.get(2, 0))
            + self.get(0, 2) * (self.get(1, 0) * self.get(2, 1) - self.get(1, 1) * self.get(2, 0))
    }

    /// A reflection flips triangle winding and polygon orientation.
    #[inline]
    pub fn has_reflection(&self) -> bool {
        self.determinant_3x3() < 0.0
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl fmt::Debug for Transform3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform3D(")?;
        for i in 0..4 {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(
                f,
                "[{:.4}, {:.4}, {:.4}, {:.4}]",
                self.get(i, 0),
                self.get(i, 1),
                self.get(i, 2),
                self.get(i, 3)
            )?;
        }
        write!(f, ")")
    }
}
