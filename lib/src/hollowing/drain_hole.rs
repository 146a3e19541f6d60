//! Drain holes drilled into hollowed models.

use crate::geometry::{Point3F, Transform3D};
use crate::mesh::TriangleMesh;
use crate::CoordF;
use serde::{Deserialize, Serialize};

/// Length (mm) a hole sticks out of the surface it is placed on.
pub const HOLE_STICK_OUT_LENGTH: CoordF = 1.0;

/// Segments of the cylinder approximating a hole.
pub const DRAIN_HOLE_STEPS: usize = 32;

/// A cylindrical hole starting at `pos` and running along `normal`
/// into the model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DrainHole {
    pub pos: Point3F,
    pub normal: Point3F,
    pub radius: CoordF,
    pub height: CoordF,
}

impl DrainHole {
    pub fn new(pos: Point3F, normal: Point3F, radius: CoordF, height: CoordF) -> Self {
        Self {
            pos,
            normal: normal.normalize(),
            radius,
            height,
        }
    }

    /// The hole in print coordinates, pulled out of the surface by
    /// [`HOLE_STICK_OUT_LENGTH`] and deepened by the same amount.
    pub fn transformed(&self, trafo: &Transform3D) -> Self {
        let normal = trafo.apply_vector(self.normal).normalize();
        let pos = trafo.apply(self.pos) - normal * HOLE_STICK_OUT_LENGTH;
        Self {
            pos,
            normal,
            radius: self.radius,
            height: self.height + HOLE_STICK_OUT_LENGTH,
        }
    }

    /// Closed cylinder mesh of the hole.
    pub fn to_mesh(&self) -> TriangleMesh {
        let mut mesh = TriangleMesh::cylinder(self.radius, self.height, DRAIN_HOLE_STEPS);
        let p = self.pos;
        let trafo = Transform3D::rotation_z_to(self.normal)
            .then(&Transform3D::translation(p.x, p.y, p.z));
        mesh.transform(&trafo);
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transformed_sticks_out() {
        let hole = DrainHole::new(
            Point3F::new(0.0, 0.0, 5.0),
            Point3F::new(0.0, 0.0, -2.0),
            1.0,
            3.0,
        );
        let t = hole.transformed(&Transform3D::translation(10.0, 0.0, 0.0));
        assert!(t.normal.approx_eq(&Point3F::new(0.0, 0.0, -1.0), 1e-9));
        assert!(t.pos.approx_eq(&Point3F::new(10.0, 0.0, 6.0), 1e-9));
        assert!((t.height - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_mesh_follows_normal() {
        let hole = DrainHole::new(Point3F::new(1.0, 2.0, 0.0), Point3F::new(1.0, 0.0, 0.0), 0.5, 4.0);
        let mesh = hole.to_mesh();
        assert_eq!(mesh.triangle_count(), 4 * DRAIN_HOLE_STEPS);
        let bb = mesh.bounding_box();
        assert!((bb.min.x - 1.0).abs() < 1e-6);
        assert!((bb.max.x - 5.0).abs() < 1e-6);
        assert!((bb.max.y - 2.5).abs() < 1e-6);
        assert!(mesh.signed_volume() > 0.0);
    }
}
