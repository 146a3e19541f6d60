//! Interior generation and the legacy hollow-and-drill path.

use super::DrainHole;
use crate::config::SlaPrintObjectConfig;
use crate::mesh::TriangleMesh;
use crate::print::JobController;
use crate::{CoordF, Result};
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Parameters of the interior shell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HollowingConfig {
    /// Minimum wall thickness (mm).
    pub min_thickness: CoordF,
    /// Accuracy, 0..1.
    pub quality: CoordF,
    /// Closing distance (mm).
    pub closing_distance: CoordF,
    pub enabled: bool,
}

impl HollowingConfig {
    pub fn from_object_config(config: &SlaPrintObjectConfig) -> Self {
        Self {
            min_thickness: config.hollowing_min_thickness,
            quality: config.hollowing_quality,
            closing_distance: config.hollowing_closing_distance,
            enabled: config.hollowing_enable,
        }
    }
}

impl Default for HollowingConfig {
    fn default() -> Self {
        Self::from_object_config(&SlaPrintObjectConfig::default())
    }
}

/// Produces the surface of the cavity left inside a hollowed model.
///
/// The returned mesh has outward normals; it is subtracted from the model.
/// An empty mesh means no cavity fits.
pub trait InteriorGenerator: Send + Sync {
    fn generate_interior(
        &self,
        mesh: &TriangleMesh,
        config: &HollowingConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh>;
}

/// Generator that never finds room for a cavity.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoInteriorGenerator;

impl InteriorGenerator for NoInteriorGenerator {
    fn generate_interior(
        &self,
        _mesh: &TriangleMesh,
        _config: &HollowingConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh> {
        ctl.check_cancel()?;
        Ok(TriangleMesh::new())
    }
}

/// Outcome bits of [`HollowAndDrill::hollow_mesh_and_drill`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HollowMeshResult(u8);

impl HollowMeshResult {
    pub const OK: Self = Self(0);
    /// The mesh does not bound a volume.
    pub const FAULTY_MESH: Self = Self(1);
    /// The holes cannot be drilled as configured.
    pub const FAULTY_HOLES: Self = Self(2);
    pub const DRILLING_FAILED: Self = Self(4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for HollowMeshResult {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for HollowMeshResult {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Hollows a mesh with a given interior and drills holes into it, in place.
pub trait HollowAndDrill: Send + Sync {
    /// `on_hole_fail` receives the index of every hole that could not be drilled.
    fn hollow_mesh_and_drill(
        &self,
        mesh: &mut TriangleMesh,
        interior: Option<&TriangleMesh>,
        holes: &[DrainHole],
        on_hole_fail: &mut dyn FnMut(usize),
    ) -> HollowMeshResult;
}

/// Hollows by appending the inverted interior surface. Cannot drill.
#[derive(Clone, Copy, Debug, Default)]
pub struct InteriorMerger;

impl HollowAndDrill for InteriorMerger {
    fn hollow_mesh_and_drill(
        &self,
        mesh: &mut TriangleMesh,
        interior: Option<&TriangleMesh>,
        holes: &[DrainHole],
        on_hole_fail: &mut dyn FnMut(usize),
    ) -> HollowMeshResult {
        let mut result = HollowMeshResult::OK;
        if mesh.is_empty() || mesh.signed_volume() <= 0.0 {
            result |= HollowMeshResult::FAULTY_MESH;
        }

        if let Some(interior) = interior.filter(|i| !i.is_empty()) {
            if result.is_ok() {
                let mut cavity = interior.clone();
                cavity.flip_normals();
                mesh.merge(&cavity);
            }
        }

        if holes.iter().any(|h| h.radius <= 0.0 || h.height <= 0.0) {
            result |= HollowMeshResult::FAULTY_HOLES;
        }
        if !holes.is_empty() {
            for idx in 0..holes.len() {
                on_hole_fail(idx);
            }
            result |= HollowMeshResult::DRILLING_FAILED;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3F;
    use crate::print::CancelToken;

    #[test]
    fn test_result_bits() {
        let r = HollowMeshResult::FAULTY_MESH | HollowMeshResult::DRILLING_FAILED;
        assert!(r.contains(HollowMeshResult::FAULTY_MESH));
        assert!(!r.contains(HollowMeshResult::FAULTY_HOLES));
        assert!(!r.contains(HollowMeshResult::OK));
        assert_eq!(r.bits(), 5);
        assert!(HollowMeshResult::OK.is_ok());
    }

    #[test]
    fn test_interior_merger_hollows() {
        let mut mesh = TriangleMesh::cube(10.0);
        let interior = TriangleMesh::cuboid(Point3F::new(2.0, 2.0, 2.0), Point3F::new(8.0, 8.0, 8.0));
        let mut failed = Vec::new();
        let r = InteriorMerger.hollow_mesh_and_drill(&mut mesh, Some(&interior), &[], &mut |i| {
            failed.push(i)
        });
        assert!(r.is_ok());
        assert!(failed.is_empty());
        assert!((mesh.volume() - (1000.0 - 216.0)).abs() < 1e-6);
    }

    #[test]
    fn test_interior_merger_cannot_drill() {
        let mut mesh = TriangleMesh::cube(10.0);
        let holes = [
            DrainHole::new(Point3F::new(5.0, 5.0, 0.0), Point3F::new(0.0, 0.0, 1.0), 1.0, 2.0),
            DrainHole::new(Point3F::new(2.0, 2.0, 0.0), Point3F::new(0.0, 0.0, 1.0), 0.0, 2.0),
        ];
        let mut failed = Vec::new();
        let r = InteriorMerger.hollow_mesh_and_drill(&mut mesh, None, &holes, &mut |i| failed.push(i));
        assert!(r.contains(HollowMeshResult::DRILLING_FAILED));
        assert!(r.contains(HollowMeshResult::FAULTY_HOLES));
        assert_eq!(failed, vec![0, 1]);
    }

    #[test]
    fn test_faulty_mesh() {
        let mut mesh = TriangleMesh::cube(10.0);
        mesh.flip_normals();
        let r = InteriorMerger.hollow_mesh_and_drill(&mut mesh, None, &[], &mut |_| {});
        assert_eq!(r, HollowMeshResult::FAULTY_MESH);
    }

    #[test]
    fn test_no_interior_generator() {
        let cancel = CancelToken::new();
        let ctl = JobController::new(&cancel);
        let interior = NoInteriorGenerator
            .generate_interior(&TriangleMesh::cube(10.0), &HollowingConfig::default(), &ctl)
            .unwrap();
        assert!(interior.is_empty());

        cancel.cancel();
        assert!(NoInteriorGenerator
            .generate_interior(&TriangleMesh::cube(10.0), &HollowingConfig::default(), &ctl)
            .is_err());
    }
}
