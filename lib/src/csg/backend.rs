//! Capabilities that evaluate a CSG sequence into one mesh.
//!
//! The pipeline only needs the merged mesh for preview; slicing works on
//! the parts directly (see [`slice_csgmesh`](super::slice_csgmesh)).

use super::{is_all_positive, merge_positive_parts, CsgPart, CsgType};
use crate::geometry::Point3F;
use crate::mesh::TriangleMesh;
use crate::{CoordF, Error, Result};

/// Exact boolean evaluation of a part sequence.
pub trait CsgBackend: Send + Sync {
    /// Index of the first part the backend cannot handle, if any.
    fn check_eligibility(&self, parts: &[CsgPart]) -> Option<usize>;

    /// Evaluate the sequence. Any error makes the caller try a fallback.
    fn perform_booleans(&self, parts: &[CsgPart]) -> Result<TriangleMesh>;
}

/// Backend without a boolean kernel: unions are concatenated, every other
/// operation is reported as ineligible.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeOnlyBackend;

impl CsgBackend for MergeOnlyBackend {
    fn check_eligibility(&self, parts: &[CsgPart]) -> Option<usize> {
        parts.iter().position(|p| p.operation != CsgType::Union)
    }

    fn perform_booleans(&self, parts: &[CsgPart]) -> Result<TriangleMesh> {
        if !is_all_positive(parts) {
            return Err(Error::Capability(
                "boolean operations other than union are not supported".into(),
            ));
        }
        Ok(merge_positive_parts(parts))
    }
}

/// Voxelization parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelParams {
    /// Voxels per millimetre.
    pub voxel_scale: CoordF,
    pub exterior_bandwidth: CoordF,
    pub interior_bandwidth: CoordF,
}

impl Default for VoxelParams {
    fn default() -> Self {
        Self {
            voxel_scale: 1.0,
            exterior_bandwidth: 1.0,
            interior_bandwidth: 1.0,
        }
    }
}

/// Dense signed distance grid. Negative values are inside.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VoxelGrid {
    pub origin: Point3F,
    /// Edge length of one voxel (mm).
    pub voxel_size: CoordF,
    pub dims: [usize; 3],
    pub values: Vec<f32>,
}

impl VoxelGrid {
    pub fn new(origin: Point3F, voxel_size: CoordF, dims: [usize; 3], background: f32) -> Self {
        Self {
            origin,
            voxel_size,
            dims,
            values: vec![background; dims[0] * dims[1] * dims[2]],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        if x >= self.dims[0] || y >= self.dims[1] || z >= self.dims[2] {
            return None;
        }
        self.values.get(self.index(x, y, z)).copied()
    }
}

/// Approximate boolean evaluation through a volumetric grid.
pub trait Voxelizer: Send + Sync {
    fn voxelize(
        &self,
        parts: &[CsgPart],
        params: &VoxelParams,
        cancel: &(dyn Fn() -> bool + Sync),
    ) -> Result<VoxelGrid>;

    /// Extract the iso-surface at `iso_value`.
    fn grid_to_mesh(&self, grid: &VoxelGrid, iso_value: f64, adaptivity: f64)
        -> Result<TriangleMesh>;
}

/// Placeholder used when no voxel engine is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoVoxelizer;

impl Voxelizer for NoVoxelizer {
    fn voxelize(
        &self,
        _parts: &[CsgPart],
        _params: &VoxelParams,
        _cancel: &(dyn Fn() -> bool + Sync),
    ) -> Result<VoxelGrid> {
        Err(Error::Capability("no voxelizer available".into()))
    }

    fn grid_to_mesh(
        &self,
        _grid: &VoxelGrid,
        _iso_value: f64,
        _adaptivity: f64,
    ) -> Result<TriangleMesh> {
        Err(Error::Capability("no voxelizer available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_merge_only_backend() {
        let cube = Arc::new(TriangleMesh::cube(1.0));
        let positive = vec![
            CsgPart::new(cube.clone(), CsgType::Union),
            CsgPart::new(cube.clone(), CsgType::Union),
        ];
        let backend = MergeOnlyBackend;
        assert_eq!(backend.check_eligibility(&positive), None);
        assert_eq!(backend.perform_booleans(&positive).unwrap().triangle_count(), 24);

        let mixed = vec![
            CsgPart::new(cube.clone(), CsgType::Union),
            CsgPart::new(cube, CsgType::Difference),
        ];
        assert_eq!(backend.check_eligibility(&mixed), Some(1));
        assert!(backend.perform_booleans(&mixed).is_err());
    }

    #[test]
    fn test_voxel_grid_indexing() {
        let mut grid = VoxelGrid::new(Point3F::zero(), 0.5, [2, 3, 4], 1.0);
        assert_eq!(grid.values.len(), 24);
        let idx = grid.index(1, 2, 3);
        grid.values[idx] = -1.0;
        assert_eq!(grid.get(1, 2, 3), Some(-1.0));
        assert_eq!(grid.get(2, 0, 0), None);
    }

    #[test]
    fn test_no_voxelizer_fails() {
        let v = NoVoxelizer;
        assert!(v.voxelize(&[], &VoxelParams::default(), &|| false).is_err());
    }
}
