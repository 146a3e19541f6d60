//! Constructive solid geometry over tagged mesh parts.
//!
//! - [`CsgMeshSequence`] - parts grouped by the pipeline stage that made them
//! - [`slice_csgmesh`] - slice parts and apply the booleans per layer
//! - [`CsgBackend`], [`Voxelizer`] - capabilities producing a merged mesh

mod backend;
mod sequence;
mod slicing;

pub use backend::{CsgBackend, MergeOnlyBackend, NoVoxelizer, VoxelGrid, VoxelParams, Voxelizer};
pub use sequence::{
    is_all_positive, merge_positive_parts, positive_bounding_box, CsgMeshSequence, CsgPart,
    CsgStackOp, CsgStage, CsgType,
};
pub use slicing::slice_csgmesh;
