//! Slicing module - cuts meshes into 2D layers.
//!
//! - [`slice_mesh`] - intersects a mesh with a list of horizontal planes
//! - [`MeshSlicingParams`] - fill rule and closing radius for the cut

mod mesh_slicer;
mod slicing_params;

pub use mesh_slicer::{slice_mesh, slice_mesh_at_z};
pub use slicing_params::{MeshSlicingParams, SlicingMode};
