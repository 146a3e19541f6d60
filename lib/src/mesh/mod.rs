//! Mesh loading and processing.
//!
//! - [`TriangleMesh`] - indexed triangle set with the operations the print
//!   pipeline needs (merging, splitting, welding, lossless simplification)
//! - [`Triangle`] - a single triangle
//! - STL file loading and saving

mod stl;
mod triangle_mesh;

pub use stl::{load_stl, parse_stl, save_stl, save_stl_ascii};
pub use triangle_mesh::{Triangle, TriangleMesh};
