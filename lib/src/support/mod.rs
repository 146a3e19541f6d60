//! SLA support structures.
//!
//! - [`SupportPointGenerator`] - places the points struts attach to
//! - [`SupportTreeBuilder`] - builds the tree and the pad under a model
//! - [`SupportData`] - per-object support state kept by the pipeline

mod support_data;
mod support_point;
mod tree;

pub use support_data::{SupportData, SupportableMesh};
pub use support_point::{
    GridSupportPointGenerator, SupportPoint, SupportPointConfig, SupportPointGenerator,
    DEFAULT_POINT_SPACING,
};
pub use tree::{
    validate_pad, EmbedObject, PadConfig, PillarMeshBuilder, PillarTreeBuilder, SupportTreeBuilder,
    SupportTreeConfig, MIN_BRIM_SIZE, PILLAR_SEGMENTS,
};
