//! Hollowing of models and drilling of drain holes.
//!
//! Both are capabilities consumed by the print pipeline; the defaults here
//! are simple stand-ins for a real volumetric engine.

mod drain_hole;
mod interior;

pub use drain_hole::{DrainHole, DRAIN_HOLE_STEPS, HOLE_STICK_OUT_LENGTH};
pub use interior::{
    HollowAndDrill, HollowMeshResult, HollowingConfig, InteriorGenerator, InteriorMerger,
    NoInteriorGenerator,
};
