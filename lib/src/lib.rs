//! # SLA Slicer
//!
//! A staged, resumable SLA (resin) print pipeline.
//!
//! The library turns a model object graph plus printer/material/object
//! configuration into:
//! - per-object model and support slices aligned on a common height grid
//! - an optional base pad and support tree
//! - a global table of print layers ready for rasterization
//! - print statistics (material volumes, estimated time, fast/slow layers)
//!
//! ## Example
//!
//! ```rust,ignore
//! use sla_slicer::config::PrintConfig;
//! use sla_slicer::mesh::load_stl;
//! use sla_slicer::print::{ModelObject, Print};
//!
//! let mesh = load_stl("model.stl")?;
//! let mut print = Print::new(PrintConfig::default());
//! print.add_object(ModelObject::from_mesh("model", mesh));
//! print.process()?;
//! println!("{}", print.statistics());
//! ```

pub mod clipper;
pub mod config;
pub mod csg;
pub mod geometry;
pub mod hollowing;
pub mod mesh;
pub mod print;
pub mod raster;
pub mod slice;
pub mod support;

pub use config::{PrintConfig, SlaMaterialConfig, SlaPrintObjectConfig, SlaPrinterConfig};
pub use csg::{CsgMeshSequence, CsgPart, CsgStackOp, CsgType};
pub use geometry::{BoundingBox, BoundingBox3F, ExPolygon, ExPolygons, Point, Point3F, Polygon};
pub use mesh::{Triangle, TriangleMesh};
pub use print::{
    Capabilities, Instance, ModelObject, ModelVolume, ObjectStep, Print, PrintLayer, PrintObject,
    PrintStatistics, PrintStep, SliceIndex, SliceOrigin, SliceRecord, VolumeKind,
};
pub use slice::{slice_mesh, MeshSlicingParams, SlicingMode};

/// Coordinate type used throughout the slicer.
/// Using i64 for integer coordinates (scaled by SCALING_FACTOR) to avoid floating-point issues.
pub type Coord = i64;

/// Floating-point coordinate type for unscaled values.
pub type CoordF = f64;

/// Scaling factor: coordinates are stored as integers scaled by this factor.
/// 1 unit = 1 nanometer, so 1mm = 1_000_000 units.
pub const SCALING_FACTOR: f64 = 1_000_000.0;

/// Small length (mm) used to snap levels and discard degenerate geometry.
pub const EPSILON: CoordF = 1e-4;

/// [`EPSILON`] in scaled units.
pub const SCALED_EPSILON: Coord = 100;

/// Scale a floating-point coordinate to integer.
#[inline]
pub fn scale(v: CoordF) -> Coord {
    (v * SCALING_FACTOR).round() as Coord
}

/// Unscale an integer coordinate to floating-point.
#[inline]
pub fn unscale(v: Coord) -> CoordF {
    v as CoordF / SCALING_FACTOR
}

/// Scale a floating-point coordinate to integer (same as scale, for compatibility).
#[inline]
pub fn scaled(v: CoordF) -> Coord {
    scale(v)
}

/// Unscale an integer coordinate to floating-point (same as unscale, for compatibility).
#[inline]
pub fn unscaled(v: Coord) -> CoordF {
    unscale(v)
}

/// Result type used throughout the slicer.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for slicer operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Mesh error: {0}")]
    Mesh(String),

    /// User-facing slicing failure. The message is surfaced unchanged.
    #[error("{0}")]
    Slicing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    /// An external capability (boolean kernel, voxelizer, ...) failed.
    #[error("Capability failed: {0}")]
    Capability(String),

    #[error("Cancelled")]
    Cancelled,
}

impl Error {
    /// True for the cooperative cancellation signal.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
