//! Geometry primitives for the slicer.
//!
//! - [`Point`] - 2D point with scaled integer coordinates
//! - [`Point3F`] - 3D point in millimetres (meshes, support points)
//! - [`Polygon`] - Closed polygon
//! - [`ExPolygon`] - Polygon with holes, the unit every slice is made of
//! - [`BoundingBox`] and [`BoundingBox3F`] - Axis-aligned bounding boxes
//! - [`Transform3D`] - Affine transforms of volumes and instances
//!
//! ## Coordinate System
//!
//! Slices use scaled integer coordinates, scaled by `SCALING_FACTOR`
//! (1,000,000), so 1 unit = 1 nanometer. Meshes stay in millimetres.

mod bounding_box;
pub mod elephant_foot;
mod expolygon;
mod point;
mod polygon;
mod transform;

pub use bounding_box::{BoundingBox, BoundingBox3F};
pub use elephant_foot::{elephant_foot_compensation, faded_compensation};
pub use expolygon::{expolygons_area, expolygons_contain, ExPolygon, ExPolygons};
pub use point::{Point, Point3F, Points, Points3F};
pub use polygon::{Polygon, Polygons};
pub use transform::Transform3D;
