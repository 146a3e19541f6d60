//! Support points and their automatic placement.
//!
//! The default generator walks the model slices bottom-up and sprinkles a
//! grid of points over every area that is not resting on the layer below.

use crate::clipper::{difference, intersection, offset_expolygons, OffsetJoinType};
use crate::geometry::{BoundingBox, ExPolygon, ExPolygons, Point, Point3F};
use crate::mesh::TriangleMesh;
use crate::print::JobController;
use crate::{scale, CoordF, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Point spacing (mm) at 100 % density.
pub const DEFAULT_POINT_SPACING: CoordF = 4.0;

/// Where a support strut touches the model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportPoint {
    pub pos: Point3F,
    pub head_front_radius: CoordF,
    /// The point holds up the lowest layer of an island.
    pub is_new_island: bool,
}

impl SupportPoint {
    pub fn new(pos: Point3F, head_front_radius: CoordF, is_new_island: bool) -> Self {
        Self {
            pos,
            head_front_radius,
            is_new_island,
        }
    }
}

/// Placement parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportPointConfig {
    /// Density as a fraction, 1.0 is the default density.
    pub density_relative: CoordF,
    /// Minimal distance (mm) between points.
    pub minimal_distance: CoordF,
    pub head_diameter: CoordF,
}

impl SupportPointConfig {
    /// Grid spacing derived from density and minimal distance.
    pub fn spacing(&self) -> CoordF {
        (DEFAULT_POINT_SPACING / self.density_relative.max(0.01)).max(self.minimal_distance)
    }
}

impl Default for SupportPointConfig {
    fn default() -> Self {
        Self {
            density_relative: 1.0,
            minimal_distance: 1.0,
            head_diameter: 0.4,
        }
    }
}

/// Places support points on a model.
pub trait SupportPointGenerator: Send + Sync {
    /// `slices[i]` is the model cut at `heights[i]`.
    fn generate(
        &self,
        mesh: &TriangleMesh,
        slices: &[ExPolygons],
        heights: &[CoordF],
        config: &SupportPointConfig,
        ctl: &JobController<'_>,
    ) -> Result<Vec<SupportPoint>>;
}

/// Grid sprinkling over the unsupported part of every island.
#[derive(Clone, Copy, Debug, Default)]
pub struct GridSupportPointGenerator;

impl GridSupportPointGenerator {
    fn sprinkle(region: &ExPolygon, spacing: CoordF) -> Vec<Point> {
        let bb = region.bounding_box();
        let step = scale(spacing).max(1);
        let mut points = Vec::new();
        let mut y = bb.min.y + step / 2;
        while y <= bb.max.y {
            let mut x = bb.min.x + step / 2;
            while x <= bb.max.x {
                let p = Point::new(x, y);
                if region.contains_point(&p) {
                    points.push(p);
                }
                x += step;
            }
            y += step;
        }
        points
    }

    /// Some point inside the region: the bbox center if it is inside,
    /// otherwise the first contour vertex.
    fn inner_point(region: &ExPolygon) -> Option<Point> {
        let bb: BoundingBox = region.bounding_box();
        let center = Point::new((bb.min.x + bb.max.x) / 2, (bb.min.y + bb.max.y) / 2);
        if region.contains_point(&center) {
            return Some(center);
        }
        region.contour.points().first().copied()
    }
}

impl SupportPointGenerator for GridSupportPointGenerator {
    fn generate(
        &self,
        _mesh: &TriangleMesh,
        slices: &[ExPolygons],
        heights: &[CoordF],
        config: &SupportPointConfig,
        ctl: &JobController<'_>,
    ) -> Result<Vec<SupportPoint>> {
        let spacing = config.spacing();
        let head_radius = config.head_diameter / 2.0;
        let mut points = Vec::new();
        let empty = ExPolygons::new();

        for (i, (layer, &z)) in slices.iter().zip(heights.iter()).enumerate() {
            ctl.check_cancel()?;
            let below = if i == 0 { &empty } else { &slices[i - 1] };
            // Self-supporting overhang allowance of one layer height.
            let allowance = if i == 0 { 0.0 } else { z - heights[i - 1] };
            let supported = offset_expolygons(below, allowance, OffsetJoinType::Square);

            for island in layer {
                let island = std::slice::from_ref(island);
                let is_new_island = intersection(island, below).is_empty();
                let overhangs = difference(island, &supported);
                let mut placed = 0;
                for region in &overhangs {
                    for p in Self::sprinkle(region, spacing) {
                        let (x, y) = p.to_mm();
                        points.push(SupportPoint::new(
                            Point3F::new(x, y, z),
                            head_radius,
                            is_new_island,
                        ));
                        placed += 1;
                    }
                }
                if placed == 0 && is_new_island {
                    if let Some(p) = Self::inner_point(&island[0]) {
                        let (x, y) = p.to_mm();
                        points.push(SupportPoint::new(Point3F::new(x, y, z), head_radius, true));
                    }
                }
            }

            ctl.report(100.0 * (i + 1) as f64 / slices.len() as f64, "");
        }

        debug!("Placed {} support points", points.len());
        Ok(points)
    }
}
