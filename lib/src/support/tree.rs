//! Support tree and pad construction.
//!
//! The default builder drops a straight pillar from every support point to
//! the ground and lays a rectangular slab pad under the footprint.

use super::{SupportPoint, SupportableMesh};
use crate::config::SlaPrintObjectConfig;
use crate::geometry::{BoundingBox3F, Point3F};
use crate::mesh::TriangleMesh;
use crate::print::JobController;
use crate::{CoordF, Result, EPSILON};
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Segments of every pillar ring.
pub const PILLAR_SEGMENTS: usize = 16;

/// Smallest brim (mm) a walled pad can have.
pub const MIN_BRIM_SIZE: CoordF = 0.1;

/// Geometry of the support tree.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupportTreeConfig {
    pub enabled: bool,
    pub head_front_radius: CoordF,
    pub head_penetration: CoordF,
    /// Length of the head cone.
    pub head_width: CoordF,
    pub pillar_radius: CoordF,
    pub base_radius: CoordF,
    pub base_height: CoordF,
    pub critical_angle: CoordF,
    pub max_bridge_length: CoordF,
    /// Gap between the ground of the tree and the model bottom.
    pub object_elevation: CoordF,
}

impl SupportTreeConfig {
    pub fn from_object_config(config: &SlaPrintObjectConfig) -> Self {
        Self {
            enabled: config.supports_enable,
            head_front_radius: config.support_head_front_diameter / 2.0,
            head_penetration: config.support_head_penetration,
            head_width: config.support_head_width,
            pillar_radius: config.support_pillar_diameter / 2.0,
            base_radius: config.support_base_diameter / 2.0,
            base_height: config.support_base_height,
            critical_angle: config.support_critical_angle.to_radians(),
            max_bridge_length: config.support_max_bridge_length,
            object_elevation: if config.is_zero_elevation() || !config.supports_enable {
                0.0
            } else {
                config.support_object_elevation
            },
        }
    }
}

impl Default for SupportTreeConfig {
    fn default() -> Self {
        Self::from_object_config(&SlaPrintObjectConfig::default())
    }
}

/// Settings of the pad printed around the object in zero elevation mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedObject {
    pub enabled: bool,
    pub everywhere: bool,
    pub object_gap: CoordF,
    pub stick_stride: CoordF,
    pub stick_width: CoordF,
    pub stick_penetration: CoordF,
}

/// Geometry of the pad.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PadConfig {
    pub wall_thickness: CoordF,
    pub wall_height: CoordF,
    pub brim_size: CoordF,
    pub max_merge_distance: CoordF,
    /// Wall slope in radians.
    pub wall_slope: CoordF,
    pub embed_object: EmbedObject,
}

impl PadConfig {
    pub fn from_object_config(config: &SlaPrintObjectConfig) -> Self {
        Self {
            wall_thickness: config.pad_wall_thickness,
            wall_height: config.pad_wall_height,
            brim_size: config.pad_brim_size,
            max_merge_distance: config.pad_max_merge_distance,
            wall_slope: config.pad_wall_slope.to_radians(),
            embed_object: EmbedObject {
                enabled: config.pad_around_object,
                everywhere: config.pad_around_object_everywhere,
                object_gap: config.pad_object_gap,
                stick_stride: config.pad_object_connector_stride,
                stick_width: config.pad_object_connector_width,
                stick_penetration: config.pad_object_connector_penetration,
            },
        }
    }

    pub fn full_height(&self) -> CoordF {
        self.wall_thickness + self.wall_height
    }

    /// Horizontal reach (mm) of the sloped wall.
    pub fn bottom_offset(&self) -> CoordF {
        let slope = self.wall_slope.tan();
        if slope <= 0.0 || !slope.is_finite() {
            return 0.0;
        }
        self.wall_height / slope
    }

    /// Reject configurations no pad can be built for.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.wall_thickness <= 0.0 {
            return Err("Pad wall thickness must be positive.".into());
        }
        if self.wall_height > 0.0
            && (self.brim_size < MIN_BRIM_SIZE
                || self.bottom_offset() > self.brim_size + self.wall_thickness)
        {
            return Err("Pad brim size is too small for the current configuration.".into());
        }
        Ok(())
    }
}

impl Default for PadConfig {
    fn default() -> Self {
        Self::from_object_config(&SlaPrintObjectConfig::default())
    }
}

/// True if `pad` is usable with `config`. Only a pad around the object
/// that is not forced everywhere may come out empty.
pub fn validate_pad(pad: &TriangleMesh, config: &PadConfig) -> bool {
    !pad.is_empty() || (config.embed_object.enabled && !config.embed_object.everywhere)
}

/// Builds the support structure under a model.
pub trait SupportTreeBuilder: Send + Sync {
    fn build_tree(
        &self,
        input: &SupportableMesh,
        config: &SupportTreeConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh>;

    fn build_pad(
        &self,
        input: &SupportableMesh,
        tree: &TriangleMesh,
        tree_config: &SupportTreeConfig,
        config: &PadConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh>;
}

/// Accumulates vertical pillars, each a stack of rings closed at both ends.
pub struct PillarMeshBuilder {
    mesh: TriangleMesh,
    segments: usize,
    pillar_count: usize,
}

impl PillarMeshBuilder {
    pub fn new(segments: usize) -> Self {
        Self {
            mesh: TriangleMesh::new(),
            segments: segments.max(3),
            pillar_count: 0,
        }
    }

    /// Add a pillar at `(x, y)` from `(z, radius)` rings listed bottom-up.
    pub fn add_profile(&mut self, x: CoordF, y: CoordF, profile: &[(CoordF, CoordF)]) {
        if profile.len() < 2 || profile.windows(2).any(|w| w[1].0 <= w[0].0) {
            return;
        }

        let bottom_center = self.mesh.add_vertex(Point3F::new(x, y, profile[0].0));
        let mut prev_ring: Option<(usize, usize)> = None;
        for &(z, radius) in profile {
            let ring = self.discretize_circle(x, y, z, radius);
            match prev_ring {
                None => self.triangulate_fan_bottom(bottom_center as usize, ring),
                Some(prev) => self.triangulate_strip(prev, ring),
            }
            prev_ring = Some(ring);
        }
        if let (Some(ring), Some(&(z_top, _))) = (prev_ring, profile.last()) {
            let top_center = self.mesh.add_vertex(Point3F::new(x, y, z_top));
            self.triangulate_fan_top(top_center as usize, ring);
        }
        self.pillar_count += 1;
    }

    pub fn pillar_count(&self) -> usize {
        self.pillar_count
    }

    pub fn finish(self) -> TriangleMesh {
        self.mesh
    }

    fn discretize_circle(&mut self, x: CoordF, y: CoordF, z: CoordF, radius: CoordF) -> (usize, usize) {
        let begin = self.mesh.vertex_count();
        let step = 2.0 * PI / self.segments as f64;
        for i in 0..self.segments {
            let (sin_a, cos_a) = (step * i as f64).sin_cos();
            self.mesh
                .add_vertex(Point3F::new(x + radius * cos_a, y + radius * sin_a, z));
        }
        (begin, self.mesh.vertex_count())
    }

    fn triangulate_fan_bottom(&mut self, ifan: usize, (begin, end): (usize, usize)) {
        let n = end - begin;
        for i in 0..n {
            let u = begin + i;
            let v = begin + (i + 1) % n;
            self.mesh.add_triangle_indices(ifan as u32, v as u32, u as u32);
        }
    }

    fn triangulate_fan_top(&mut self, ifan: usize, (begin, end): (usize, usize)) {
        let n = end - begin;
        for i in 0..n {
            let u = begin + i;
            let v = begin + (i + 1) % n;
            self.mesh.add_triangle_indices(ifan as u32, u as u32, v as u32);
        }
    }

    /// Rings of equal size, `lower` below `upper`.
    fn triangulate_strip(&mut self, lower: (usize, usize), upper: (usize, usize)) {
        let n = lower.1 - lower.0;
        for i in 0..n {
            let j = (i + 1) % n;
            let (li, lj) = ((lower.0 + i) as u32, (lower.0 + j) as u32);
            let (hi, hj) = ((upper.0 + i) as u32, (upper.0 + j) as u32);
            self.mesh.add_triangle_indices(li, lj, hj);
            self.mesh.add_triangle_indices(li, hj, hi);
        }
    }
}

/// Pillars straight down from every point, slab pad.
#[derive(Clone, Copy, Debug, Default)]
pub struct PillarTreeBuilder;

impl PillarTreeBuilder {
    fn pillar_profile(
        point: &SupportPoint,
        ground: CoordF,
        config: &SupportTreeConfig,
    ) -> Vec<(CoordF, CoordF)> {
        let z = point.pos.z;
        let top = z + config.head_penetration;
        let head_radius = point.head_front_radius.max(config.head_front_radius).max(EPSILON);
        let neck = z - config.head_width;
        let base_top = ground + config.base_height;

        if neck > base_top + EPSILON {
            vec![
                (ground, config.base_radius),
                (base_top, config.pillar_radius),
                (neck, config.pillar_radius),
                (top, head_radius),
            ]
        } else {
            vec![(ground, config.pillar_radius), (top, head_radius)]
        }
    }
}

impl SupportTreeBuilder for PillarTreeBuilder {
    fn build_tree(
        &self,
        input: &SupportableMesh,
        config: &SupportTreeConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh> {
        let ground = input.ground_level(config);
        let mut builder = PillarMeshBuilder::new(PILLAR_SEGMENTS);
        let count = input.points.len().max(1);

        for (i, point) in input.points.iter().enumerate() {
            ctl.check_cancel()?;
            if point.pos.z <= ground + EPSILON {
                continue;
            }
            let profile = Self::pillar_profile(point, ground, config);
            builder.add_profile(point.pos.x, point.pos.y, &profile);
            ctl.report(100.0 * (i + 1) as f64 / count as f64, "Building pillars");
        }

        debug!("Built {} support pillars", builder.pillar_count());
        Ok(builder.finish())
    }

    fn build_pad(
        &self,
        input: &SupportableMesh,
        tree: &TriangleMesh,
        tree_config: &SupportTreeConfig,
        config: &PadConfig,
        ctl: &JobController<'_>,
    ) -> Result<TriangleMesh> {
        ctl.check_cancel()?;
        let ground = input.ground_level(tree_config);
        let model_bb = input.mesh.bounding_box();

        let mut pad = TriangleMesh::new();
        if config.embed_object.enabled {
            if !model_bb.is_defined() {
                return Ok(pad);
            }
            let gap = config.embed_object.object_gap;
            let inner = grow_xy(&model_bb, gap);
            let outer = grow_xy(&inner, config.brim_size + config.wall_thickness);
            add_frame(&mut pad, &outer, &inner, ground, ground + config.wall_thickness);
        } else {
            let mut footprint = tree.bounding_box();
            if !footprint.is_defined() {
                footprint = model_bb;
            }
            if !footprint.is_defined() {
                return Ok(pad);
            }
            let slab = grow_xy(&footprint, config.brim_size);
            let bottom = ground - config.wall_thickness;
            pad.merge(&TriangleMesh::cuboid(
                Point3F::new(slab.min.x, slab.min.y, bottom),
                Point3F::new(slab.max.x, slab.max.y, ground),
            ));
            if config.wall_height > 0.0 {
                let inner = grow_xy(&slab, -config.wall_thickness);
                add_frame(&mut pad, &slab, &inner, ground, ground + config.wall_height);
            }
        }
        ctl.report(100.0, "Pad created");
        Ok(pad)
    }
}

fn grow_xy(bb: &BoundingBox3F, margin: CoordF) -> BoundingBox3F {
    BoundingBox3F::from_points_minmax(
        Point3F::new(bb.min.x - margin, bb.min.y - margin, bb.min.z),
        Point3F::new(bb.max.x + margin, bb.max.y + margin, bb.max.z),
    )
}

/// Four cuboids filling `outer` minus `inner` between `z0` and `z1`.
fn add_frame(mesh: &mut TriangleMesh, outer: &BoundingBox3F, inner: &BoundingBox3F, z0: CoordF, z1: CoordF) {
    let (o, i) = (outer, inner);
    let bars = [
        ((o.min.x, o.min.y), (o.max.x, i.min.y)),
        ((o.min.x, i.max.y), (o.max.x, o.max.y)),
        ((o.min.x, i.min.y), (i.min.x, i.max.y)),
        ((i.max.x, i.min.y), (o.max.x, i.max.y)),
    ];
    for ((x0, y0), (x1, y1)) in bars {
        if x1 > x0 && y1 > y0 {
            mesh.merge(&TriangleMesh::cuboid(
                Point3F::new(x0, y0, z0),
                Point3F::new(x1, y1, z1),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::CancelToken;
    use std::sync::Arc;

    fn input_with_points(points: Vec<SupportPoint>) -> SupportableMesh {
        let mesh = TriangleMesh::cuboid(Point3F::new(0.0, 0.0, 5.0), Point3F::new(10.0, 10.0, 15.0));
        SupportableMesh::new(Arc::new(mesh), points, 5.0)
    }

    #[test]
    fn test_pillar_builder_closed_volume() {
        let mut builder = PillarMeshBuilder::new(16);
        builder.add_profile(0.0, 0.0, &[(0.0, 2.0), (1.0, 0.5), (4.0, 0.5), (5.0, 0.2)]);
        // Non-increasing profile is rejected.
        builder.add_profile(0.0, 0.0, &[(1.0, 1.0), (1.0, 1.0)]);
        assert_eq!(builder.pillar_count(), 1);
        let mesh = builder.finish();
        assert_eq!(mesh.triangle_count(), 16 * 2 + 16 * 2 * 3);
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_build_tree_skips_grounded_points() {
        let points = vec![
            SupportPoint::new(Point3F::new(5.0, 5.0, 5.0), 0.2, true),
            SupportPoint::new(Point3F::new(2.0, 2.0, 0.0), 0.2, true),
        ];
        let input = input_with_points(points);
        let config = SupportTreeConfig::default();
        let cancel = CancelToken::new();
        let ctl = JobController::new(&cancel);
        let tree = PillarTreeBuilder.build_tree(&input, &config, &ctl).unwrap();
        let bb = tree.bounding_box();
        // Ground is the model bottom lowered by the object elevation.
        assert!((bb.min.z - 0.0).abs() < 1e-9);
        assert!((bb.max.z - (5.0 + config.head_penetration)).abs() < 1e-9);
        assert!(bb.max.x < 7.1);
    }

    #[test]
    fn test_build_pad_under_tree() {
        let input = input_with_points(vec![SupportPoint::new(Point3F::new(5.0, 5.0, 5.0), 0.2, true)]);
        let tree_config = SupportTreeConfig::default();
        let pad_config = PadConfig::default();
        let cancel = CancelToken::new();
        let ctl = JobController::new(&cancel);
        let tree = PillarTreeBuilder.build_tree(&input, &tree_config, &ctl).unwrap();
        let pad = PillarTreeBuilder
            .build_pad(&input, &tree, &tree_config, &pad_config, &ctl)
            .unwrap();
        assert!(validate_pad(&pad, &pad_config));
        let bb = pad.bounding_box();
        assert!((bb.max.z - 0.0).abs() < 1e-9);
        assert!((bb.min.z + pad_config.wall_thickness).abs() < 1e-9);
    }

    #[test]
    fn test_embedded_pad_frames_model() {
        let mut object = SlaPrintObjectConfig::default();
        object.pad_around_object = true;
        let tree_config = SupportTreeConfig::from_object_config(&object);
        let pad_config = PadConfig::from_object_config(&object);
        assert_eq!(tree_config.object_elevation, 0.0);

        let input = input_with_points(Vec::new());
        let cancel = CancelToken::new();
        let ctl = JobController::new(&cancel);
        let pad = PillarTreeBuilder
            .build_pad(&input, &TriangleMesh::new(), &tree_config, &pad_config, &ctl)
            .unwrap();
        assert_eq!(pad.triangle_count(), 4 * 12);
        let bb = pad.bounding_box();
        assert!((bb.min.z - 5.0).abs() < 1e-9);
        let reach = pad_config.embed_object.object_gap + pad_config.brim_size + pad_config.wall_thickness;
        assert!((bb.min.x + reach).abs() < 1e-9);
    }

    #[test]
    fn test_validate_pad_rules() {
        let mut config = PadConfig::default();
        assert!(!validate_pad(&TriangleMesh::new(), &config));
        config.embed_object.enabled = true;
        assert!(validate_pad(&TriangleMesh::new(), &config));
        config.embed_object.everywhere = true;
        assert!(!validate_pad(&TriangleMesh::new(), &config));
    }

    #[test]
    fn test_pad_config_validate() {
        let mut config = PadConfig::default();
        assert!(config.validate().is_ok());
        config.wall_height = 5.0;
        config.wall_slope = 30f64.to_radians();
        assert!(config.validate().is_err());
        config.wall_thickness = 0.0;
        assert_eq!(
            config.validate().unwrap_err(),
            "Pad wall thickness must be positive."
        );
    }
}
