//! Input model: objects made of volumes, placed by instances.

use crate::config::SlaPrintObjectConfig;
use crate::csg::{CsgPart, CsgType};
use crate::geometry::{Point, Transform3D};
use crate::hollowing::DrainHole;
use crate::mesh::TriangleMesh;
use crate::support::SupportPoint;
use crate::{scale, CoordF};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Role of a volume inside its object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    #[default]
    ModelPart,
    NegativeVolume,
    ParameterModifier,
    SupportBlocker,
    SupportEnforcer,
}

/// A mesh with its role and placement inside the object.
#[derive(Clone, Debug)]
pub struct ModelVolume {
    pub name: String,
    pub mesh: Arc<TriangleMesh>,
    pub kind: VolumeKind,
    pub transform: Transform3D,
}

impl ModelVolume {
    pub fn new(name: impl Into<String>, mesh: TriangleMesh, kind: VolumeKind) -> Self {
        Self {
            name: name.into(),
            mesh: Arc::new(mesh),
            kind,
            transform: Transform3D::identity(),
        }
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    /// The mesh in object coordinates after `object_trafo`.
    pub fn transformed_mesh(&self, object_trafo: &Transform3D) -> TriangleMesh {
        self.mesh.transformed(&self.transform.then(object_trafo))
    }
}

/// Placement of one copy of an object on the build plate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    /// Rotation around Z in radians.
    pub rotation: CoordF,
    /// Offset in scaled units.
    pub shift: Point,
    /// The copy is mirrored along X.
    pub left_handed: bool,
}

impl Instance {
    pub fn new(shift: Point, rotation: CoordF) -> Self {
        Self {
            rotation,
            shift,
            left_handed: false,
        }
    }

    pub fn mirrored(mut self) -> Self {
        self.left_handed = true;
        self
    }

    /// Planar part of a full instance transform: Z rotation, XY offset
    /// and whether it reflects.
    pub fn from_transform(trafo: &Transform3D) -> Self {
        let t = trafo.translation_component();
        Self {
            rotation: trafo.z_rotation_angle(),
            shift: Point::new(scale(t.x), scale(t.y)),
            left_handed: trafo.has_reflection(),
        }
    }
}

/// Where the support points of an object come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsStatus {
    #[default]
    NoPoints,
    AutoGenerated,
    /// Points edited by the user are used as they are.
    UserModified,
}

/// An object of the model.
#[derive(Clone, Debug, Default)]
pub struct ModelObject {
    pub name: String,
    pub volumes: Vec<ModelVolume>,
    /// Applied to every volume before slicing.
    pub transform: Transform3D,
    pub instances: Vec<Instance>,
    /// Holes in object coordinates.
    pub drain_holes: Vec<DrainHole>,
    /// Points in object coordinates.
    pub support_points: Vec<SupportPoint>,
    pub points_status: PointsStatus,
    /// Overrides the print wide object configuration.
    pub config: Option<SlaPrintObjectConfig>,
}

impl ModelObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A single part object with one instance at the origin.
    pub fn from_mesh(name: impl Into<String>, mesh: TriangleMesh) -> Self {
        let name = name.into();
        Self {
            volumes: vec![ModelVolume::new(name.clone(), mesh, VolumeKind::ModelPart)],
            instances: vec![Instance::default()],
            name,
            ..Self::default()
        }
    }

    pub fn add_volume(&mut self, volume: ModelVolume) -> &mut Self {
        self.volumes.push(volume);
        self
    }

    pub fn add_instance(&mut self, instance: Instance) -> &mut Self {
        self.instances.push(instance);
        self
    }

    pub fn add_drain_hole(&mut self, hole: DrainHole) -> &mut Self {
        self.drain_holes.push(hole);
        self
    }

    pub fn set_support_points(&mut self, points: Vec<SupportPoint>, status: PointsStatus) {
        self.support_points = points;
        self.points_status = status;
    }

    pub fn volumes_of_kind(&self, kind: VolumeKind) -> impl Iterator<Item = &ModelVolume> {
        self.volumes.iter().filter(move |v| v.kind == kind)
    }

    pub fn has_volume_kind(&self, kind: VolumeKind) -> bool {
        self.volumes_of_kind(kind).next().is_some()
    }

    /// Model parts as unions followed by negative volumes as differences,
    /// each group in volume order. A volume made of several shells becomes
    /// a group of its shells so overlapping shells are united.
    pub fn csg_parts(&self, trafo: &Transform3D) -> Vec<CsgPart> {
        let ordered = self
            .volumes_of_kind(VolumeKind::ModelPart)
            .map(|v| (v, CsgType::Union))
            .chain(
                self.volumes_of_kind(VolumeKind::NegativeVolume)
                    .map(|v| (v, CsgType::Difference)),
            );

        let mut parts = Vec::new();
        for (volume, operation) in ordered {
            let mesh = volume.transformed_mesh(trafo);
            if mesh.is_splittable() {
                parts.push(CsgPart::push(operation).named(volume.name.clone()));
                for shell in mesh.split() {
                    if !shell.is_empty() {
                        parts.push(CsgPart::new(Arc::new(shell), CsgType::Union));
                    }
                }
                parts.push(CsgPart::pop());
            } else {
                parts.push(CsgPart::new(Arc::new(mesh), operation).named(volume.name.clone()));
            }
        }
        parts
    }

    /// Every drain hole as a difference part, in print coordinates.
    pub fn drill_hole_parts(&self, trafo: &Transform3D) -> Vec<CsgPart> {
        self.transformed_drain_holes(trafo)
            .iter()
            .enumerate()
            .map(|(i, hole)| {
                CsgPart::new(Arc::new(hole.to_mesh()), CsgType::Difference)
                    .named(format!("drain hole {i}"))
            })
            .collect()
    }

    pub fn transformed_drain_holes(&self, trafo: &Transform3D) -> Vec<DrainHole> {
        self.drain_holes.iter().map(|h| h.transformed(trafo)).collect()
    }

    pub fn transformed_support_points(&self, trafo: &Transform3D) -> Vec<SupportPoint> {
        self.support_points
            .iter()
            .map(|p| SupportPoint {
                pos: trafo.apply(p.pos),
                ..*p
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::CsgStackOp;
    use crate::geometry::Point3F;

    #[test]
    fn test_from_mesh() {
        let object = ModelObject::from_mesh("cube", TriangleMesh::cube(10.0));
        assert_eq!(object.volumes.len(), 1);
        assert_eq!(object.instances.len(), 1);
        assert_eq!(object.volumes[0].kind, VolumeKind::ModelPart);
        assert_eq!(object.points_status, PointsStatus::NoPoints);
    }

    #[test]
    fn test_csg_parts_skip_modifiers() {
        let mut object = ModelObject::from_mesh("cube", TriangleMesh::cube(10.0));
        object.add_volume(ModelVolume::new("cut", TriangleMesh::cube(2.0), VolumeKind::NegativeVolume));
        object.add_volume(ModelVolume::new("blocker", TriangleMesh::cube(2.0), VolumeKind::SupportBlocker));

        let parts = object.csg_parts(&Transform3D::identity());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].operation, CsgType::Union);
        assert_eq!(parts[1].operation, CsgType::Difference);
    }

    #[test]
    fn test_csg_parts_start_with_union() {
        let mut object = ModelObject::new("cut first");
        object.add_volume(ModelVolume::new("cut", TriangleMesh::cube(2.0), VolumeKind::NegativeVolume));
        object.add_volume(ModelVolume::new("body", TriangleMesh::cube(10.0), VolumeKind::ModelPart));
        object.add_volume(ModelVolume::new("cut 2", TriangleMesh::cube(1.0), VolumeKind::NegativeVolume));

        let parts = object.csg_parts(&Transform3D::identity());
        let ops: Vec<CsgType> = parts.iter().map(|p| p.operation).collect();
        assert_eq!(ops, vec![CsgType::Union, CsgType::Difference, CsgType::Difference]);
        assert_eq!(parts[1].name, "cut");
        assert_eq!(parts[2].name, "cut 2");
    }

    #[test]
    fn test_csg_parts_split_shells() {
        let mut mesh = TriangleMesh::cube(5.0);
        let mut other = TriangleMesh::cube(5.0);
        other.translate(Point3F::new(20.0, 0.0, 0.0));
        mesh.merge(&other);
        let object = ModelObject::from_mesh("two", mesh);

        let parts = object.csg_parts(&Transform3D::identity());
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].stack_operation, CsgStackOp::Push);
        assert!(parts[0].mesh().is_none());
        assert!(parts[1].mesh().is_some() && parts[2].mesh().is_some());
        assert_eq!(parts[3].stack_operation, CsgStackOp::Pop);
    }

    #[test]
    fn test_object_transform_applied() {
        let mut object = ModelObject::from_mesh("cube", TriangleMesh::cube(10.0));
        object.transform = Transform3D::translation(0.0, 0.0, 3.0);
        let parts = object.csg_parts(&object.transform);
        let bb = parts[0].mesh().unwrap().bounding_box();
        // The cube is centered on the origin.
        assert!((bb.min.z + 2.0).abs() < 1e-9);

        object.set_support_points(
            vec![SupportPoint::new(Point3F::new(1.0, 1.0, 0.0), 0.2, false)],
            PointsStatus::UserModified,
        );
        let points = object.transformed_support_points(&object.transform);
        assert!((points[0].pos.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_instance_from_transform() {
        let trafo = Transform3D::rotation_z(std::f64::consts::FRAC_PI_2)
            .then(&Transform3D::translation(10.0, -5.0, 0.0));
        let instance = Instance::from_transform(&trafo);
        assert!((instance.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(instance.shift, Point::new_scale(10.0, -5.0));
        assert!(!instance.left_handed);

        let mirrored = Instance::from_transform(&Transform3D::scaling(-1.0, 1.0, 1.0));
        assert!(mirrored.left_handed);
    }
}
