//! Tagged mesh parts and the staged sequence holding them.

use crate::geometry::BoundingBox3F;
use crate::mesh::TriangleMesh;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Boolean operation a part contributes with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsgType {
    #[default]
    Union,
    Difference,
    Intersection,
}

/// Scoping marker: `Push` opens a group before the part is applied,
/// `Pop` closes it after. The group is combined into the enclosing one
/// with the operation of the part that opened it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsgStackOp {
    #[default]
    Continue,
    Push,
    Pop,
}

/// Pipeline stage that owns a group of parts. Ordered as the stages run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CsgStage {
    Assembly,
    Hollowing,
    DrillHoles,
}

/// One tagged mesh of the sequence, in print coordinates.
///
/// A part without a mesh only carries its stack marker.
#[derive(Clone, Debug, Default)]
pub struct CsgPart {
    pub mesh: Option<Arc<TriangleMesh>>,
    pub operation: CsgType,
    pub stack_operation: CsgStackOp,
    pub name: String,
}

impl CsgPart {
    pub fn new(mesh: Arc<TriangleMesh>, operation: CsgType) -> Self {
        Self {
            mesh: Some(mesh),
            operation,
            stack_operation: CsgStackOp::Continue,
            name: String::new(),
        }
    }

    /// A mesh-less marker opening a group combined with `operation`.
    pub fn push(operation: CsgType) -> Self {
        Self {
            mesh: None,
            operation,
            stack_operation: CsgStackOp::Push,
            name: String::new(),
        }
    }

    /// A mesh-less marker closing the current group.
    pub fn pop() -> Self {
        Self {
            mesh: None,
            operation: CsgType::Union,
            stack_operation: CsgStackOp::Pop,
            name: String::new(),
        }
    }

    /// Builder method: set the stack marker.
    pub fn stack_operation(mut self, op: CsgStackOp) -> Self {
        self.stack_operation = op;
        self
    }

    /// Builder method: set a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn mesh(&self) -> Option<&TriangleMesh> {
        self.mesh.as_deref()
    }
}

/// Meshes of the positive parts, in sequence order.
///
/// Everything inside a group opened by a non-union part, or nested in
/// such a group, is skipped.
fn positive_meshes(parts: &[CsgPart]) -> Vec<&TriangleMesh> {
    let mut meshes = Vec::new();
    let mut skip_stack = vec![false];

    for part in parts {
        let skipping = skip_stack.last().copied().unwrap_or(false);
        if part.stack_operation == CsgStackOp::Push {
            skip_stack.push(skipping || part.operation != CsgType::Union);
        }

        let skipping = skip_stack.last().copied().unwrap_or(false);
        if !skipping && part.operation == CsgType::Union {
            if let Some(mesh) = part.mesh() {
                meshes.push(mesh);
            }
        }

        if part.stack_operation == CsgStackOp::Pop && skip_stack.len() > 1 {
            skip_stack.pop();
        }
    }
    meshes
}

/// Bounding box of the positive parts only.
pub fn positive_bounding_box(parts: &[CsgPart]) -> BoundingBox3F {
    let mut bb = BoundingBox3F::new();
    for mesh in positive_meshes(parts) {
        bb.merge(&mesh.bounding_box());
    }
    bb
}

/// True when every part is a union.
pub fn is_all_positive(parts: &[CsgPart]) -> bool {
    parts.iter().all(|p| p.operation == CsgType::Union)
}

/// Concatenate the meshes of the positive parts.
pub fn merge_positive_parts(parts: &[CsgPart]) -> TriangleMesh {
    let mut merged = TriangleMesh::new();
    for mesh in positive_meshes(parts) {
        merged.merge(mesh);
    }
    merged
}

/// Mesh parts grouped by the stage that produced them.
#[derive(Clone, Debug, Default)]
pub struct CsgMeshSequence {
    stages: BTreeMap<CsgStage, Vec<CsgPart>>,
}

impl CsgMeshSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the parts of `stage` and insert `parts` in their place.
    pub fn replace_stage(&mut self, stage: CsgStage, parts: Vec<CsgPart>) {
        if parts.is_empty() {
            self.stages.remove(&stage);
            return;
        }
        self.stages.insert(stage, parts);
        if !self.first_is_positive() {
            warn!("CSG sequence does not start with a positive part");
        }
    }

    pub fn clear_stage(&mut self, stage: CsgStage) {
        self.stages.remove(&stage);
    }

    /// Clear `stage` and every later stage.
    pub fn clear_from(&mut self, stage: CsgStage) {
        self.stages.retain(|s, _| *s < stage);
    }

    pub fn clear(&mut self) {
        self.stages.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stages.values().all(Vec::is_empty)
    }

    pub fn stage(&self, stage: CsgStage) -> &[CsgPart] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_stage(&self, stage: CsgStage) -> bool {
        !self.stage(stage).is_empty()
    }

    /// All parts in stage order.
    pub fn parts(&self) -> Vec<CsgPart> {
        self.stages.values().flatten().cloned().collect()
    }

    /// Parts of `stage` and of every earlier stage.
    pub fn parts_upto(&self, stage: CsgStage) -> Vec<CsgPart> {
        self.stages
            .range(..=stage)
            .flat_map(|(_, parts)| parts.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    /// The first part, if any, is a union.
    pub fn first_is_positive(&self) -> bool {
        self.stages
            .values()
            .flatten()
            .next()
            .map_or(true, |p| p.operation == CsgType::Union)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3F;

    fn cuboid(min: (f64, f64, f64), max: (f64, f64, f64)) -> Arc<TriangleMesh> {
        Arc::new(TriangleMesh::cuboid(
            Point3F::new(min.0, min.1, min.2),
            Point3F::new(max.0, max.1, max.2),
        ))
    }

    #[test]
    fn test_positive_bbox_ignores_negative_parts() {
        let parts = vec![
            CsgPart::new(cuboid((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)), CsgType::Union),
            CsgPart::new(cuboid((-5.0, -5.0, -5.0), (20.0, 20.0, 20.0)), CsgType::Difference),
        ];
        let bb = positive_bounding_box(&parts);
        assert!(bb.min.approx_eq(&Point3F::new(0.0, 0.0, 0.0), 1e-9));
        assert!(bb.max.approx_eq(&Point3F::new(10.0, 10.0, 10.0), 1e-9));
    }

    #[test]
    fn test_positive_bbox_skips_nested_groups() {
        let parts = vec![
            CsgPart::new(cuboid((0.0, 0.0, 0.0), (10.0, 10.0, 10.0)), CsgType::Union),
            CsgPart::push(CsgType::Difference),
            // Union inside a subtracted group does not grow the footprint.
            CsgPart::new(cuboid((0.0, 0.0, 0.0), (30.0, 30.0, 30.0)), CsgType::Union),
            CsgPart::push(CsgType::Union),
            CsgPart::new(cuboid((0.0, 0.0, 0.0), (40.0, 40.0, 40.0)), CsgType::Union),
            CsgPart::pop(),
            CsgPart::pop(),
            CsgPart::push(CsgType::Union),
            CsgPart::new(cuboid((10.0, 0.0, 0.0), (15.0, 5.0, 12.0)), CsgType::Union),
            CsgPart::pop(),
        ];
        let bb = positive_bounding_box(&parts);
        assert!(bb.max.approx_eq(&Point3F::new(15.0, 10.0, 12.0), 1e-9));
    }

    #[test]
    fn test_is_all_positive_and_merge() {
        let mut parts = vec![
            CsgPart::new(cuboid((0.0, 0.0, 0.0), (1.0, 1.0, 1.0)), CsgType::Union),
            CsgPart::new(cuboid((2.0, 0.0, 0.0), (3.0, 1.0, 1.0)), CsgType::Union),
        ];
        assert!(is_all_positive(&parts));
        let merged = merge_positive_parts(&parts);
        assert_eq!(merged.triangle_count(), 24);
        assert!((merged.volume() - 2.0).abs() < 1e-9);

        parts.push(CsgPart::new(
            cuboid((0.0, 0.0, 0.0), (1.0, 1.0, 1.0)),
            CsgType::Difference,
        ));
        assert!(!is_all_positive(&parts));
    }

    #[test]
    fn test_sequence_stages() {
        let mut seq = CsgMeshSequence::new();
        let mesh = cuboid((0.0, 0.0, 0.0), (1.0, 1.0, 1.0));
        seq.replace_stage(CsgStage::Assembly, vec![CsgPart::new(mesh.clone(), CsgType::Union)]);
        seq.replace_stage(
            CsgStage::DrillHoles,
            vec![CsgPart::new(mesh.clone(), CsgType::Difference)],
        );
        seq.replace_stage(
            CsgStage::Hollowing,
            vec![CsgPart::new(mesh.clone(), CsgType::Difference)],
        );
        assert_eq!(seq.len(), 3);
        assert!(seq.first_is_positive());
        assert_eq!(seq.parts_upto(CsgStage::Hollowing).len(), 2);

        seq.replace_stage(
            CsgStage::Hollowing,
            vec![
                CsgPart::new(mesh.clone(), CsgType::Difference),
                CsgPart::new(mesh, CsgType::Difference),
            ],
        );
        assert_eq!(seq.stage(CsgStage::Hollowing).len(), 2);
        assert_eq!(seq.len(), 4);

        seq.clear_from(CsgStage::Hollowing);
        assert_eq!(seq.len(), 1);
        assert!(!seq.has_stage(CsgStage::DrillHoles));
        seq.clear();
        assert!(seq.is_empty());
    }
}
