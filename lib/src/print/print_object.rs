//! Per-object pipeline state and the queries served from it.

use super::model::{Instance, ModelObject};
use super::slice_record::{SliceIndex, SliceOrigin, SliceRecord};
use super::state::{ObjectStep, StepState};
use crate::config::SlaPrintObjectConfig;
use crate::csg::{CsgMeshSequence, CsgStage};
use crate::geometry::{ExPolygons, Transform3D};
use crate::mesh::TriangleMesh;
use crate::support::{PadConfig, SupportData, SupportPoint};
use crate::{Coord, CoordF};
use std::fmt;
use std::sync::Arc;

/// Severity of an [`ObjectWarning`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WarningLevel {
    NonCritical,
    Critical,
}

/// A problem found while running a step that did not stop the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectWarning {
    pub step: ObjectStep,
    pub level: WarningLevel,
    pub message: String,
}

/// Outcome of the last processing run of an object.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ObjectStatus {
    #[default]
    Pending,
    Ok,
    /// A step failed; the object is left out until it is invalidated.
    Failed { step: ObjectStep, message: String },
    Cancelled,
}

/// Cavity computed by the hollowing step. Released once holes are drilled.
#[derive(Clone, Debug, Default)]
pub struct HollowingData {
    pub interior: Option<Arc<TriangleMesh>>,
}

/// One object of the print and everything the pipeline computed for it.
pub struct PrintObject {
    pub(crate) model: ModelObject,
    pub(crate) config: SlaPrintObjectConfig,
    pub(crate) trafo: Transform3D,
    pub(crate) instances: Vec<Instance>,
    pub(crate) mesh_stack: CsgMeshSequence,
    pub(crate) hollowing_data: Option<HollowingData>,
    pub(crate) support_data: Option<SupportData>,
    pub(crate) slice_index: SliceIndex,
    pub(crate) model_slices: Vec<ExPolygons>,
    pub(crate) model_height_levels: Vec<CoordF>,
    pub(crate) preview_meshes: [Option<Arc<TriangleMesh>>; 8],
    pub(crate) warnings: Vec<ObjectWarning>,
    pub(crate) status: ObjectStatus,
    pub(crate) state: StepState<ObjectStep>,
}

impl PrintObject {
    pub fn new(model: ModelObject, config: SlaPrintObjectConfig) -> Self {
        let trafo = model.transform;
        let instances = model.instances.clone();
        Self {
            model,
            config,
            trafo,
            instances,
            mesh_stack: CsgMeshSequence::new(),
            hollowing_data: None,
            support_data: None,
            slice_index: SliceIndex::new(),
            model_slices: Vec::new(),
            model_height_levels: Vec::new(),
            preview_meshes: Default::default(),
            warnings: Vec::new(),
            status: ObjectStatus::Pending,
            state: StepState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }

    pub fn model_object(&self) -> &ModelObject {
        &self.model
    }

    pub fn config(&self) -> &SlaPrintObjectConfig {
        &self.config
    }

    pub fn trafo(&self) -> &Transform3D {
        &self.trafo
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn mesh_stack(&self) -> &CsgMeshSequence {
        &self.mesh_stack
    }

    pub fn hollowing_data(&self) -> Option<&HollowingData> {
        self.hollowing_data.as_ref()
    }

    pub fn support_data(&self) -> Option<&SupportData> {
        self.support_data.as_ref()
    }

    pub fn status(&self) -> &ObjectStatus {
        &self.status
    }

    pub fn is_step_done(&self, step: ObjectStep) -> bool {
        self.state.is_done(step)
    }

    /// Every step finished.
    pub fn is_complete(&self) -> bool {
        self.state.all_done()
    }

    pub fn warnings(&self) -> &[ObjectWarning] {
        &self.warnings
    }

    pub(crate) fn add_warning(&mut self, step: ObjectStep, level: WarningLevel, message: impl Into<String>) {
        self.warnings.push(ObjectWarning {
            step,
            level,
            message: message.into(),
        });
    }

    /// Reset `step` and everything after it.
    pub(crate) fn invalidate_step(&mut self, step: ObjectStep) -> bool {
        let any = self.state.invalidate(step);
        self.warnings.retain(|w| w.step < step);
        let reset = match &self.status {
            ObjectStatus::Failed { step: failed, .. } => *failed >= step,
            ObjectStatus::Pending => false,
            ObjectStatus::Ok | ObjectStatus::Cancelled => any,
        };
        if reset {
            self.status = ObjectStatus::Pending;
        }
        any
    }

    /// Gap (mm) between the ground and the bottom of the model.
    pub fn elevation(&self) -> CoordF {
        if self.config.is_zero_elevation() {
            return 0.0;
        }
        let mut elevation = if self.config.supports_enable {
            self.config.support_object_elevation
        } else {
            0.0
        };
        if self.config.pad_enable {
            let pad = PadConfig::from_object_config(&self.config);
            if !pad.embed_object.enabled {
                elevation += pad.wall_thickness;
            }
        }
        elevation
    }

    pub fn slice_index(&self) -> &SliceIndex {
        &self.slice_index
    }

    pub fn model_slices(&self) -> &[ExPolygons] {
        &self.model_slices
    }

    /// Z levels the model was cut at, one per model slice.
    pub fn model_height_levels(&self) -> &[CoordF] {
        &self.model_height_levels
    }

    pub fn support_slices(&self) -> &[ExPolygons] {
        self.support_data
            .as_ref()
            .map(|sd| sd.support_slices.as_slice())
            .unwrap_or(&[])
    }

    /// Slices of `record` from the given set, empty when it has none.
    pub fn slices_of(&self, record: &SliceRecord, origin: SliceOrigin) -> &[ExPolygons] {
        let set = match origin {
            SliceOrigin::Model => self.model_slices(),
            SliceOrigin::Support => self.support_slices(),
        };
        match record.slice_idx(origin).and_then(|i| set.get(i)) {
            Some(slice) => std::slice::from_ref(slice),
            None => &[],
        }
    }

    /// The record printed closest to `print_level`, within one layer.
    pub fn closest_slice_record(&self, print_level: Coord) -> Option<&SliceRecord> {
        let tolerance = crate::scale(self.config.layer_height.max(crate::EPSILON));
        self.slice_index.closest_by_print_level(print_level, tolerance)
    }

    /// Preview mesh stored by `step`, if that step produced one.
    pub fn preview_mesh(&self, step: ObjectStep) -> Option<Arc<TriangleMesh>> {
        self.preview_meshes[step as usize].clone()
    }

    /// The latest non-empty preview mesh.
    pub fn get_mesh_to_print(&self) -> Option<Arc<TriangleMesh>> {
        self.preview_meshes
            .iter()
            .rev()
            .flatten()
            .find(|m| !m.is_empty())
            .cloned()
    }

    pub(crate) fn set_preview(&mut self, step: ObjectStep, mesh: TriangleMesh) {
        let idx = step as usize;
        self.preview_meshes[idx] = Some(Arc::new(mesh));
        for later in &mut self.preview_meshes[idx + 1..] {
            *later = None;
        }
    }

    /// Drop the previews of `step` and every later step.
    pub(crate) fn clear_previews_from(&mut self, step: ObjectStep) {
        for preview in &mut self.preview_meshes[step as usize..] {
            *preview = None;
        }
    }

    pub fn support_points(&self) -> &[SupportPoint] {
        self.support_data
            .as_ref()
            .map(|sd| sd.input.points.as_slice())
            .unwrap_or(&[])
    }

    pub fn support_mesh(&self) -> Option<&TriangleMesh> {
        self.support_data.as_ref().map(|sd| &sd.tree_mesh)
    }

    pub fn pad_mesh(&self) -> Option<&TriangleMesh> {
        self.support_data.as_ref().map(|sd| &sd.pad_mesh)
    }

    /// Stage of the mesh stack each step writes to, if any.
    pub(crate) fn csg_stage(step: ObjectStep) -> Option<CsgStage> {
        match step {
            ObjectStep::Assembly => Some(CsgStage::Assembly),
            ObjectStep::Hollowing => Some(CsgStage::Hollowing),
            ObjectStep::DrillHoles => Some(CsgStage::DrillHoles),
            _ => None,
        }
    }
}

impl fmt::Debug for PrintObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrintObject")
            .field("name", &self.model.name)
            .field("status", &self.status)
            .field("records", &self.slice_index.len())
            .field("model_slices", &self.model_slices.len())
            .field("support_slices", &self.support_slices().len())
            .finish()
    }
}

impl fmt::Display for PrintObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrintObject '{}' ({} layers, {} instances)",
            self.model.name,
            self.slice_index.len(),
            self.instances.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(config: SlaPrintObjectConfig) -> PrintObject {
        PrintObject::new(ModelObject::from_mesh("cube", TriangleMesh::cube(10.0)), config)
    }

    #[test]
    fn test_elevation() {
        let default = object(SlaPrintObjectConfig::default());
        // Support elevation plus the pad thickness.
        assert!((default.elevation() - 7.0).abs() < 1e-9);

        let no_pad = object(SlaPrintObjectConfig::default().pad(false));
        assert!((no_pad.elevation() - 5.0).abs() < 1e-9);

        let pad_only = object(SlaPrintObjectConfig::default().supports(false));
        assert!((pad_only.elevation() - 2.0).abs() < 1e-9);

        let mut zero = SlaPrintObjectConfig::default();
        zero.pad_around_object = true;
        assert_eq!(object(zero).elevation(), 0.0);

        let bare = object(SlaPrintObjectConfig::default().supports(false).pad(false));
        assert_eq!(bare.elevation(), 0.0);
    }

    #[test]
    fn test_preview_clears_later_steps() {
        let mut po = object(SlaPrintObjectConfig::default());
        assert!(po.get_mesh_to_print().is_none());

        po.set_preview(ObjectStep::Hollowing, TriangleMesh::cube(2.0));
        assert!(po.get_mesh_to_print().is_some());

        po.set_preview(ObjectStep::Assembly, TriangleMesh::cube(1.0));
        assert!(po.preview_mesh(ObjectStep::Hollowing).is_none());
        let mesh = po.get_mesh_to_print().unwrap();
        assert!((mesh.volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mesh_to_print_skips_empty() {
        let mut po = object(SlaPrintObjectConfig::default());
        po.set_preview(ObjectStep::Assembly, TriangleMesh::cube(1.0));
        po.preview_meshes[ObjectStep::DrillHoles as usize] = Some(Arc::new(TriangleMesh::new()));
        let mesh = po.get_mesh_to_print().unwrap();
        assert!(!mesh.is_empty());
    }

    #[test]
    fn test_invalidate_drops_warnings_and_failure() {
        let mut po = object(SlaPrintObjectConfig::default());
        for step in ObjectStep::ALL {
            po.state.set_done(step);
        }
        po.add_warning(ObjectStep::Hollowing, WarningLevel::NonCritical, "early");
        po.add_warning(ObjectStep::SupportTree, WarningLevel::NonCritical, "late");
        po.status = ObjectStatus::Failed {
            step: ObjectStep::Pad,
            message: "No pad".into(),
        };

        assert!(po.invalidate_step(ObjectStep::SupportPoints));
        assert_eq!(po.warnings().len(), 1);
        assert_eq!(po.warnings()[0].message, "early");
        assert_eq!(*po.status(), ObjectStatus::Pending);
        assert!(po.is_step_done(ObjectStep::ObjectSlice));
        assert!(!po.is_step_done(ObjectStep::Pad));
    }

    #[test]
    fn test_slices_of_record() {
        let mut po = object(SlaPrintObjectConfig::default());
        po.slice_index = SliceIndex::build(0.0, 1.0, 0.3, 0.05).unwrap();
        po.model_slices = vec![Vec::new(); 2];
        po.slice_index.get_mut(1).unwrap().set_slice_idx(SliceOrigin::Model, Some(1));

        let rec0 = *po.slice_index.get(0).unwrap();
        let rec1 = *po.slice_index.get(1).unwrap();
        assert!(po.slices_of(&rec0, SliceOrigin::Model).is_empty());
        assert_eq!(po.slices_of(&rec1, SliceOrigin::Model).len(), 1);
        assert!(po.slices_of(&rec1, SliceOrigin::Support).is_empty());
        assert_eq!(
            po.closest_slice_record(crate::scale(0.33)).map(|r| r.print_level()),
            Some(crate::scale(0.35))
        );
    }
}
