//! Print module - orchestrates the SLA pipeline.
//!
//! - [`Print`] - the whole print: objects, configuration and the scheduler
//! - [`PrintObject`] - one object and the state its steps produced
//! - [`SliceIndex`] - the height grid of an object
//! - [`PrintLayer`], [`PrintStatistics`] - output of the print steps

mod aggregate;
mod capabilities;
mod corrections;
mod model;
mod preview;
mod print_object;
mod rasterize;
mod slice_record;
mod state;
mod status;
mod steps;

pub use aggregate::{
    exposure_times, mechanical_time, PrintLayer, PrintOutput, PrintStatistics, SliceRef,
    UNPRINTABLE_OBJECTS_ERROR,
};
pub use capabilities::Capabilities;
pub use corrections::apply_printer_corrections;
pub use model::{Instance, ModelObject, ModelVolume, PointsStatus, VolumeKind};
pub use preview::{
    APPROXIMATED_PREVIEW_WARNING, DRILLING_FAILED_WARNING, FAULTY_HOLES_WARNING,
    FAULTY_MESH_WARNING, HOLE_FAILED_WARNING, MAX_PREVIEW_VOXEL_SCALE,
};
pub use print_object::{HollowingData, ObjectStatus, ObjectWarning, PrintObject, WarningLevel};
pub use slice_record::{SliceIndex, SliceOrigin, SliceRecord};
pub use state::{ObjectStep, PipelineStep, PrintStep, StepState};
pub use status::{CancelToken, JobController, SlicingStatus, StatusCallback, StatusFlags, StatusReporter};
pub use steps::{
    object_step_label, StepContext, EMPTY_INTERIOR_WARNING, EMPTY_SUPPORT_WARNING,
    INCONSISTENT_SLICE_INDEX, NO_PAD_ERROR,
};

use crate::config::{changed_keys, PrintConfig, SlaPrintObjectConfig};
use crate::raster::RasterArchive;
use crate::{Error, Result};
use log::{error, info, warn};
use std::sync::Arc;
use steps::{ObjectStepDescriptor, OBJECT_STEPS, PRINT_STEPS};

/// Share of the progress bar taken by the object steps.
const OBJECT_STEPS_PROGRESS: f64 = 50.0;

/// An SLA print: the objects, the configuration and the pipeline state.
///
/// Steps run in a fixed order. Each one only runs when it is not done,
/// so calling [`Print::process`] again after a configuration change
/// recomputes just the invalidated suffix.
pub struct Print {
    config: PrintConfig,
    objects: Vec<PrintObject>,
    capabilities: Capabilities,
    archive: Option<Arc<dyn RasterArchive>>,
    output: PrintOutput,
    state: StepState<PrintStep>,
    cancel: CancelToken,
    reporter: StatusReporter,
}

impl Print {
    pub fn new(config: PrintConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
            capabilities: Capabilities::default(),
            archive: None,
            output: PrintOutput::default(),
            state: StepState::new(),
            cancel: CancelToken::new(),
            reporter: StatusReporter::new(),
        }
    }

    /// Builder method: run with other capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self.invalidate_all();
        self
    }

    pub fn set_raster_archive(&mut self, archive: Arc<dyn RasterArchive>) {
        self.archive = Some(archive);
        self.state.invalidate(PrintStep::Rasterize);
    }

    pub fn set_status_callback(&mut self, callback: impl Fn(&SlicingStatus) + Send + Sync + 'static) {
        self.reporter.set_callback(Some(Arc::new(callback)));
    }

    /// Handle that stops a running [`Print::process`] from another thread.
    /// The flag stays set until it is reset.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Add an object, configured by its own settings or the print wide
    /// object settings. Returns its index.
    pub fn add_object(&mut self, model: ModelObject) -> usize {
        let config = self.object_config_for(&model);
        info!("Adding object '{}'", model.name);
        self.objects.push(PrintObject::new(model, config));
        self.state.invalidate_all();
        self.objects.len() - 1
    }

    /// Replace the input of object `idx`. Everything computed for it is
    /// dropped.
    pub fn set_model_object(&mut self, idx: usize, model: ModelObject) -> Result<()> {
        let config = self.object_config_for(&model);
        let po = self
            .objects
            .get_mut(idx)
            .ok_or_else(|| Error::Config(format!("no object with index {}", idx)))?;
        *po = PrintObject::new(model, config);
        self.state.invalidate_all();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.output.clear();
        self.state.invalidate_all();
    }

    fn object_config_for(&self, model: &ModelObject) -> SlaPrintObjectConfig {
        model.config.clone().unwrap_or_else(|| self.config.object.clone())
    }

    /// Switch to `config`, invalidating the earliest step each changed
    /// value affects. Returns true if anything was invalidated.
    pub fn apply_config(&mut self, config: PrintConfig) -> Result<bool> {
        config.validate()?;
        let mut object_step: Option<ObjectStep> = None;
        let mut print_step: Option<PrintStep> = None;
        let mut earliest_object = |step: ObjectStep| {
            object_step = Some(object_step.map_or(step, |s| s.min(step)));
        };

        for key in changed_keys(&self.config.printer, &config.printer) {
            match key.as_str() {
                "absolute_correction" | "elefant_foot_compensation" | "elefant_foot_min_width" => {
                    earliest_object(ObjectStep::ObjectSlice)
                }
                "display_width" | "display_height" | "fast_tilt_time" | "slow_tilt_time"
                | "high_viscosity_tilt_time" => print_step = Some(PrintStep::MergeSlicesAndEval),
                _ => {
                    print_step.get_or_insert(PrintStep::Rasterize);
                }
            }
        }
        for key in changed_keys(&self.config.material, &config.material) {
            match key.as_str() {
                "initial_layer_height" => earliest_object(ObjectStep::ObjectSlice),
                _ => print_step = Some(PrintStep::MergeSlicesAndEval),
            }
        }
        // Objects carrying their own settings keep them.
        let object_keys = changed_keys(&self.config.object, &config.object);
        let object_config_step = object_keys.iter().map(|k| object_step_for_key(k)).min();
        if !object_keys.is_empty() {
            // Fading of the exposure uses the print wide value.
            print_step = Some(PrintStep::MergeSlicesAndEval);
        }

        let mut invalidated = false;
        for po in &mut self.objects {
            if po.model.config.is_none() {
                po.config = config.object.clone();
                if let Some(step) = object_config_step {
                    invalidated |= po.invalidate_step(step);
                }
            }
            if let Some(step) = object_step {
                invalidated |= po.invalidate_step(step);
            }
        }
        if invalidated || object_step.is_some() {
            invalidated |= self.state.invalidate_all();
        }
        if let Some(step) = print_step {
            invalidated |= self.state.invalidate(step);
        }

        self.config = config;
        Ok(invalidated)
    }

    /// Reset `step` and the following steps of object `idx`.
    pub fn invalidate_object_step(&mut self, idx: usize, step: ObjectStep) -> bool {
        let any = match self.objects.get_mut(idx) {
            Some(po) => po.invalidate_step(step),
            None => return false,
        };
        self.state.invalidate_all() || any
    }

    fn invalidate_all(&mut self) {
        for po in &mut self.objects {
            po.invalidate_step(ObjectStep::Assembly);
        }
        self.state.invalidate_all();
    }

    /// Run every step that is not done.
    ///
    /// A failing object is marked [`ObjectStatus::Failed`] and left out of
    /// the print while the others go on. Errors of the print steps and
    /// cancellation are returned.
    pub fn process(&mut self) -> Result<()> {
        self.config.validate()?;
        info!("Processing {} objects", self.objects.len());

        let object_count = self.objects.len();
        let objectstep_scale = if object_count == 0 {
            0.0
        } else {
            OBJECT_STEPS_PROGRESS / (object_count as f64 * 100.0)
        };

        let mut status = 0.0;
        let mut any_ran = false;
        for desc in OBJECT_STEPS.iter() {
            let span = desc.weight as f64 * objectstep_scale;
            for idx in 0..object_count {
                if self.object_needs_step(idx, desc.step) {
                    self.cancel.check()?;
                    self.reporter.set_status(status, desc.label, StatusFlags::DEFAULT);
                    self.run_object_step(idx, desc, status, span)?;
                    any_ran = true;
                }
                status += span;
            }
        }
        if any_ran {
            self.state.invalidate_all();
        }

        let mut status = OBJECT_STEPS_PROGRESS;
        for desc in PRINT_STEPS.iter() {
            let span = desc.weight as f64 * (100.0 - OBJECT_STEPS_PROGRESS) / 100.0;
            if !self.state.is_done(desc.step) {
                self.cancel.check()?;
                self.reporter.set_status(status, desc.label, StatusFlags::DEFAULT);
                self.state.set_started(desc.step);

                let ctx = StepContext {
                    printer: &self.config.printer,
                    material: &self.config.material,
                    object: &self.config.object,
                    caps: &self.capabilities,
                    archive: self.archive.as_deref(),
                    cancel: &self.cancel,
                    reporter: &self.reporter,
                    label: desc.label,
                    progress_base: status,
                    progress_span: span,
                };
                match (desc.run)(&self.objects, &mut self.output, &ctx) {
                    Ok(()) => self.state.set_done(desc.step),
                    Err(e) => {
                        self.state.invalidate(desc.step);
                        if !e.is_cancelled() {
                            error!("{:?} failed: {}", desc.step, e);
                        }
                        return Err(e);
                    }
                }
            }
            status += span;
        }

        for po in &self.objects {
            for warning in po.warnings() {
                warn!("{}: {}", po.name(), warning.message);
            }
        }
        self.reporter.set_status(100.0, "Slicing done", StatusFlags::DEFAULT);
        Ok(())
    }

    /// True when `step` has to run for object `idx`: it is not done, the
    /// previous step is, and the object did not fail.
    fn object_needs_step(&self, idx: usize, step: ObjectStep) -> bool {
        let po = &self.objects[idx];
        if matches!(po.status, ObjectStatus::Failed { .. }) || po.state.is_done(step) {
            return false;
        }
        match (step as usize).checked_sub(1) {
            Some(prev) => po.state.is_done(ObjectStep::ALL[prev]),
            None => true,
        }
    }

    fn run_object_step(
        &mut self,
        idx: usize,
        desc: &ObjectStepDescriptor,
        progress_base: f64,
        progress_span: f64,
    ) -> Result<()> {
        let ctx = StepContext {
            printer: &self.config.printer,
            material: &self.config.material,
            object: &self.config.object,
            caps: &self.capabilities,
            archive: self.archive.as_deref(),
            cancel: &self.cancel,
            reporter: &self.reporter,
            label: desc.label,
            progress_base,
            progress_span,
        };
        let po = &mut self.objects[idx];
        let step = desc.step;

        po.warnings.retain(|w| w.step < step);
        po.clear_previews_from(step);
        po.state.set_started(step);

        match (desc.run)(po, &ctx) {
            Ok(()) => {
                po.state.set_done(step);
                if po.state.all_done() {
                    po.status = ObjectStatus::Ok;
                }
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                po.state.invalidate(step);
                po.status = ObjectStatus::Cancelled;
                Err(e)
            }
            Err(e) => {
                error!("Object '{}' failed at {:?}: {}", po.name(), step, e);
                po.state.invalidate(step);
                po.status = ObjectStatus::Failed {
                    step,
                    message: e.to_string(),
                };
                Ok(())
            }
        }
    }

    pub fn config(&self) -> &PrintConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn objects(&self) -> &[PrintObject] {
        &self.objects
    }

    pub fn object(&self, idx: usize) -> Option<&PrintObject> {
        self.objects.get(idx)
    }

    pub fn object_status(&self, idx: usize) -> Option<&ObjectStatus> {
        self.objects.get(idx).map(|po| po.status())
    }

    pub fn is_step_done(&self, step: PrintStep) -> bool {
        self.state.is_done(step)
    }

    pub fn print_layers(&self) -> &[PrintLayer] {
        &self.output.layers
    }

    pub fn statistics(&self) -> &PrintStatistics {
        &self.output.statistics
    }

    /// Latest reported progress (percent).
    pub fn progress(&self) -> f64 {
        self.reporter.current()
    }
}

/// Earliest object step that reads the object setting `key`.
fn object_step_for_key(key: &str) -> ObjectStep {
    match key {
        k if k.starts_with("hollowing_") => ObjectStep::Hollowing,
        // These move the model up or change the grid.
        "layer_height" | "faded_layers" | "slicing_mode" | "slice_closing_radius"
        | "supports_enable" | "support_object_elevation" | "pad_enable" | "pad_wall_thickness"
        | "pad_around_object" | "pad_around_object_everywhere" => ObjectStep::ObjectSlice,
        k if k.starts_with("support_") => ObjectStep::SupportPoints,
        k if k.starts_with("pad_") => ObjectStep::Pad,
        _ => ObjectStep::Assembly,
    }
}

impl std::fmt::Debug for Print {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Print")
            .field("objects", &self.objects.len())
            .field("layers", &self.output.layers.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TriangleMesh;
    use parking_lot::Mutex;

    fn bare_config() -> PrintConfig {
        let mut config = PrintConfig::default();
        config.object = config.object.supports(false).pad(false);
        config
    }

    fn cube_print(config: PrintConfig) -> Print {
        let mut print = Print::new(config);
        print.add_object(ModelObject::from_mesh("cube", TriangleMesh::cube(10.0)));
        print
    }

    #[test]
    fn test_process_bare_cube() {
        let mut print = cube_print(bare_config());
        print.process().unwrap();

        assert_eq!(*print.object_status(0).unwrap(), ObjectStatus::Ok);
        assert!(print.is_step_done(PrintStep::Rasterize));
        let layers = print.print_layers();
        assert_eq!(layers.len(), print.objects()[0].slice_index().len());
        assert!((layers[0].model_area() - 100.0).abs() < 1e-3);
        assert!(print.statistics().objects_used_material > 990.0);
        assert_eq!(print.statistics().support_used_material, 0.0);
    }

    #[test]
    fn test_process_twice_is_noop() {
        let mut print = cube_print(bare_config());
        print.process().unwrap();
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        print.set_status_callback(move |s| sink.lock().push(s.message.clone()));
        print.process().unwrap();
        assert_eq!(*reports.lock(), vec!["Slicing done".to_string()]);
    }

    #[test]
    fn test_progress_reaches_hundred_in_order() {
        let mut print = cube_print(bare_config());
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        print.set_status_callback(move |s| sink.lock().push(s.percent));
        print.process().unwrap();

        let reports = reports.lock();
        assert_eq!(*reports.last().unwrap(), 100);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_apply_config_invalidates_from_slice() {
        let mut print = cube_print(bare_config());
        print.process().unwrap();

        let mut config = bare_config();
        config.object.layer_height = 0.1;
        assert!(print.apply_config(config).unwrap());
        let po = &print.objects()[0];
        assert!(po.is_step_done(ObjectStep::DrillHoles));
        assert!(!po.is_step_done(ObjectStep::ObjectSlice));
        assert!(!print.is_step_done(PrintStep::MergeSlicesAndEval));

        print.process().unwrap();
        assert!(print.print_layers().len() < 150);
    }

    #[test]
    fn test_apply_config_exposure_keeps_objects() {
        let mut print = cube_print(bare_config());
        print.process().unwrap();

        let mut config = bare_config();
        config.material.exposure_time = 12.0;
        assert!(print.apply_config(config).unwrap());
        assert!(print.objects()[0].is_complete());
        assert!(!print.is_step_done(PrintStep::MergeSlicesAndEval));

        let mut same = bare_config();
        same.material.exposure_time = 12.0;
        print.process().unwrap();
        assert!(!print.apply_config(same).unwrap());
    }

    #[test]
    fn test_cancel_before_process() {
        let mut print = cube_print(bare_config());
        print.cancel();
        assert!(print.process().unwrap_err().is_cancelled());
        assert!(!print.objects()[0].is_step_done(ObjectStep::Assembly));

        print.cancel_token().reset();
        print.process().unwrap();
        assert!(print.objects()[0].is_complete());
    }

    #[test]
    fn test_object_key_steps() {
        assert_eq!(object_step_for_key("hollowing_min_thickness"), ObjectStep::Hollowing);
        assert_eq!(object_step_for_key("support_object_elevation"), ObjectStep::ObjectSlice);
        assert_eq!(object_step_for_key("support_pillar_diameter"), ObjectStep::SupportPoints);
        assert_eq!(object_step_for_key("pad_brim_size"), ObjectStep::Pad);
        assert_eq!(object_step_for_key("pad_enable"), ObjectStep::ObjectSlice);
    }

    #[test]
    fn test_set_model_object_out_of_range() {
        let mut print = Print::new(bare_config());
        let model = ModelObject::from_mesh("cube", TriangleMesh::cube(1.0));
        assert!(print.set_model_object(3, model).is_err());
    }
}
