//! The object steps and the tables driving the scheduler.

use super::aggregate::{merge_slices_and_eval, PrintOutput};
use super::capabilities::Capabilities;
use super::corrections::apply_printer_corrections;
use super::model::{ModelObject, PointsStatus, VolumeKind};
use super::preview::generate_preview;
use super::print_object::{HollowingData, PrintObject, WarningLevel};
use super::rasterize::rasterize;
use super::slice_record::{SliceIndex, SliceOrigin};
use super::state::{ObjectStep, PrintStep};
use super::status::{CancelToken, JobController, StatusFlags, StatusReporter};
use crate::clipper::union_ex;
use crate::config::{SlaMaterialConfig, SlaPrintObjectConfig, SlaPrinterConfig};
use crate::csg::{merge_positive_parts, positive_bounding_box, slice_csgmesh, CsgPart, CsgStage, CsgType};
use crate::geometry::{expolygons_contain, ExPolygons, Transform3D};
use crate::hollowing::HollowingConfig;
use crate::mesh::TriangleMesh;
use crate::raster::RasterArchive;
use crate::slice::{slice_mesh, MeshSlicingParams, SlicingMode};
use crate::support::{
    validate_pad, PadConfig, SupportData, SupportPoint, SupportPointConfig, SupportTreeConfig,
};
use crate::{CoordF, Error, Result, EPSILON};
use log::{debug, info, warn};
use std::sync::Arc;

pub const INCONSISTENT_SLICE_INDEX: &str =
    "Slicing had to be stopped due to an internal error: Inconsistent slice index.";
pub const NO_PAD_ERROR: &str =
    "No pad can be generated for this model with the current configuration";
pub const EMPTY_INTERIOR_WARNING: &str = "Interior mesh is empty!";
pub const EMPTY_SUPPORT_WARNING: &str = "Support mesh is empty";

/// Everything a step may read besides the object it runs on.
pub struct StepContext<'a> {
    pub printer: &'a SlaPrinterConfig,
    pub material: &'a SlaMaterialConfig,
    /// Print wide object settings.
    pub object: &'a SlaPrintObjectConfig,
    pub caps: &'a Capabilities,
    pub archive: Option<&'a dyn RasterArchive>,
    pub cancel: &'a CancelToken,
    pub reporter: &'a StatusReporter,
    pub label: &'static str,
    /// Print progress when the step starts.
    pub progress_base: f64,
    /// Share of the print progress owned by the step.
    pub progress_span: f64,
}

impl<'a> StepContext<'a> {
    pub fn check_cancel(&self) -> Result<()> {
        self.cancel.check()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Report `percent` of the running step, throttled to whole percents
    /// of the print.
    pub fn sub_progress(&self, percent: f64, message: &str) {
        let status = self.progress_base + self.progress_span * percent.clamp(0.0, 100.0) / 100.0;
        let message = if message.is_empty() { self.label } else { message };
        self.reporter.report_throttled(status, message);
    }
}

pub type ObjectStepFn = fn(&mut PrintObject, &StepContext<'_>) -> Result<()>;
pub type PrintStepFn = fn(&[PrintObject], &mut PrintOutput, &StepContext<'_>) -> Result<()>;

pub struct ObjectStepDescriptor {
    pub step: ObjectStep,
    pub label: &'static str,
    /// Share of the object progress, all weights add up to 100.
    pub weight: u32,
    pub run: ObjectStepFn,
}

pub struct PrintStepDescriptor {
    pub step: PrintStep,
    pub label: &'static str,
    pub weight: u32,
    pub run: PrintStepFn,
}

pub static OBJECT_STEPS: [ObjectStepDescriptor; 8] = [
    ObjectStepDescriptor {
        step: ObjectStep::Assembly,
        label: "Assembling model from parts",
        weight: 13,
        run: mesh_assembly,
    },
    ObjectStepDescriptor {
        step: ObjectStep::Hollowing,
        label: "Hollowing model",
        weight: 13,
        run: hollow_model,
    },
    ObjectStepDescriptor {
        step: ObjectStep::DrillHoles,
        label: "Drilling holes into model.",
        weight: 13,
        run: drill_holes,
    },
    ObjectStepDescriptor {
        step: ObjectStep::ObjectSlice,
        label: "Slicing model",
        weight: 13,
        run: slice_model,
    },
    ObjectStepDescriptor {
        step: ObjectStep::SupportPoints,
        label: "Generating support points",
        weight: 13,
        run: support_points,
    },
    ObjectStepDescriptor {
        step: ObjectStep::SupportTree,
        label: "Generating support tree",
        weight: 13,
        run: support_tree,
    },
    ObjectStepDescriptor {
        step: ObjectStep::Pad,
        label: "Generating pad",
        weight: 11,
        run: generate_pad,
    },
    ObjectStepDescriptor {
        step: ObjectStep::SliceSupports,
        label: "Slicing supports",
        weight: 11,
        run: slice_supports,
    },
];

pub static PRINT_STEPS: [PrintStepDescriptor; 2] = [
    PrintStepDescriptor {
        step: PrintStep::MergeSlicesAndEval,
        label: "Merging slices and calculating statistics",
        weight: 10,
        run: merge_slices_and_eval,
    },
    PrintStepDescriptor {
        step: PrintStep::Rasterize,
        label: "Rasterizing layers",
        weight: 90,
        run: rasterize,
    },
];

pub fn object_step_label(step: ObjectStep) -> &'static str {
    OBJECT_STEPS[step as usize].label
}

/// Put the model parts and negative volumes into the mesh stack.
fn mesh_assembly(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    po.support_data = None;
    po.hollowing_data = None;
    po.mesh_stack.clear();

    let parts = po.model.csg_parts(&po.trafo);
    debug!("Assembled '{}' from {} parts", po.name(), parts.len());
    po.mesh_stack.replace_stage(CsgStage::Assembly, parts);

    generate_preview(po, ObjectStep::Assembly, ctx);
    Ok(())
}

fn hollow_model(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    po.hollowing_data = None;
    po.support_data = None;
    po.mesh_stack.clear_from(CsgStage::Hollowing);

    if !po.config.hollowing_enable {
        info!("Skipping hollowing step!");
        return Ok(());
    }
    info!("Performing hollowing step!");

    let config = HollowingConfig::from_object_config(&po.config);
    let mesh = po
        .get_mesh_to_print()
        .unwrap_or_else(|| Arc::new(merge_positive_parts(po.mesh_stack.stage(CsgStage::Assembly))));

    let progress = |p: f64, msg: &str| ctx.sub_progress(p, msg);
    let ctl = JobController::new(ctx.cancel).with_progress(&progress);
    let interior = match ctx.caps.interior_generator.generate_interior(&mesh, &config, &ctl) {
        Ok(interior) => interior,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => {
            warn!("Interior generation failed: {}", e);
            TriangleMesh::new()
        }
    };

    if interior.is_empty() {
        warn!("{}", EMPTY_INTERIOR_WARNING);
        po.add_warning(ObjectStep::Hollowing, WarningLevel::NonCritical, EMPTY_INTERIOR_WARNING);
    } else {
        let mut interior = interior;
        interior.simplify_lossless(2.0 * f32::EPSILON as f64);
        let interior = Arc::new(interior);
        po.mesh_stack.replace_stage(
            CsgStage::Hollowing,
            vec![CsgPart::new(interior.clone(), CsgType::Difference).named("interior")],
        );
        po.hollowing_data = Some(HollowingData {
            interior: Some(interior),
        });
    }

    generate_preview(po, ObjectStep::Hollowing, ctx);
    Ok(())
}

fn drill_holes(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    po.support_data = None;

    let parts = po.model.drill_hole_parts(&po.trafo);
    if !parts.is_empty() {
        info!("Drilling {} drain holes into '{}'", parts.len(), po.name());
    }
    po.mesh_stack.replace_stage(CsgStage::DrillHoles, parts);

    generate_preview(po, ObjectStep::DrillHoles, ctx);

    // The cavity is not needed past this point.
    if let Some(hollowing) = po.hollowing_data.as_mut() {
        hollowing.interior = None;
    }
    Ok(())
}

/// Lay the slice grid and cut the mesh stack on it.
fn slice_model(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    po.support_data = None;
    po.slice_index.clear();
    po.model_slices.clear();
    po.model_height_levels.clear();

    let parts = po.mesh_stack.parts();
    let bb = positive_bounding_box(&parts);
    if !bb.is_defined() {
        return Err(Error::Slicing(INCONSISTENT_SLICE_INDEX.into()));
    }

    let min_z = bb.min.z - po.elevation();
    let mut index = SliceIndex::build(
        min_z,
        bb.max.z,
        ctx.material.initial_layer_height,
        po.config.layer_height,
    )?;

    let first = index
        .lower_bound_slice_level(bb.min.z)
        .ok_or_else(|| Error::Slicing(INCONSISTENT_SLICE_INDEX.into()))?;
    let levels: Vec<CoordF> = index.records()[first..].iter().map(|r| r.slice_level()).collect();

    let params = MeshSlicingParams::new(po.config.slicing_mode, po.config.slice_closing_radius);
    let cancel = || ctx.is_cancelled();
    let slices = slice_csgmesh(&parts, &levels, &params, &cancel)?;

    for (id, record) in index.iter_mut().skip(first).take(slices.len()).enumerate() {
        record.set_slice_idx(SliceOrigin::Model, Some(id));
    }
    debug!(
        "'{}' cut into {} model slices over {} records",
        po.name(),
        slices.len(),
        index.len()
    );

    po.slice_index = index;
    po.model_slices = slices;
    po.model_height_levels = levels;

    apply_printer_corrections(po, ctx.printer, SliceOrigin::Model);
    Ok(())
}

/// Support data for `po`, created from the current printable mesh when
/// missing. The bottom of the positive parts is refreshed every time.
fn ensure_support_data(po: &mut PrintObject) -> &mut SupportData {
    let parts = po.mesh_stack.parts();
    let zoffset = positive_bounding_box(&parts).min.z;
    let sd = match po.support_data.take() {
        Some(sd) => sd,
        None => {
            let mesh = po
                .get_mesh_to_print()
                .unwrap_or_else(|| Arc::new(merge_positive_parts(&parts)));
            SupportData::new(mesh, &po.config)
        }
    };
    let sd = po.support_data.insert(sd);
    sd.input.zoffset = zoffset;
    sd
}

/// Cut the volumes of one kind on `levels` and merge them per level.
/// No such volume gives no layers at all.
fn slice_volumes(
    model: &ModelObject,
    kind: VolumeKind,
    trafo: &Transform3D,
    levels: &[CoordF],
    params: &MeshSlicingParams,
    cancel: &(dyn Fn() -> bool + Sync),
) -> Result<Vec<ExPolygons>> {
    let mut layers: Vec<ExPolygons> = Vec::new();
    for volume in model.volumes_of_kind(kind) {
        let sliced = slice_mesh(&volume.transformed_mesh(trafo), levels, params, cancel)?;
        if layers.is_empty() {
            layers = sliced;
        } else {
            for (layer, extra) in layers.iter_mut().zip(sliced) {
                layer.extend(extra);
                *layer = union_ex(layer);
            }
        }
    }
    Ok(layers)
}

/// Keep the points allowed by the modifier volumes. A point inside an
/// enforcer always stays; otherwise it goes when enforcers are exclusive
/// or a blocker covers it. Points above the top level are dropped.
fn filter_support_points(
    points: &mut Vec<SupportPoint>,
    blockers: &[ExPolygons],
    enforcers: &[ExPolygons],
    enforcers_only: bool,
    levels: &[CoordF],
) {
    let enforcers_only = enforcers_only && !enforcers.is_empty();
    points.retain(|sp| {
        let idx = levels.partition_point(|&l| l < sp.pos.z);
        if idx >= levels.len() {
            return false;
        }
        let p = sp.pos.to_2d_scaled();
        let enforced = enforcers
            .get(idx)
            .map_or(false, |layer| expolygons_contain(layer, &p));
        if enforced {
            return true;
        }
        if enforcers_only {
            return false;
        }
        !blockers
            .get(idx)
            .map_or(false, |layer| expolygons_contain(layer, &p))
    });
}

fn support_points(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    if !po.config.supports_enable {
        return Ok(());
    }
    ensure_support_data(po);

    if po.model.points_status == PointsStatus::UserModified {
        let points = po.model.transformed_support_points(&po.trafo);
        debug!("Using {} user support points", points.len());
        ensure_support_data(po).input.points = points;
        return Ok(());
    }

    let config = SupportPointConfig {
        density_relative: po.config.support_points_density_relative / 100.0,
        minimal_distance: po.config.support_points_minimal_distance,
        head_diameter: po.config.support_head_front_diameter,
    };
    let mesh = ensure_support_data(po).input.mesh.clone();

    let progress = |p: f64, msg: &str| ctx.sub_progress(p, msg);
    let ctl = JobController::new(ctx.cancel).with_progress(&progress);
    let mut points = ctx.caps.support_point_generator.generate(
        &mesh,
        &po.model_slices,
        &po.model_height_levels,
        &config,
        &ctl,
    )?;
    ctx.check_cancel()?;

    let params = MeshSlicingParams::new(SlicingMode::Regular, po.config.slice_closing_radius);
    let cancel = || ctx.is_cancelled();
    let levels = &po.model_height_levels;
    let blockers = slice_volumes(&po.model, VolumeKind::SupportBlocker, &po.trafo, levels, &params, &cancel)?;
    let enforcers = slice_volumes(&po.model, VolumeKind::SupportEnforcer, &po.trafo, levels, &params, &cancel)?;
    filter_support_points(
        &mut points,
        &blockers,
        &enforcers,
        po.config.support_enforcers_only,
        levels,
    );

    debug!("Automatic support points: {}", points.len());
    ensure_support_data(po).input.points = points;
    ctx.reporter
        .notify(ctx.label, StatusFlags::RELOAD_SLA_SUPPORT_POINTS);
    Ok(())
}

fn support_tree(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    let config = po.config.clone();
    let sd = match po.support_data.as_mut() {
        Some(sd) => sd,
        None => return Ok(()),
    };

    // Points on the bottom would end up inside the pad.
    if config.is_zero_elevation() {
        let limit = sd.input.zoffset + EPSILON;
        sd.input.points.retain(|p| p.pos.z > limit);
    }
    sd.tree_config = SupportTreeConfig::from_object_config(&config);
    sd.pad_config = PadConfig::from_object_config(&config);

    let progress = |p: f64, msg: &str| ctx.sub_progress(p, msg);
    let ctl = JobController::new(ctx.cancel).with_progress(&progress);
    if sd.tree_config.enabled {
        sd.create_support_tree(ctx.caps.support_tree_builder.as_ref(), &ctl)?;
    } else {
        sd.tree_mesh = TriangleMesh::new();
    }

    if !config.supports_enable {
        return Ok(());
    }
    ctx.check_cancel()?;

    debug!("Processed support point count {}", sd.input.points.len());
    let empty = sd.tree_mesh.is_empty();
    if empty {
        warn!("{}", EMPTY_SUPPORT_WARNING);
        po.add_warning(ObjectStep::SupportTree, WarningLevel::NonCritical, EMPTY_SUPPORT_WARNING);
    }
    ctx.reporter
        .notify("Visualizing supports", StatusFlags::RELOAD_SCENE);
    Ok(())
}

fn generate_pad(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    if po.config.pad_enable {
        let pad_config = PadConfig::from_object_config(&po.config);
        pad_config.validate().map_err(Error::Slicing)?;

        let sd = ensure_support_data(po);
        sd.pad_config = pad_config;

        let ctl = JobController::new(ctx.cancel);
        sd.create_pad(ctx.caps.support_tree_builder.as_ref(), &ctl)?;
        if !validate_pad(&sd.pad_mesh, &sd.pad_config) {
            return Err(Error::Slicing(NO_PAD_ERROR.into()));
        }
    } else if let Some(sd) = po.support_data.as_mut() {
        sd.pad_mesh = TriangleMesh::new();
    }

    ctx.check_cancel()?;
    ctx.reporter
        .notify("Visualizing supports", StatusFlags::RELOAD_SCENE);
    Ok(())
}

/// Cut the tree and the pad on every record of the grid.
fn slice_supports(po: &mut PrintObject, ctx: &StepContext<'_>) -> Result<()> {
    if let Some(sd) = po.support_data.as_mut() {
        sd.support_slices.clear();
    }
    for record in po.slice_index.iter_mut() {
        record.set_slice_idx(SliceOrigin::Support, None);
    }

    if !po.config.supports_enable && !po.config.pad_enable {
        return Ok(());
    }

    if let Some(sd) = po.support_data.as_mut() {
        let levels = po.slice_index.slice_levels();
        let params = MeshSlicingParams::new(SlicingMode::Regular, po.config.slice_closing_radius);
        let cancel = || ctx.is_cancelled();
        sd.support_slices = slice_mesh(&sd.support_mesh(), &levels, &params, &cancel)?;

        let count = sd.support_slices.len();
        for (i, record) in po.slice_index.iter_mut().take(count).enumerate() {
            record.set_slice_idx(SliceOrigin::Support, Some(i));
        }
    }

    apply_printer_corrections(po, ctx.printer, SliceOrigin::Support);
    ctx.reporter.notify("", StatusFlags::RELOAD_SLA_PREVIEW);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ExPolygon, Point, Point3F, Polygon};

    fn square_layer(x0: f64, y0: f64, x1: f64, y1: f64) -> ExPolygons {
        vec![ExPolygon::new(Polygon::rectangle(
            Point::new_scale(x0, y0),
            Point::new_scale(x1, y1),
        ))]
    }

    fn point(x: f64, y: f64, z: f64) -> SupportPoint {
        SupportPoint::new(Point3F::new(x, y, z), 0.2, false)
    }

    #[test]
    fn test_step_tables() {
        let object_total: u32 = OBJECT_STEPS.iter().map(|d| d.weight).sum();
        let print_total: u32 = PRINT_STEPS.iter().map(|d| d.weight).sum();
        assert_eq!(object_total, 100);
        assert_eq!(print_total, 100);
        for (i, desc) in OBJECT_STEPS.iter().enumerate() {
            assert_eq!(desc.step as usize, i);
        }
        assert_eq!(object_step_label(ObjectStep::Pad), "Generating pad");
    }

    #[test]
    fn test_filter_blockers() {
        let levels = vec![1.0, 2.0, 3.0];
        let blockers = vec![Vec::new(), square_layer(0.0, 0.0, 5.0, 5.0), Vec::new()];
        let mut points = vec![
            point(1.0, 1.0, 2.0),
            point(8.0, 8.0, 2.0),
            point(1.0, 1.0, 0.5),
            point(1.0, 1.0, 9.0),
        ];
        filter_support_points(&mut points, &blockers, &[], false, &levels);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.pos.z < 3.0));
        assert!(points.iter().any(|p| p.pos.x == 8.0));
    }

    #[test]
    fn test_filter_enforcers_override_blockers() {
        let levels = vec![1.0, 2.0];
        let everything = square_layer(-10.0, -10.0, 10.0, 10.0);
        let blockers = vec![everything.clone(), everything];
        let enforcers = vec![square_layer(0.0, 0.0, 2.0, 2.0), Vec::new()];
        let mut points = vec![point(1.0, 1.0, 1.0), point(5.0, 5.0, 1.0)];
        filter_support_points(&mut points, &blockers, &enforcers, false, &levels);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].pos.x, 1.0);
    }

    #[test]
    fn test_filter_enforcers_only() {
        let levels = vec![1.0];
        let enforcers = vec![square_layer(0.0, 0.0, 2.0, 2.0)];
        let mut points = vec![point(1.0, 1.0, 1.0), point(5.0, 5.0, 1.0)];
        filter_support_points(&mut points, &[], &enforcers, true, &levels);
        assert_eq!(points.len(), 1);

        // Without any enforcer volume the flag has nothing to select by.
        let mut points = vec![point(1.0, 1.0, 1.0), point(5.0, 5.0, 1.0)];
        filter_support_points(&mut points, &[], &[], true, &levels);
        assert_eq!(points.len(), 2);
    }
}
