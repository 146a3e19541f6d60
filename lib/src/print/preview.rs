//! Preview meshes of the model after the mesh producing steps.
//!
//! The preview is only a picture of the print: slices are always cut from
//! the part sequence itself, so an approximated preview never affects them.

use super::print_object::{PrintObject, WarningLevel};
use super::state::ObjectStep;
use super::steps::StepContext;
use crate::csg::{is_all_positive, merge_positive_parts, CsgPart, CsgStage, VoxelParams};
use crate::hollowing::HollowMeshResult;
use crate::mesh::TriangleMesh;
use log::{debug, warn};

/// Finest voxel grid (voxels per mm) a preview is computed on.
pub const MAX_PREVIEW_VOXEL_SCALE: f64 = 12.0;

pub const APPROXIMATED_PREVIEW_WARNING: &str = "Some parts of the print will be previewed with \
approximated meshes. This does not affect the quality of slices or the physical print in any way.";

pub const FAULTY_MESH_WARNING: &str =
    "Mesh to be hollowed is not suitable for hollowing (does not bound a volume).";
pub const FAULTY_HOLES_WARNING: &str =
    "Unable to drill the current configuration of holes into the model.";
pub const DRILLING_FAILED_WARNING: &str = "Drilling holes into the mesh failed. This is usually \
caused by broken model. Try to fix it first.";
pub const HOLE_FAILED_WARNING: &str = "Failed to drill some holes into the model";

/// Compute the preview of `po` after `step` and store it, dropping the
/// previews of later steps.
///
/// Tried in order: merging when everything is positive, the boolean
/// backend, the direct hollow-and-drill path and finally voxelization.
pub fn generate_preview(po: &mut PrintObject, step: ObjectStep, ctx: &StepContext<'_>) {
    let parts = po.mesh_stack.parts();

    let mut mesh = if is_all_positive(&parts) {
        Some(merge_positive_parts(&parts))
    } else {
        boolean_preview(&parts, ctx)
    };

    if mesh.is_none() {
        mesh = match step {
            ObjectStep::Hollowing => hollowed_preview(po, ctx),
            ObjectStep::DrillHoles => drilled_preview(po, ctx),
            _ => None,
        };
    }

    let mesh = match mesh {
        Some(mesh) => mesh,
        None => {
            po.add_warning(step, WarningLevel::NonCritical, APPROXIMATED_PREVIEW_WARNING);
            voxel_preview(po, &parts, ctx)
        }
    };

    debug!(
        "Preview of '{}' after {:?}: {} triangles",
        po.name(),
        step,
        mesh.triangle_count()
    );
    po.set_preview(step, mesh);
}

fn boolean_preview(parts: &[CsgPart], ctx: &StepContext<'_>) -> Option<TriangleMesh> {
    let backend = &ctx.caps.csg_backend;
    if let Some(idx) = backend.check_eligibility(parts) {
        warn!("CSG mesh is not eligible for proper CSG representation (part {idx})");
        return None;
    }
    match backend.perform_booleans(parts) {
        Ok(mesh) => Some(mesh),
        Err(e) => {
            debug!("Boolean preview failed: {}", e);
            None
        }
    }
}

/// Hollow the merged model directly when nothing but the cavity is
/// subtracted from it.
fn hollowed_preview(po: &mut PrintObject, ctx: &StepContext<'_>) -> Option<TriangleMesh> {
    let assembly = po.mesh_stack.stage(CsgStage::Assembly);
    if !is_all_positive(assembly) {
        return None;
    }
    let interior = po.hollowing_data.as_ref()?.interior.clone()?;
    let mut mesh = merge_positive_parts(assembly);
    let result =
        ctx.caps
            .hollower
            .hollow_mesh_and_drill(&mut mesh, Some(interior.as_ref()), &[], &mut |_| {});
    if result.contains(HollowMeshResult::FAULTY_MESH) {
        po.add_warning(ObjectStep::Hollowing, WarningLevel::NonCritical, FAULTY_MESH_WARNING);
        return None;
    }
    Some(mesh)
}

/// Without holes the previous preview stands. With holes and a cavity,
/// hollow and drill the merged model.
fn drilled_preview(po: &mut PrintObject, ctx: &StepContext<'_>) -> Option<TriangleMesh> {
    let holes = po.model.transformed_drain_holes(&po.trafo);
    if holes.is_empty() {
        return po.get_mesh_to_print().map(|m| (*m).clone());
    }
    let interior = po.hollowing_data.as_ref()?.interior.clone()?;

    let mut mesh = merge_positive_parts(po.mesh_stack.stage(CsgStage::Assembly));
    let mut hole_failed = false;
    let result = ctx.caps.hollower.hollow_mesh_and_drill(
        &mut mesh,
        Some(interior.as_ref()),
        &holes,
        &mut |_| hole_failed = true,
    );

    let step = ObjectStep::DrillHoles;
    if result.contains(HollowMeshResult::FAULTY_MESH) {
        po.add_warning(step, WarningLevel::NonCritical, FAULTY_MESH_WARNING);
    }
    if result.contains(HollowMeshResult::FAULTY_HOLES) {
        po.add_warning(step, WarningLevel::NonCritical, FAULTY_HOLES_WARNING);
    }
    if result.contains(HollowMeshResult::DRILLING_FAILED) {
        po.add_warning(step, WarningLevel::NonCritical, DRILLING_FAILED_WARNING);
    }
    if hole_failed {
        po.add_warning(step, WarningLevel::NonCritical, HOLE_FAILED_WARNING);
    }

    if result.contains(HollowMeshResult::DRILLING_FAILED) || hole_failed {
        None
    } else {
        Some(mesh)
    }
}

/// Approximate the whole sequence through a voxel grid. Any failure
/// leaves an empty preview.
fn voxel_preview(po: &PrintObject, parts: &[CsgPart], ctx: &StepContext<'_>) -> TriangleMesh {
    let layer_height = po.config.layer_height.max(crate::EPSILON);
    let params = VoxelParams {
        voxel_scale: MAX_PREVIEW_VOXEL_SCALE.min(1.0 / layer_height),
        exterior_bandwidth: 1.0,
        interior_bandwidth: 1.0,
    };
    let cancel = || ctx.cancel.is_cancelled();
    let voxelizer = &ctx.caps.voxelizer;

    let mesh = voxelizer
        .voxelize(parts, &params, &cancel)
        .and_then(|grid| voxelizer.grid_to_mesh(&grid, 0.0, 0.01));
    match mesh {
        Ok(mut mesh) => {
            mesh.simplify_lossless(1e-6);
            mesh
        }
        Err(e) => {
            warn!("Voxelized preview of '{}' failed: {}", po.name(), e);
            TriangleMesh::new()
        }
    }
}
