//! Slicing a CSG sequence without evaluating the booleans in 3D.
//!
//! Every part is sliced on its own and the booleans are applied to the
//! resulting layers.

use super::{CsgPart, CsgStackOp, CsgType};
use crate::clipper::{difference, intersection, union_ex};
use crate::geometry::ExPolygons;
use crate::slice::{slice_mesh, MeshSlicingParams};
use crate::{CoordF, Result, SCALED_EPSILON};
use log::debug;
use rayon::prelude::*;

struct Frame {
    operation: CsgType,
    layers: Vec<ExPolygons>,
}

impl Frame {
    fn new(operation: CsgType, layer_count: usize) -> Self {
        Self {
            operation,
            layers: vec![ExPolygons::new(); layer_count],
        }
    }
}

fn apply(operation: CsgType, target: &mut [ExPolygons], source: Vec<ExPolygons>) {
    target
        .par_iter_mut()
        .zip(source.into_par_iter())
        .for_each(|(dst, src)| match operation {
            CsgType::Union => dst.extend(src),
            CsgType::Difference => *dst = difference(dst, &src),
            CsgType::Intersection => *dst = intersection(dst, &src),
        });
}

/// Slice every part of `parts` at `zs` and combine the layers according to
/// the part operations and stack markers.
///
/// Slivers with an area below `SCALED_EPSILON²` are dropped and each layer
/// is returned as a disjoint union.
pub fn slice_csgmesh(
    parts: &[CsgPart],
    zs: &[CoordF],
    params: &MeshSlicingParams,
    cancel: &(dyn Fn() -> bool + Sync),
) -> Result<Vec<ExPolygons>> {
    let mut stack = vec![Frame::new(CsgType::Union, zs.len())];

    for part in parts {
        let mut operation = part.operation;
        if part.stack_operation == CsgStackOp::Push {
            stack.push(Frame::new(operation, zs.len()));
            operation = CsgType::Union;
        }

        if let Some(mesh) = part.mesh() {
            let layers = slice_mesh(mesh, zs, params, cancel)?;
            if let Some(top) = stack.last_mut() {
                apply(operation, &mut top.layers, layers);
            }
        }

        if part.stack_operation == CsgStackOp::Pop && stack.len() > 1 {
            if let Some(frame) = stack.pop() {
                if let Some(top) = stack.last_mut() {
                    apply(frame.operation, &mut top.layers, frame.layers);
                }
            }
        }
    }

    // Unbalanced pushes are folded into their parents.
    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            if let Some(top) = stack.last_mut() {
                apply(frame.operation, &mut top.layers, frame.layers);
            }
        }
    }

    let min_area = (SCALED_EPSILON * SCALED_EPSILON) as f64;
    let layers = stack.pop().map(|f| f.layers).unwrap_or_default();
    let result: Vec<ExPolygons> = layers
        .into_par_iter()
        .map(|mut layer| {
            layer.retain(|ex| ex.area() >= min_area);
            union_ex(&layer)
        })
        .collect();

    debug!("Sliced {} CSG parts at {} levels", parts.len(), zs.len());
    Ok(result)
}
