//! Elephant foot compensation for the bottom layers of a resin print.
//!
//! Over-exposure of the first layers against the build platform makes them
//! bulge outwards. The compensation shrinks those layers, fading the amount
//! out over a configurable number of layers.

use crate::clipper::{offset_expolygon, OffsetJoinType};
use crate::geometry::ExPolygon;
use crate::unscale;

/// Amount of compensation (mm) at fade position `i`.
///
/// The amount starts at `start` for the first layer and decreases linearly,
/// reaching `start / faded_layers` at position `faded_layers - 1`. Positions
/// at or past the fade return zero. A zero fade length is treated as one
/// layer.
pub fn faded_compensation(start: f64, faded_layers: usize, i: usize) -> f64 {
    let faded = faded_layers.max(1);
    if i >= faded {
        return 0.0;
    }
    (faded - i) as f64 * start / faded as f64
}

/// Shrink one expolygon by `compensation` mm, unless it is too narrow to
/// keep at least `min_contour_width` mm after shrinking from both sides.
///
/// All pieces of the offset result are kept; a shape that falls apart
/// into several islands stays as several islands.
pub fn compensate_expolygon(
    expolygon: &ExPolygon,
    compensation: f64,
    min_contour_width: f64,
) -> Vec<ExPolygon> {
    if compensation <= 0.0 || !can_compensate(expolygon, compensation, min_contour_width) {
        return vec![expolygon.clone()];
    }

    let shrunk = offset_expolygon(expolygon, -compensation, OffsetJoinType::Round);
    if shrunk.is_empty() {
        // Keep the feature rather than losing it from the first layers.
        return vec![expolygon.clone()];
    }
    shrunk
}

/// Apply [`compensate_expolygon`] to a whole layer.
pub fn elephant_foot_compensation(
    expolygons: &[ExPolygon],
    min_contour_width: f64,
    compensation: f64,
) -> Vec<ExPolygon> {
    if compensation <= 0.0 {
        return expolygons.to_vec();
    }
    expolygons
        .iter()
        .flat_map(|ex| compensate_expolygon(ex, compensation, min_contour_width))
        .collect()
}

/// Conservative width estimate from the bounding box: the contour needs
/// `2 * compensation + min_contour_width` in both directions.
fn can_compensate(expolygon: &ExPolygon, compensation: f64, min_contour_width: f64) -> bool {
    let min_required_width = 2.0 * compensation + min_contour_width;

    let bbox = expolygon.contour.bounding_box();
    let min_dimension = unscale(bbox.width()).min(unscale(bbox.height()));

    min_dimension >= min_required_width
}
