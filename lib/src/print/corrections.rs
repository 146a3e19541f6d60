//! Printer corrections applied to freshly cut slices.

use super::print_object::PrintObject;
use super::slice_record::SliceOrigin;
use crate::clipper::{offset_expolygons, OffsetJoinType};
use crate::config::SlaPrinterConfig;
use crate::geometry::{elephant_foot_compensation, faded_compensation};
use crate::scale;
use log::debug;

/// Grow every slice of `origin` by the absolute correction, then shrink
/// the first `faded_layers` records by the fading elephant foot
/// compensation. A zero configuration leaves the slices untouched.
pub fn apply_printer_corrections(po: &mut PrintObject, printer: &SlaPrinterConfig, origin: SliceOrigin) {
    let PrintObject {
        slice_index,
        model_slices,
        support_data,
        config,
        ..
    } = po;

    let slices = match origin {
        SliceOrigin::Model => model_slices,
        SliceOrigin::Support => match support_data.as_mut() {
            Some(sd) => &mut sd.support_slices,
            None => return,
        },
    };

    let faded = config.faded_layers.min(slice_index.len());
    let fade_steps = faded.saturating_sub(1).max(1);
    let min_width = printer.elefant_foot_min_width / 2.0;
    let start = printer.elefant_foot_compensation;
    let absolute = printer.absolute_correction;

    if scale(absolute) != 0 {
        for record in slice_index.iter() {
            if let Some(slice) = record.slice_idx(origin).and_then(|i| slices.get_mut(i)) {
                *slice = offset_expolygons(slice, absolute, OffsetJoinType::Miter);
            }
        }
    }

    if start > 0.0 {
        for (i, record) in slice_index.iter().take(faded).enumerate() {
            let amount = faded_compensation(start, fade_steps, i);
            if let Some(slice) = record.slice_idx(origin).and_then(|i| slices.get_mut(i)) {
                *slice = elephant_foot_compensation(slice, min_width, amount);
            }
        }
        debug!(
            "Elephant foot compensation {:.3} mm faded over {} layers ({:?})",
            start, faded, origin
        );
    }
}
