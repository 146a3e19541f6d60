//! Global layer table and print statistics.

use super::print_object::PrintObject;
use super::slice_record::SliceOrigin;
use super::steps::StepContext;
use crate::clipper::{difference, union_ex};
use crate::config::{MaterialPrintSpeed, SlaMaterialConfig, SlaPrinterConfig};
use crate::geometry::{expolygons_area, ExPolygon, ExPolygons};
use crate::{Coord, CoordF, Error, Result, SCALED_EPSILON, SCALING_FACTOR};
use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const UNPRINTABLE_OBJECTS_ERROR: &str = "There are unprintable objects. Try to adjust support \
settings to make the objects printable.";

/// Layers exposed with the initial time regardless of the fade.
const INITIAL_FULL_EXPOSURE_LAYERS: usize = 3;

// Mechanical delays of one layer (s).
const SLOW_MOVE_DELAY: CoordF = 3.0;
const HIGH_VISCOSITY_MOVE_DELAY: CoordF = 3.5;
const SLOW_TILT_MOVE_DELAY: CoordF = 1.0;
/// Tower lift time per mm of layer height.
const TOWER_LIFT_FACTOR: CoordF = 5.0;
const COMPUTATION_DELAY: CoordF = 0.12;

/// A slice record of one object, by position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceRef {
    pub object: usize,
    pub record: usize,
}

/// One layer of the whole print.
#[derive(Clone, Debug, Default)]
pub struct PrintLayer {
    level: Coord,
    slices: Vec<SliceRef>,
    transformed_slices: ExPolygons,
    model_area: CoordF,
    support_area: CoordF,
    layer_height: CoordF,
    is_fast: bool,
    time: CoordF,
}

impl PrintLayer {
    pub fn new(level: Coord) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Height above the ground (scaled), on the epsilon grid.
    pub fn level(&self) -> Coord {
        self.level
    }

    pub fn slices(&self) -> &[SliceRef] {
        &self.slices
    }

    /// Model and support of every instance, in display coordinates.
    pub fn transformed_slices(&self) -> &[ExPolygon] {
        &self.transformed_slices
    }

    /// Model area in mm².
    pub fn model_area(&self) -> CoordF {
        self.model_area / (SCALING_FACTOR * SCALING_FACTOR)
    }

    /// Support area in mm², without the parts covered by the model.
    pub fn support_area(&self) -> CoordF {
        self.support_area / (SCALING_FACTOR * SCALING_FACTOR)
    }

    pub fn layer_height(&self) -> CoordF {
        self.layer_height
    }

    pub fn is_fast(&self) -> bool {
        self.is_fast
    }

    /// Exposure plus mechanical time (s).
    pub fn time(&self) -> CoordF {
        self.time
    }
}

/// Material and time estimate of a print.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PrintStatistics {
    /// mm³
    pub objects_used_material: CoordF,
    /// mm³
    pub support_used_material: CoordF,
    /// Seconds, NaN when there is nothing to print.
    pub estimated_print_time: CoordF,
    pub layers_times: Vec<CoordF>,
    pub fast_layers_count: usize,
    pub slow_layers_count: usize,
}

impl PrintStatistics {
    pub fn layer_count(&self) -> usize {
        self.fast_layers_count + self.slow_layers_count
    }

    pub fn total_used_material(&self) -> CoordF {
        self.objects_used_material + self.support_used_material
    }
}

impl fmt::Display for PrintStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Layers:            {}", self.layer_count())?;
        writeln!(
            f,
            "Fast/slow layers:  {}/{}",
            self.fast_layers_count, self.slow_layers_count
        )?;
        writeln!(f, "Model material:    {:.2} ml", self.objects_used_material / 1000.0)?;
        writeln!(f, "Support material:  {:.2} ml", self.support_used_material / 1000.0)?;
        if self.estimated_print_time.is_nan() {
            write!(f, "Estimated time:    n/a")
        } else {
            let secs = self.estimated_print_time.round() as u64;
            write!(
                f,
                "Estimated time:    {}h {:02}m {:02}s",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            )
        }
    }
}

/// Result of the print steps.
#[derive(Debug, Default)]
pub struct PrintOutput {
    pub layers: Vec<PrintLayer>,
    pub statistics: PrintStatistics,
}

impl PrintOutput {
    pub fn clear(&mut self) {
        self.layers.clear();
        self.statistics = PrintStatistics::default();
    }
}

/// Exposure time of every layer, in layer order.
///
/// The first layers get the initial exposure, then the exposure fades
/// linearly toward the regular one over `faded_layers`.
pub fn exposure_times(material: &SlaMaterialConfig, faded_layers: usize, layer_count: usize) -> Vec<CoordF> {
    let initial = material.initial_exposure_time;
    let regular = material.exposure_time;
    let delta = (initial - regular) / (faded_layers + 1) as CoordF;

    let mut fade = initial;
    (0..layer_count)
        .map(|i| {
            if i < INITIAL_FULL_EXPOSURE_LAYERS {
                initial
            } else if fade > regular {
                fade = (fade - delta).max(regular);
                fade
            } else {
                regular
            }
        })
        .collect()
}

/// Tilt and move time of a layer (s), exposure excluded.
pub fn mechanical_time(printer: &SlaPrinterConfig, speed: MaterialPrintSpeed, is_fast: bool, layer_height: CoordF) -> CoordF {
    let (tilt, delay) = match speed {
        MaterialPrintSpeed::Slow => (printer.slow_tilt_time, SLOW_MOVE_DELAY),
        MaterialPrintSpeed::HighViscosity => (printer.high_viscosity_tilt_time, HIGH_VISCOSITY_MOVE_DELAY),
        MaterialPrintSpeed::Fast if is_fast => (printer.fast_tilt_time, 0.0),
        MaterialPrintSpeed::Fast => (printer.slow_tilt_time, SLOW_TILT_MOVE_DELAY),
    };
    tilt + delay + layer_height * TOWER_LIFT_FACTOR + COMPUTATION_DELAY
}

/// Sort the records of all complete objects into global layers.
fn build_layer_table(objects: &[PrintObject]) -> Result<Vec<PrintLayer>> {
    let mut table: BTreeMap<Coord, PrintLayer> = BTreeMap::new();

    for (obj_idx, po) in objects.iter().enumerate() {
        if !po.is_complete() {
            continue;
        }
        let index = po.slice_index();
        let first = match index.first() {
            Some(first) => first,
            None => continue,
        };
        let initial_height = crate::scale(first.layer_height());
        let ground = first.print_level() - initial_height;

        for (rec_idx, record) in index.iter().enumerate() {
            if !record.is_valid() {
                return Err(Error::Slicing(UNPRINTABLE_OBJECTS_ERROR.into()));
            }
            let level = SCALED_EPSILON * ((record.print_level() - ground) / SCALED_EPSILON);
            let layer = table.entry(level).or_insert_with(|| PrintLayer::new(level));
            layer.slices.push(SliceRef {
                object: obj_idx,
                record: rec_idx,
            });
            layer.layer_height = layer.layer_height.max(record.layer_height());
        }
    }

    Ok(table.into_values().collect())
}

/// Model and support polygons of one layer, every instance placed.
fn instance_slices(objects: &[PrintObject], layer: &PrintLayer) -> (ExPolygons, ExPolygons) {
    let mut model = ExPolygons::new();
    let mut support = ExPolygons::new();

    for slice in &layer.slices {
        let po = &objects[slice.object];
        let record = match po.slice_index().get(slice.record) {
            Some(record) => record,
            None => continue,
        };
        for (origin, out) in [(SliceOrigin::Model, &mut model), (SliceOrigin::Support, &mut support)] {
            for polygons in po.slices_of(record, origin) {
                for instance in po.instances() {
                    for ex in polygons {
                        let mut ex = ex.clone();
                        if instance.left_handed {
                            ex.mirror_x();
                        }
                        ex.rotate(instance.rotation);
                        ex.translate(instance.shift);
                        out.push(ex);
                    }
                }
            }
        }
    }
    (model, support)
}

#[derive(Default)]
struct Totals {
    model_volume: CoordF,
    support_volume: CoordF,
    estimated_time: CoordF,
    layers_times: Vec<CoordF>,
    fast: usize,
    slow: usize,
}

/// Build the global layer table of the complete objects and estimate
/// material and time.
pub fn merge_slices_and_eval(objects: &[PrintObject], output: &mut PrintOutput, ctx: &StepContext<'_>) -> Result<()> {
    output.clear();
    let mut layers = build_layer_table(objects)?;
    ctx.check_cancel()?;

    let material = ctx.material;
    let printer = ctx.printer;
    let display_area = printer.display_area() * SCALING_FACTOR * SCALING_FACTOR;
    let fast_limit = display_area * material.area_fill / 100.0;
    let exposures = exposure_times(material, ctx.object.faded_layers, layers.len());

    let totals = Mutex::new(Totals {
        layers_times: Vec::with_capacity(layers.len()),
        ..Totals::default()
    });

    layers
        .par_iter_mut()
        .zip(exposures.par_iter())
        .try_for_each(|(layer, &exposure)| {
            ctx.check_cancel()?;
            let (model, support) = instance_slices(objects, layer);

            let model = union_ex(&model);
            let support = if support.is_empty() {
                support
            } else if model.is_empty() {
                union_ex(&support)
            } else {
                difference(&support, &model)
            };

            layer.model_area = expolygons_area(&model);
            layer.support_area = expolygons_area(&support);
            layer.is_fast = layer.model_area + layer.support_area <= fast_limit;
            layer.time = exposure
                + mechanical_time(printer, material.material_print_speed, layer.is_fast, layer.layer_height);

            let mut all = model;
            all.extend(support);
            layer.transformed_slices = union_ex(&all);

            let mut totals = totals.lock();
            totals.model_volume += layer.model_area * layer.layer_height;
            totals.support_volume += layer.support_area * layer.layer_height;
            totals.estimated_time += layer.time;
            totals.layers_times.push(layer.time);
            if layer.is_fast {
                totals.fast += 1;
            } else {
                totals.slow += 1;
            }
            Ok::<(), Error>(())
        })?;

    let totals = totals.into_inner();
    let area_scale = SCALING_FACTOR * SCALING_FACTOR;
    output.statistics = PrintStatistics {
        objects_used_material: totals.model_volume / area_scale,
        support_used_material: totals.support_volume / area_scale,
        estimated_print_time: if layers.is_empty() {
            CoordF::NAN
        } else {
            totals.estimated_time
        },
        layers_times: totals.layers_times,
        fast_layers_count: totals.fast,
        slow_layers_count: totals.slow,
    };
    debug!(
        "{} print layers, {} fast, {} slow",
        layers.len(),
        totals.fast,
        totals.slow
    );
    info!(
        "Model material {:.3} mm3, support material {:.3} mm3",
        output.statistics.objects_used_material, output.statistics.support_used_material
    );
    output.layers = layers;
    Ok(())
}
