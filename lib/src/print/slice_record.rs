//! The height grid every object is cut on.

use crate::{scale, unscale, Coord, CoordF, Error, Result};
use serde::{Deserialize, Serialize};

/// Which slice set of an object a record points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SliceOrigin {
    Model,
    Support,
}

/// One layer of an object: where it prints, where it was cut, and which
/// model and support slices belong to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SliceRecord {
    print_level: Coord,
    slice_level: CoordF,
    layer_height: CoordF,
    model_slices_idx: Option<usize>,
    support_slices_idx: Option<usize>,
}

impl SliceRecord {
    pub fn new(print_level: Coord, slice_level: CoordF, layer_height: CoordF) -> Self {
        Self {
            print_level,
            slice_level,
            layer_height,
            model_slices_idx: None,
            support_slices_idx: None,
        }
    }

    /// Top of the layer in scaled units.
    pub fn print_level(&self) -> Coord {
        self.print_level
    }

    /// Z (mm) the meshes were cut at, the middle of the layer.
    pub fn slice_level(&self) -> CoordF {
        self.slice_level
    }

    pub fn layer_height(&self) -> CoordF {
        self.layer_height
    }

    pub fn slice_idx(&self, origin: SliceOrigin) -> Option<usize> {
        match origin {
            SliceOrigin::Model => self.model_slices_idx,
            SliceOrigin::Support => self.support_slices_idx,
        }
    }

    pub fn set_slice_idx(&mut self, origin: SliceOrigin, idx: Option<usize>) {
        match origin {
            SliceOrigin::Model => self.model_slices_idx = idx,
            SliceOrigin::Support => self.support_slices_idx = idx,
        }
    }

    /// A record is printable once it references at least one slice set.
    pub fn is_valid(&self) -> bool {
        self.model_slices_idx.is_some() || self.support_slices_idx.is_some()
    }
}

/// Ordered slice records of one object, strictly increasing print level.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceIndex {
    records: Vec<SliceRecord>,
}

impl SliceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay the grid from `min_z` (ground, mm) up to `max_z` (model top).
    ///
    /// The first layer is `initial_layer_height` thick, all others
    /// `layer_height`. The grid always reaches the top of the model: when
    /// the regular step stops below it, one more layer is added.
    pub fn build(
        min_z: CoordF,
        max_z: CoordF,
        initial_layer_height: CoordF,
        layer_height: CoordF,
    ) -> Result<Self> {
        let ilhs = scale(initial_layer_height);
        let lhs = scale(layer_height);
        if ilhs <= 0 || lhs <= 0 {
            return Err(Error::Config(format!(
                "layer heights must be positive (initial {initial_layer_height}, regular {layer_height})"
            )));
        }

        let min_zs = scale(min_z);
        let max_zs = scale(max_z);
        let cap = 1 + ((max_zs - min_zs - ilhs).max(0) / lhs) as usize;

        let mut records = Vec::with_capacity(cap + 1);
        records.push(SliceRecord::new(
            min_zs + ilhs,
            min_z + initial_layer_height / 2.0,
            initial_layer_height,
        ));

        let mut h = min_zs + ilhs + lhs;
        while h <= max_zs {
            records.push(SliceRecord::new(h, unscale(h) - layer_height / 2.0, layer_height));
            h += lhs;
        }

        if let Some(last) = records.last() {
            if last.print_level < max_zs {
                let h = last.print_level + lhs;
                records.push(SliceRecord::new(h, unscale(h) - layer_height / 2.0, layer_height));
            }
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, idx: usize) -> Option<&SliceRecord> {
        self.records.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut SliceRecord> {
        self.records.get_mut(idx)
    }

    pub fn first(&self) -> Option<&SliceRecord> {
        self.records.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SliceRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SliceRecord> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[SliceRecord] {
        &self.records
    }

    pub fn slice_levels(&self) -> Vec<CoordF> {
        self.records.iter().map(|r| r.slice_level).collect()
    }

    /// Position of the first record cut at or above `level` (mm).
    pub fn lower_bound_slice_level(&self, level: CoordF) -> Option<usize> {
        let idx = self.records.partition_point(|r| r.slice_level < level);
        (idx < self.records.len()).then_some(idx)
    }

    /// The record whose print level is nearest to `level`, if it is within
    /// `max_distance` scaled units.
    pub fn closest_by_print_level(&self, level: Coord, max_distance: Coord) -> Option<&SliceRecord> {
        let idx = self.records.partition_point(|r| r.print_level < level);
        let candidates = [idx.checked_sub(1), Some(idx)];
        candidates
            .into_iter()
            .flatten()
            .filter_map(|i| self.records.get(i))
            .min_by_key(|r| (r.print_level - level).abs())
            .filter(|r| (r.print_level - level).abs() <= max_distance)
    }
}

impl<'a> IntoIterator for &'a SliceIndex {
    type Item = &'a SliceRecord;
    type IntoIter = std::slice::Iter<'a, SliceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
