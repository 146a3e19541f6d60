//! Mesh slicing parameters.

use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slicing mode determines how the loops cut from a mesh become areas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicingMode {
    /// Regular slicing - maintains all contours and their orientation
    /// (non-zero fill).
    #[default]
    Regular,
    /// Even-odd fill rule - orientation is ignored, nesting decides.
    EvenOdd,
    /// Positive mode - orients all contours CCW, closes holes.
    Positive,
    /// Positive largest contour - keeps only the largest contour.
    PositiveLargestContour,
}

/// Parameters for cutting a mesh into layers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshSlicingParams {
    pub mode: SlicingMode,
    /// Morphological closing radius (mm) applied to slice contours.
    /// Helps close small gaps in the mesh.
    pub closing_radius: CoordF,
}

impl MeshSlicingParams {
    pub fn new(mode: SlicingMode, closing_radius: CoordF) -> Self {
        Self {
            mode,
            closing_radius: closing_radius.max(0.0),
        }
    }

    /// Builder method: set slicing mode.
    pub fn mode(mut self, mode: SlicingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder method: set closing radius.
    pub fn closing_radius(mut self, radius: CoordF) -> Self {
        self.closing_radius = radius.max(0.0);
        self
    }
}

impl Default for MeshSlicingParams {
    fn default() -> Self {
        Self {
            mode: SlicingMode::Regular,
            closing_radius: 0.0,
        }
    }
}

impl fmt::Display for MeshSlicingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MeshSlicingParams(mode={:?}, closing_radius={:.3}mm)",
            self.mode, self.closing_radius
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slicing_params_builder() {
        let params = MeshSlicingParams::default()
            .mode(SlicingMode::EvenOdd)
            .closing_radius(-1.0);
        assert_eq!(params.mode, SlicingMode::EvenOdd);
        assert_eq!(params.closing_radius, 0.0);
    }

    #[test]
    fn test_slicing_mode_serde() {
        let json = serde_json::to_string(&SlicingMode::PositiveLargestContour).unwrap();
        assert_eq!(json, "\"positive_largest_contour\"");
        let mode: SlicingMode = serde_json::from_str("\"even_odd\"").unwrap();
        assert_eq!(mode, SlicingMode::EvenOdd);
    }
}
