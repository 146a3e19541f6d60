//! SLA printer, material and object configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a JSON file only
//! needs to list the values it changes.

use crate::slice::SlicingMode;
use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How the material behaves while the vat is tilted between layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialPrintSpeed {
    Slow,
    /// Choose fast or slow tilt per layer from the filled area.
    #[default]
    Fast,
    HighViscosity,
}

/// Printer hardware description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPrinterConfig {
    // === Display ===
    /// Display width (mm).
    pub display_width: CoordF,
    /// Display height (mm).
    pub display_height: CoordF,
    pub display_pixels_x: u32,
    pub display_pixels_y: u32,
    pub display_mirror_x: bool,
    pub display_mirror_y: bool,

    // === Tilt ===
    /// Tilt time (s) for layers classified fast.
    pub fast_tilt_time: CoordF,
    /// Tilt time (s) for layers classified slow.
    pub slow_tilt_time: CoordF,
    /// Tilt time (s) with high viscosity material.
    pub high_viscosity_tilt_time: CoordF,

    // === Corrections ===
    /// Uniform XY offset (mm) of every slice, positive grows.
    pub absolute_correction: CoordF,
    /// Inward compensation (mm) of the first layer.
    pub elefant_foot_compensation: CoordF,
    /// Features narrower than this (mm) are not compensated.
    pub elefant_foot_min_width: CoordF,
}

impl SlaPrinterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display area in mm².
    pub fn display_area(&self) -> CoordF {
        self.display_width * self.display_height
    }

    /// Builder method: set absolute correction.
    pub fn absolute_correction(mut self, correction: CoordF) -> Self {
        self.absolute_correction = correction;
        self
    }

    /// Builder method: set elephant foot compensation and minimum width.
    pub fn elefant_foot(mut self, compensation: CoordF, min_width: CoordF) -> Self {
        self.elefant_foot_compensation = compensation.max(0.0);
        self.elefant_foot_min_width = min_width.max(0.0);
        self
    }
}

impl Default for SlaPrinterConfig {
    fn default() -> Self {
        Self {
            display_width: 120.96,
            display_height: 68.04,
            display_pixels_x: 2560,
            display_pixels_y: 1440,
            display_mirror_x: true,
            display_mirror_y: false,

            fast_tilt_time: 5.0,
            slow_tilt_time: 8.0,
            high_viscosity_tilt_time: 10.0,

            absolute_correction: 0.0,
            elefant_foot_compensation: 0.2,
            elefant_foot_min_width: 0.2,
        }
    }
}

/// Resin properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaMaterialConfig {
    /// Height (mm) of the first layer.
    pub initial_layer_height: CoordF,
    /// Exposure time (s) of regular layers.
    pub exposure_time: CoordF,
    /// Exposure time (s) of the first layers.
    pub initial_exposure_time: CoordF,
    /// Layers filling more than this percentage of the display are slow.
    pub area_fill: CoordF,
    pub material_print_speed: MaterialPrintSpeed,
}

impl SlaMaterialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set exposure times.
    pub fn exposure(mut self, initial: CoordF, regular: CoordF) -> Self {
        self.initial_exposure_time = initial;
        self.exposure_time = regular;
        self
    }

    /// Builder method: set initial layer height.
    pub fn initial_layer_height(mut self, height: CoordF) -> Self {
        self.initial_layer_height = height;
        self
    }

    /// Builder method: set the area fill percentage.
    pub fn area_fill(mut self, percent: CoordF) -> Self {
        self.area_fill = percent.clamp(0.0, 100.0);
        self
    }

    /// Builder method: set print speed mode.
    pub fn material_print_speed(mut self, speed: MaterialPrintSpeed) -> Self {
        self.material_print_speed = speed;
        self
    }
}

impl Default for SlaMaterialConfig {
    fn default() -> Self {
        Self {
            initial_layer_height: 0.3,
            exposure_time: 10.0,
            initial_exposure_time: 15.0,
            area_fill: 50.0,
            material_print_speed: MaterialPrintSpeed::Fast,
        }
    }
}

/// Per-object settings: layering, hollowing, supports and pad.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPrintObjectConfig {
    // === Layers ===
    /// Regular layer height (mm).
    pub layer_height: CoordF,
    /// Number of layers over which exposure and elephant foot fade out.
    pub faded_layers: usize,
    pub slicing_mode: SlicingMode,
    /// Closing radius (mm) used when slicing.
    pub slice_closing_radius: CoordF,

    // === Hollowing ===
    pub hollowing_enable: bool,
    /// Minimum wall thickness (mm) of the hollowed shell.
    pub hollowing_min_thickness: CoordF,
    /// Accuracy knob of the interior generator, 0..1.
    pub hollowing_quality: CoordF,
    /// Closing distance (mm) of the interior.
    pub hollowing_closing_distance: CoordF,

    // === Supports ===
    pub supports_enable: bool,
    pub support_head_front_diameter: CoordF,
    pub support_head_penetration: CoordF,
    pub support_head_width: CoordF,
    pub support_pillar_diameter: CoordF,
    pub support_base_diameter: CoordF,
    pub support_base_height: CoordF,
    pub support_critical_angle: CoordF,
    pub support_max_bridge_length: CoordF,
    /// Gap (mm) between the pad and the bottom of the object.
    pub support_object_elevation: CoordF,
    /// Support point density in percent.
    pub support_points_density_relative: CoordF,
    /// Minimal distance (mm) between support points.
    pub support_points_minimal_distance: CoordF,
    /// Only points inside support enforcers survive.
    pub support_enforcers_only: bool,

    // === Pad ===
    pub pad_enable: bool,
    pub pad_wall_thickness: CoordF,
    pub pad_wall_height: CoordF,
    pub pad_brim_size: CoordF,
    pub pad_max_merge_distance: CoordF,
    /// Wall slope in degrees.
    pub pad_wall_slope: CoordF,
    /// Print the object directly on the pad (zero elevation).
    pub pad_around_object: bool,
    pub pad_around_object_everywhere: bool,
    pub pad_object_gap: CoordF,
    pub pad_object_connector_stride: CoordF,
    pub pad_object_connector_width: CoordF,
    pub pad_object_connector_penetration: CoordF,
}

impl SlaPrintObjectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set layer height.
    pub fn layer_height(mut self, height: CoordF) -> Self {
        self.layer_height = height;
        self
    }

    /// Builder method: set faded layer count.
    pub fn faded_layers(mut self, layers: usize) -> Self {
        self.faded_layers = layers;
        self
    }

    /// Builder method: enable/disable supports.
    pub fn supports(mut self, enabled: bool) -> Self {
        self.supports_enable = enabled;
        self
    }

    /// Builder method: enable/disable the pad.
    pub fn pad(mut self, enabled: bool) -> Self {
        self.pad_enable = enabled;
        self
    }

    /// Builder method: enable/disable hollowing.
    pub fn hollowing(mut self, enabled: bool) -> Self {
        self.hollowing_enable = enabled;
        self
    }

    /// Builder method: set object elevation.
    pub fn elevation(mut self, elevation: CoordF) -> Self {
        self.support_object_elevation = elevation.max(0.0);
        self
    }

    /// True when the object sits directly on the pad.
    pub fn is_zero_elevation(&self) -> bool {
        self.pad_enable && self.pad_around_object
    }
}

impl Default for SlaPrintObjectConfig {
    fn default() -> Self {
        Self {
            layer_height: 0.05,
            faded_layers: 10,
            slicing_mode: SlicingMode::Regular,
            slice_closing_radius: 0.001,

            hollowing_enable: false,
            hollowing_min_thickness: 3.0,
            hollowing_quality: 0.5,
            hollowing_closing_distance: 2.0,

            supports_enable: true,
            support_head_front_diameter: 0.4,
            support_head_penetration: 0.2,
            support_head_width: 1.0,
            support_pillar_diameter: 1.0,
            support_base_diameter: 4.0,
            support_base_height: 1.0,
            support_critical_angle: 45.0,
            support_max_bridge_length: 15.0,
            support_object_elevation: 5.0,
            support_points_density_relative: 100.0,
            support_points_minimal_distance: 1.0,
            support_enforcers_only: false,

            pad_enable: true,
            pad_wall_thickness: 2.0,
            pad_wall_height: 0.0,
            pad_brim_size: 1.6,
            pad_max_merge_distance: 50.0,
            pad_wall_slope: 90.0,
            pad_around_object: false,
            pad_around_object_everywhere: false,
            pad_object_gap: 1.0,
            pad_object_connector_stride: 10.0,
            pad_object_connector_width: 0.5,
            pad_object_connector_penetration: 0.3,
        }
    }
}

/// The full configuration of one print.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    pub printer: SlaPrinterConfig,
    pub material: SlaMaterialConfig,
    /// Default settings of objects that do not carry their own.
    pub object: SlaPrintObjectConfig,
}

impl PrintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(Error::Config(what.to_string()))
            }
        };
        check(self.object.layer_height > 0.0, "layer_height must be positive")?;
        check(
            self.material.initial_layer_height > 0.0,
            "initial_layer_height must be positive",
        )?;
        check(
            self.printer.display_width > 0.0 && self.printer.display_height > 0.0,
            "display size must be positive",
        )?;
        check(
            self.printer.display_pixels_x > 0 && self.printer.display_pixels_y > 0,
            "display resolution must be positive",
        )?;
        check(
            (0.0..=100.0).contains(&self.material.area_fill),
            "area_fill must be a percentage",
        )?;
        check(
            self.material.exposure_time >= 0.0 && self.material.initial_exposure_time >= 0.0,
            "exposure times must not be negative",
        )?;
        Ok(())
    }
}

impl fmt::Display for PrintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PrintConfig(layer_height={:.3}mm, initial_layer={:.3}mm, supports={}, pad={}, hollowing={})",
            self.object.layer_height,
            self.material.initial_layer_height,
            self.object.supports_enable,
            self.object.pad_enable,
            self.object.hollowing_enable
        )
    }
}

/// Names of the top-level fields whose values differ between two configs.
pub fn changed_keys<T: Serialize>(old: &T, new: &T) -> Vec<String> {
    let (Ok(serde_json::Value::Object(old)), Ok(serde_json::Value::Object(new))) =
        (serde_json::to_value(old), serde_json::to_value(new))
    else {
        return Vec::new();
    };
    new.iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_print_config_default() {
        let config = PrintConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.object.layer_height - 0.05).abs() < 1e-9);
        assert!((config.material.initial_layer_height - 0.3).abs() < 1e-9);
        assert_eq!(config.material.material_print_speed, MaterialPrintSpeed::Fast);
        assert!(!config.object.is_zero_elevation());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PrintConfig::from_json_str(
            r#"{ "object": { "layer_height": 0.1, "slicing_mode": "even_odd" },
                 "material": { "material_print_speed": "high_viscosity" } }"#,
        )
        .unwrap();
        assert!((config.object.layer_height - 0.1).abs() < 1e-9);
        assert_eq!(config.object.slicing_mode, SlicingMode::EvenOdd);
        assert_eq!(
            config.material.material_print_speed,
            MaterialPrintSpeed::HighViscosity
        );
        assert_eq!(config.printer, SlaPrinterConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = PrintConfig::from_json_str(r#"{ "object": { "layer_height": 0.0 } }"#);
        assert!(matches!(err, Err(Error::Config(_))));
        assert!(matches!(
            PrintConfig::from_json_str("{ not json"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = PrintConfig::default();
        config.object = config.object.layer_height(0.025).supports(false);
        std::fs::write(&path, config.to_json_string().unwrap()).unwrap();

        assert_eq!(PrintConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_changed_keys() {
        let old = SlaPrintObjectConfig::default();
        let new = old.clone().layer_height(0.1).pad(false);
        let mut keys = changed_keys(&old, &new);
        keys.sort();
        assert_eq!(keys, vec!["layer_height".to_string(), "pad_enable".to_string()]);
        assert!(changed_keys(&old, &old).is_empty());
    }
}
