//! Rasterization of layer polygons onto the printer display.
//!
//! - [`Raster`] - one layer image that polygons are drawn onto
//! - [`RasterArchive`] - creates rasters for all layers and keeps the results
//! - [`MonochromeArchive`] - in-memory 1 byte per pixel archive

mod monochrome;

pub use monochrome::{MonochromeArchive, MonochromeRaster};

use crate::config::SlaPrinterConfig;
use crate::geometry::ExPolygon;
use crate::{CoordF, Result};
use serde::{Deserialize, Serialize};

/// Display geometry a raster maps polygons onto.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RasterParams {
    pub width: CoordF,
    pub height: CoordF,
    pub pixels_x: u32,
    pub pixels_y: u32,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl RasterParams {
    pub fn from_printer_config(config: &SlaPrinterConfig) -> Self {
        Self {
            width: config.display_width,
            height: config.display_height,
            pixels_x: config.display_pixels_x,
            pixels_y: config.display_pixels_y,
            mirror_x: config.display_mirror_x,
            mirror_y: config.display_mirror_y,
        }
    }

    /// Pixel size (mm) along X and Y.
    pub fn pixel_size(&self) -> (CoordF, CoordF) {
        (
            self.width / self.pixels_x.max(1) as CoordF,
            self.height / self.pixels_y.max(1) as CoordF,
        )
    }
}

impl Default for RasterParams {
    fn default() -> Self {
        Self::from_printer_config(&SlaPrinterConfig::default())
    }
}

/// A single layer image.
pub trait Raster: Send {
    fn draw(&mut self, polygon: &ExPolygon);
    fn params(&self) -> &RasterParams;
}

/// Produces and stores the rasters of a print.
pub trait RasterArchive: Send + Sync {
    /// Call `draw` once for every layer in `0..layer_count`, possibly in
    /// parallel. `cancel` is polled before each layer.
    fn draw_layers(
        &self,
        layer_count: usize,
        draw: &(dyn Fn(&mut dyn Raster, usize) + Sync),
        cancel: &(dyn Fn() -> bool + Sync),
    ) -> Result<()>;
}
