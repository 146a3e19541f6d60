//! Layer images backed by a `tiny_skia` pixmap.

use super::{Raster, RasterArchive, RasterParams};
use crate::geometry::{ExPolygon, Polygon};
use crate::{unscale, CoordF, Error, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fmt;
use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Transform};

const WHITE: u8 = 255;

/// A layer image, row 0 at the top of the display.
///
/// `pixmap` is `None` for a display without pixels.
#[derive(Clone)]
pub struct MonochromeRaster {
    params: RasterParams,
    pixmap: Option<Pixmap>,
}

impl MonochromeRaster {
    pub fn new(params: RasterParams) -> Self {
        let pixmap = Pixmap::new(params.pixels_x, params.pixels_y).map(|mut pixmap| {
            pixmap.fill(Color::BLACK);
            pixmap
        });
        Self { params, pixmap }
    }

    /// One byte per pixel, row-major from the top-left corner.
    pub fn pixels(&self) -> Vec<u8> {
        self.pixmap
            .as_ref()
            .map(|pixmap| pixmap.pixels().iter().map(|p| p.red()).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, col: u32, row: u32) -> u8 {
        self.pixmap
            .as_ref()
            .and_then(|pixmap| pixmap.pixel(col, row))
            .map_or(0, |p| p.red())
    }

    pub fn filled_pixels(&self) -> usize {
        self.pixmap.as_ref().map_or(0, |pixmap| {
            pixmap.pixels().iter().filter(|p| p.red() != 0).count()
        })
    }

    /// Filled area in mm².
    pub fn filled_area(&self) -> CoordF {
        let (px, py) = self.params.pixel_size();
        self.filled_pixels() as CoordF * px * py
    }

    /// Maps millimeters onto pixels: lower-left origin unless `mirror_y`,
    /// columns reversed when `mirror_x`.
    fn display_transform(&self) -> Transform {
        let p = self.params;
        let (px, py) = p.pixel_size();
        let (sx, tx) = if p.mirror_x {
            (-1.0 / px, p.pixels_x as CoordF)
        } else {
            (1.0 / px, 0.0)
        };
        let (sy, ty) = if p.mirror_y {
            (1.0 / py, 0.0)
        } else {
            (-1.0 / py, p.pixels_y as CoordF)
        };
        Transform::from_scale(sx as f32, sy as f32).post_translate(tx as f32, ty as f32)
    }
}

impl fmt::Debug for MonochromeRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonochromeRaster")
            .field("params", &self.params)
            .field("filled_pixels", &self.filled_pixels())
            .finish()
    }
}

fn push_ring(pb: &mut PathBuilder, ring: &Polygon) {
    let mut points = ring.points().iter();
    let Some(first) = points.next() else {
        return;
    };
    pb.move_to(unscale(first.x) as f32, unscale(first.y) as f32);
    for p in points {
        pb.line_to(unscale(p.x) as f32, unscale(p.y) as f32);
    }
    pb.close();
}

/// Contour and holes as a single path.
fn expolygon_path(polygon: &ExPolygon) -> Option<Path> {
    let mut pb = PathBuilder::new();
    push_ring(&mut pb, &polygon.contour);
    for hole in &polygon.holes {
        push_ring(&mut pb, hole);
    }
    pb.finish()
}

impl Raster for MonochromeRaster {
    /// Even-odd fill without anti-aliasing, sampled at pixel centers.
    fn draw(&mut self, polygon: &ExPolygon) {
        let transform = self.display_transform();
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        let Some(path) = expolygon_path(polygon) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(WHITE, WHITE, WHITE, 255);
        paint.anti_alias = false;
        pixmap.fill_path(&path, &paint, FillRule::EvenOdd, transform, None);
    }

    fn params(&self) -> &RasterParams {
        &self.params
    }
}

/// Keeps every layer image in memory.
pub struct MonochromeArchive {
    params: RasterParams,
    layers: Mutex<Vec<Option<MonochromeRaster>>>,
}

impl MonochromeArchive {
    pub fn new(params: RasterParams) -> Self {
        Self {
            params,
            layers: Mutex::new(Vec::new()),
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.lock().len()
    }

    pub fn layer(&self, idx: usize) -> Option<MonochromeRaster> {
        self.layers.lock().get(idx).cloned().flatten()
    }
}

impl RasterArchive for MonochromeArchive {
    fn draw_layers(
        &self,
        layer_count: usize,
        draw: &(dyn Fn(&mut dyn Raster, usize) + Sync),
        cancel: &(dyn Fn() -> bool + Sync),
    ) -> Result<()> {
        *self.layers.lock() = vec![None; layer_count];

        (0..layer_count).into_par_iter().try_for_each(|idx| {
            if cancel() {
                return Err(Error::Cancelled);
            }
            let mut raster = MonochromeRaster::new(self.params);
            draw(&mut raster, idx);
            self.layers.lock()[idx] = Some(raster);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn params() -> RasterParams {
        RasterParams {
            width: 10.0,
            height: 10.0,
            pixels_x: 100,
            pixels_y: 100,
            mirror_x: false,
            mirror_y: false,
        }
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Polygon::rectangle(Point::new_scale(x0, y0), Point::new_scale(x1, y1))
    }

    #[test]
    fn test_draw_square() {
        let mut raster = MonochromeRaster::new(params());
        raster.draw(&ExPolygon::new(square(1.0, 1.0, 3.0, 3.0)));
        assert_eq!(raster.filled_pixels(), 400);
        assert!((raster.filled_area() - 4.0).abs() < 1e-9);
        // Bottom-left of the display is the last row.
        assert_eq!(raster.get(15, 99 - 15), WHITE);
        assert_eq!(raster.get(15, 15), 0);
    }

    #[test]
    fn test_draw_with_hole() {
        let mut raster = MonochromeRaster::new(params());
        let mut ex = ExPolygon::new(square(0.0, 0.0, 4.0, 4.0));
        ex.add_hole(square(1.0, 1.0, 3.0, 3.0).reversed());
        raster.draw(&ex);
        assert_eq!(raster.filled_pixels(), 1600 - 400);
    }

    #[test]
    fn test_mirror_x() {
        let mut p = params();
        p.mirror_x = true;
        let mut raster = MonochromeRaster::new(p);
        raster.draw(&ExPolygon::new(square(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(raster.get(99, 99), WHITE);
        assert_eq!(raster.get(0, 99), 0);
    }

    #[test]
    fn test_mirror_y_keeps_top_left_origin() {
        let mut p = params();
        p.mirror_y = true;
        let mut raster = MonochromeRaster::new(p);
        raster.draw(&ExPolygon::new(square(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(raster.get(0, 0), WHITE);
        assert_eq!(raster.get(0, 99), 0);
        assert_eq!(raster.pixels().len(), 100 * 100);
    }

    #[test]
    fn test_empty_display_draws_nothing() {
        let mut p = params();
        p.pixels_x = 0;
        let mut raster = MonochromeRaster::new(p);
        raster.draw(&ExPolygon::new(square(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(raster.filled_pixels(), 0);
        assert!(raster.pixels().is_empty());
    }

    #[test]
    fn test_archive_draws_all_layers() {
        let archive = MonochromeArchive::new(params());
        let polys = [square(0.0, 0.0, 1.0, 1.0), square(0.0, 0.0, 2.0, 2.0)];
        archive
            .draw_layers(
                2,
                &|raster, idx| raster.draw(&ExPolygon::new(polys[idx].clone())),
                &|| false,
            )
            .unwrap();
        assert_eq!(archive.layer_count(), 2);
        assert_eq!(archive.layer(0).map(|r| r.filled_pixels()), Some(100));
        assert_eq!(archive.layer(1).map(|r| r.filled_pixels()), Some(400));

        let result = archive.draw_layers(3, &|_, _| {}, &|| true);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
