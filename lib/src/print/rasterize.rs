//! Drawing the print layers onto the display rasters.

use super::aggregate::PrintOutput;
use super::print_object::PrintObject;
use super::steps::StepContext;
use crate::raster::Raster;
use crate::Result;
use log::{debug, info};
use parking_lot::Mutex;

/// Per-layer progress shared by the drawing threads.
struct LayerProgress {
    increment: f64,
    // (status, last reported rounded status)
    state: Mutex<(f64, f64)>,
}

impl LayerProgress {
    fn new(base: f64, increment: f64) -> Self {
        Self {
            increment,
            state: Mutex::new((base, base.round())),
        }
    }

    /// Count one finished layer. Returns the percent to report when the
    /// rounded value moved forward. The lock is released on return.
    fn advance(&self) -> Option<f64> {
        let mut guard = self.state.lock();
        guard.0 += self.increment;
        let rounded = guard.0.round();
        if rounded > guard.1 {
            guard.1 = rounded;
            Some(guard.0)
        } else {
            None
        }
    }
}

/// Draw the transformed slices of every layer into the raster archive.
/// Without an archive there is nothing to do.
pub fn rasterize(_objects: &[PrintObject], output: &mut PrintOutput, ctx: &StepContext<'_>) -> Result<()> {
    let archive = match ctx.archive {
        Some(archive) => archive,
        None => {
            debug!("No raster archive, skipping rasterization");
            return Ok(());
        }
    };
    ctx.check_cancel()?;

    let layers = &output.layers;
    let count = layers.len();
    if count == 0 {
        return Ok(());
    }
    info!("Rasterizing {} layers", count);

    let progress = LayerProgress::new(ctx.progress_base, ctx.progress_span / count as f64);

    let draw = |raster: &mut dyn Raster, idx: usize| {
        if let Some(layer) = layers.get(idx) {
            for ex in layer.transformed_slices() {
                raster.draw(ex);
            }
        }
        if let Some(percent) = progress.advance() {
            ctx.reporter.report_throttled(percent, ctx.label);
        }
    };
    let cancel = || ctx.is_cancelled();

    archive.draw_layers(count, &draw, &cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrintConfig;
    use crate::print::capabilities::Capabilities;
    use crate::print::status::{CancelToken, StatusReporter};
    use crate::raster::{MonochromeArchive, RasterArchive, RasterParams};

    fn run(output: &mut PrintOutput, archive: Option<&dyn RasterArchive>, cancel: &CancelToken) -> Result<()> {
        let config = PrintConfig::default();
        let caps = Capabilities::default();
        let reporter = StatusReporter::new();
        let ctx = StepContext {
            printer: &config.printer,
            material: &config.material,
            object: &config.object,
            caps: &caps,
            archive,
            cancel,
            reporter: &reporter,
            label: "Rasterizing layers",
            progress_base: 55.0,
            progress_span: 45.0,
        };
        rasterize(&[], output, &ctx)
    }

    #[test]
    fn test_layer_progress_reports_whole_percents() {
        let progress = LayerProgress::new(55.0, 0.4);
        assert_eq!(progress.advance(), None);
        let reported = progress.advance();
        assert!(reported.map_or(false, |p| (p - 55.8).abs() < 1e-9));
        // Nothing stays locked between layers.
        assert!(progress.state.try_lock().is_some());
        assert_eq!(progress.advance(), None);
    }

    #[test]
    fn test_status_callback_runs_per_percent() {
        use crate::print::aggregate::PrintLayer;
        use std::sync::Arc;

        let config = PrintConfig::default();
        let caps = Capabilities::default();
        let mut reporter = StatusReporter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        reporter.set_callback(Some(Arc::new(move |status: &crate::print::status::SlicingStatus| {
            sink.lock().push(status.percent)
        })));

        let mut output = PrintOutput::default();
        for i in 0..10 {
            output.layers.push(PrintLayer::new(crate::scale(0.05 * (i + 1) as f64)));
        }

        let archive = MonochromeArchive::new(RasterParams::default());
        let cancel = CancelToken::new();
        let ctx = StepContext {
            printer: &config.printer,
            material: &config.material,
            object: &config.object,
            caps: &caps,
            archive: Some(&archive),
            cancel: &cancel,
            reporter: &reporter,
            label: "Rasterizing layers",
            progress_base: 55.0,
            progress_span: 45.0,
        };
        rasterize(&[], &mut output, &ctx).unwrap();

        assert_eq!(archive.layer_count(), 10);
        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_no_archive_is_noop() {
        let mut output = PrintOutput::default();
        assert!(run(&mut output, None, &CancelToken::new()).is_ok());
    }

    #[test]
    fn test_cancelled_before_drawing() {
        let archive = MonochromeArchive::new(RasterParams::default());
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut output = PrintOutput::default();
        let err = run(&mut output, Some(&archive), &cancel).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(archive.layer_count(), 0);
    }
}
