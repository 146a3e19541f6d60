//! SLA slicer CLI - command-line interface for the sla_slicer library
//!
//! Usage:
//!   sla-slicer-cli slice <input.stl> [--config cfg.json] [--instances N] [--threads N]
//!   sla-slicer-cli info <input.stl>
//!   sla-slicer-cli default-config

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use sla_slicer::config::PrintConfig;
use sla_slicer::geometry::{Point, Transform3D};
use sla_slicer::mesh::{load_stl, TriangleMesh};
use sla_slicer::print::{Instance, ModelObject, ObjectStatus, Print};
use sla_slicer::raster::{MonochromeArchive, RasterParams};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Prepare SLA resin prints: slicing, supports, pad and print statistics
#[derive(Parser, Debug)]
#[command(name = "sla-slicer-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline on an STL file and print the statistics
    Slice {
        /// Input STL file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Print configuration file (JSON format)
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Number of copies placed side by side
        #[arg(long, default_value = "1")]
        instances: usize,

        /// Layer height in mm (overrides the configuration)
        #[arg(long)]
        layer_height: Option<f64>,

        /// Disable supports and pad
        #[arg(long)]
        no_supports: bool,

        /// Rasterize the layers in memory
        #[arg(long)]
        rasterize: bool,

        /// Write the statistics as JSON
        #[arg(long, value_name = "FILE")]
        stats_json: Option<PathBuf>,

        /// Number of threads to use (0 = auto)
        #[arg(short = 'j', long, default_value = "0")]
        threads: usize,
    },

    /// Display information about an STL file
    Info {
        /// Input STL file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Print the default configuration as JSON
    DefaultConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Slice {
            input,
            config,
            instances,
            layer_height,
            no_supports,
            rasterize,
            stats_json,
            threads,
        } => cmd_slice(
            input,
            config,
            instances,
            layer_height,
            no_supports,
            rasterize,
            stats_json,
            threads,
        ),
        Commands::Info { input } => cmd_info(input),
        Commands::DefaultConfig => cmd_default_config(),
    }
}

/// Drop the mesh onto the platform and spread `count` copies along X
/// around the display center.
fn place_on_display(name: &str, mesh: TriangleMesh, config: &PrintConfig, count: usize) -> ModelObject {
    let bb = mesh.bounding_box();
    let mut object = ModelObject::from_mesh(name, mesh);
    object.transform = Transform3D::translation(0.0, 0.0, -bb.min.z);
    object.instances.clear();

    let size = bb.size();
    let pitch = size.x + 5.0;
    let center = bb.center();
    let total = pitch * (count.saturating_sub(1)) as f64;
    let cx = config.printer.display_width / 2.0 - center.x - total / 2.0;
    let cy = config.printer.display_height / 2.0 - center.y;
    for i in 0..count {
        let shift = Point::new_scale(cx + pitch * i as f64, cy);
        object.add_instance(Instance::new(shift, 0.0));
    }
    object
}

#[allow(clippy::too_many_arguments)]
fn cmd_slice(
    input: PathBuf,
    config_path: Option<PathBuf>,
    instances: usize,
    layer_height: Option<f64>,
    no_supports: bool,
    rasterize: bool,
    stats_json: Option<PathBuf>,
    threads: usize,
) -> Result<()> {
    info!("Loading STL file: {}", input.display());

    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to initialize thread pool")?;
    }
    if instances == 0 {
        bail!("at least one instance is required");
    }

    let mut config = match &config_path {
        Some(path) => PrintConfig::load(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => PrintConfig::default(),
    };
    if let Some(height) = layer_height {
        config.object.layer_height = height;
    }
    if no_supports {
        config.object = config.object.supports(false).pad(false);
    }
    config.validate().context("Invalid configuration")?;
    info!("{}", config);

    let mesh = load_stl(&input).context("Failed to load STL file")?;
    let name = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "object".to_string());

    let mut print = Print::new(config.clone());
    print.add_object(place_on_display(&name, mesh, &config, instances));

    let archive = Arc::new(MonochromeArchive::new(RasterParams::from_printer_config(&config.printer)));
    if rasterize {
        print.set_raster_archive(archive.clone());
    }

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    let bar = progress.clone();
    print.set_status_callback(move |status| {
        bar.set_position(status.percent as u64);
        if !status.message.is_empty() {
            bar.set_message(status.message.clone());
        }
    });

    let result = print.process();
    progress.finish_and_clear();
    result.context("Slicing failed")?;

    for po in print.objects() {
        if let ObjectStatus::Failed { step, message } = po.status() {
            warn!("{} failed at {:?}: {}", po.name(), step, message);
            println!("Object '{}' failed: {}", po.name(), message);
        }
        for warning in po.warnings() {
            println!("Warning ({}): {}", po.name(), warning.message);
        }
    }

    println!("{}", print.statistics());
    if rasterize {
        println!("Rasterized layers: {}", archive.layer_count());
    }

    if let Some(path) = stats_json {
        let json = serde_json::to_string_pretty(print.statistics())
            .context("Failed to serialize statistics")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write statistics to {}", path.display()))?;
        info!("Statistics written to {}", path.display());
    }

    Ok(())
}

fn cmd_info(input: PathBuf) -> Result<()> {
    info!("Loading STL file: {}", input.display());

    let mesh = load_stl(&input).context("Failed to load STL file")?;
    let bb = mesh.bounding_box();
    let size = bb.size();

    println!("Mesh Information:");
    println!("  File: {}", input.display());
    println!("  Triangles: {}", mesh.triangle_count());
    println!("  Vertices: {}", mesh.vertex_count());
    println!("  Bounding box:");
    println!("    Min: ({:.3}, {:.3}, {:.3}) mm", bb.min.x, bb.min.y, bb.min.z);
    println!("    Max: ({:.3}, {:.3}, {:.3}) mm", bb.max.x, bb.max.y, bb.max.z);
    println!("    Size: {:.3} x {:.3} x {:.3} mm", size.x, size.y, size.z);
    println!("  Volume: {:.2} mm³", mesh.volume());
    println!("  Parts: {}", mesh.split().len());

    let config = PrintConfig::default();
    println!("  Estimated layers:");
    for lh in [0.025, 0.05, 0.1] {
        let above_first = (size.z - config.material.initial_layer_height).max(0.0);
        let layers = 1 + (above_first / lh).ceil() as u32;
        println!("    At {:.3}mm layer height: {} layers", lh, layers);
    }

    Ok(())
}

fn cmd_default_config() -> Result<()> {
    let json = PrintConfig::default()
        .to_json_string()
        .context("Failed to serialize the default configuration")?;
    println!("{}", json);
    Ok(())
}
