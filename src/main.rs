//! tiledewarp - tile-based lens distortion correction
//!
//! Reads an image (PNG/JPEG or raw NV12), applies a per-tile coefficient
//! table and writes the corrected frame. Tables come from a binary file or
//! are generated from the radial lens model in the configuration.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tiledewarp::coeffs::{tiles_for, validate_tile_size, CoefficientTable};
use tiledewarp::color::{nv12_to_rgb, rgb_to_nv12};
use tiledewarp::config::Config;
use tiledewarp::verify::cross_check;
use tiledewarp::{Dewarper, Implementation, Nv12Frame};

/// tiledewarp - fixed-point lens distortion correction for NV12 frames
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correct one image
    Warp {
        #[command(flatten)]
        input: InputArgs,

        /// Output file (.nv12/.yuv for raw, otherwise an image format)
        #[arg(short, long)]
        output: PathBuf,

        /// Use the per-pixel reference implementation
        #[arg(long)]
        reference: bool,
    },
    /// Render with both implementations and compare byte for byte
    Verify {
        #[command(flatten)]
        input: InputArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a coefficient table generated from the lens model
    Table {
        /// Frame width
        #[arg(long)]
        width: u32,

        /// Frame height
        #[arg(long)]
        height: u32,

        /// Tile size override
        #[arg(long)]
        tile_size: Option<u32>,

        /// Output table file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
struct InputArgs {
    /// Input file (.nv12/.yuv for raw, otherwise an image format).
    /// Without one a synthetic test frame is used.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Frame width, required for raw input (test pattern: 640)
    #[arg(long)]
    width: Option<u32>,

    /// Frame height, required for raw input (test pattern: 480)
    #[arg(long)]
    height: Option<u32>,

    /// Binary coefficient table; generated from the lens model when absent
    #[arg(short, long)]
    table: Option<PathBuf>,

    /// Tile size override
    #[arg(long)]
    tile_size: Option<u32>,

    /// Render tiles on a single thread
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    info!("tiledewarp v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_create(&args.config)?;

    if config.processing.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.processing.threads)
            .build_global()
            .context("Failed to configure the worker pool")?;
        info!("Using {} worker threads", config.processing.threads);
    }

    match args.command {
        Command::Warp {
            input,
            output,
            reference,
        } => run_warp(&config, &input, &output, reference),
        Command::Verify { input, json } => run_verify(&config, &input, json),
        Command::Table {
            width,
            height,
            tile_size,
            output,
        } => run_table(&config, width, height, tile_size, &output),
    }
}

fn run_warp(config: &Config, input: &InputArgs, output: &Path, reference: bool) -> Result<()> {
    let frame = load_frame(config, input)?;
    let table = load_table(config, input, frame.width(), frame.height())?;

    let dewarper = Dewarper::new(table)
        .with_implementation(if reference {
            Implementation::Reference
        } else {
            config.processing.implementation
        })
        .with_parallel(config.processing.parallel && !input.sequential);

    let started = Instant::now();
    let corrected = dewarper.warp(&frame)?;
    info!(
        "Corrected {}x{} frame with the {} implementation in {:?}",
        frame.width(),
        frame.height(),
        dewarper.implementation().as_str(),
        started.elapsed()
    );

    save_frame(config, &corrected, output)
}

fn run_verify(config: &Config, input: &InputArgs, json: bool) -> Result<()> {
    let frame = load_frame(config, input)?;
    let table = load_table(config, input, frame.width(), frame.height())?;

    let report = cross_check(&table, &frame, config.processing.parallel && !input.sequential)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !report.is_exact() {
        anyhow::bail!("fast implementation differs from reference in {} samples", report.mismatches());
    }
    Ok(())
}

fn run_table(config: &Config, width: u32, height: u32, tile_size: Option<u32>, output: &Path) -> Result<()> {
    let tile_size = tile_size.unwrap_or(config.tiling.tile_size);
    let table = config.lens.table(width, height, tile_size)?;
    std::fs::write(output, table.to_bytes())
        .with_context(|| format!("Failed to write table to {:?}", output))?;
    info!(
        "Wrote {}x{} tile table ({}px tiles) for {}x{} to {:?}",
        table.cols(),
        table.rows(),
        tile_size,
        width,
        height,
        output
    );
    Ok(())
}

fn is_raw(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("nv12") | Some("yuv")
    )
}

fn load_frame(config: &Config, input: &InputArgs) -> Result<Nv12Frame> {
    let Some(path) = &input.input else {
        let width = input.width.unwrap_or(640);
        let height = input.height.unwrap_or(480);
        info!("No input given, using a {}x{} test pattern", width, height);
        return Ok(Nv12Frame::test_pattern(width, height)?);
    };

    if is_raw(path) {
        let (Some(width), Some(height)) = (input.width, input.height) else {
            anyhow::bail!("raw input {:?} needs --width and --height", path);
        };
        let raw = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let frame = Nv12Frame::from_raw(width, height, &raw)
            .with_context(|| format!("Failed to parse {:?} as {}x{} NV12", path, width, height))?;
        info!("Loaded {}x{} NV12 frame from {:?}", width, height, path);
        return Ok(frame);
    }

    let mut image = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
    let (w, h) = (image.width(), image.height());
    if w % 2 != 0 || h % 2 != 0 {
        warn!("Cropping {}x{} image to even dimensions", w, h);
        image = image.crop_imm(0, 0, w & !1, h & !1);
    }
    let rgb = image.to_rgb8();
    let frame = rgb_to_nv12(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        config.color.color_space,
        config.color.range,
    )?;
    info!(
        "Loaded {}x{} image from {:?} ({}, {})",
        frame.width(),
        frame.height(),
        path,
        config.color.color_space.as_str(),
        config.color.range.as_str()
    );
    Ok(frame)
}

fn save_frame(config: &Config, frame: &Nv12Frame, path: &Path) -> Result<()> {
    if is_raw(path) {
        std::fs::write(path, frame.to_raw()).with_context(|| format!("Failed to write {:?}", path))?;
    } else {
        let rgb = nv12_to_rgb(frame, config.color.color_space, config.color.range);
        let image = image::RgbImage::from_raw(frame.width(), frame.height(), rgb)
            .context("RGB buffer does not match frame size")?;
        image.save(path).with_context(|| format!("Failed to write image {:?}", path))?;
    }
    info!("Saved corrected frame to {:?}", path);
    Ok(())
}

fn load_table(config: &Config, input: &InputArgs, width: u32, height: u32) -> Result<CoefficientTable> {
    let tile_size = input.tile_size.unwrap_or(config.tiling.tile_size);
    validate_tile_size(tile_size)?;
    match &input.table {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| format!("Failed to read table {:?}", path))?;
            let table = CoefficientTable::from_bytes(tile_size, tiles_for(width, tile_size), tiles_for(height, tile_size), &bytes)
                .with_context(|| format!("Failed to load table {:?}", path))?;
            info!("Loaded {}x{} tile table from {:?}", table.cols(), table.rows(), path);
            Ok(table)
        }
        None => {
            let lens = &config.lens;
            info!(
                "Generating table from lens model (k1={}, k2={}, zoom={}, {}px tiles)",
                lens.k1, lens.k2, lens.zoom, tile_size
            );
            Ok(lens.table(width, height, tile_size)?)
        }
    }
}
