//! vitrail: turn an image into a low-polygon stained glass approximation.
//!
//! Loads an image, evolves a triangle mesh over it for a number of steps
//! and writes the result as SVG and/or PNG.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin vitrail -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use vitrail_export::{SvgMetadata, rasterize, to_svg};
use vitrail_mesh::{ColorizerKind, Dimensions, ErrorMetric, Mesh, MeshConfig, MovementKind, StepReport};

/// Evolve a Delaunay triangle mesh over an image by simulated annealing.
#[derive(Parser)]
#[command(name = "vitrail", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Number of annealing steps to run.
    #[arg(short = 'n', long, default_value_t = 1000)]
    iterations: usize,

    /// Total number of mesh points, image corners included.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_POINT_COUNT, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(4..))]
    points: usize,

    /// Starting perturbation radius in pixels.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_INITIAL_TEMPERATURE)]
    temperature: f64,

    /// Temperature decay factor per step, in (0, 1).
    #[arg(long, default_value_t = MeshConfig::DEFAULT_TEMPERATURE_MULTIPLIER)]
    multiplier: f64,

    /// Purge probability at the starting temperature.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_PURGE_PROBABILITY)]
    purge_probability: f64,

    /// Points removed and triangles split per purge.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_PURGE_COUNT)]
    purge_count: usize,

    /// Only triangles with an error above this are split by a purge.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_SPLIT_ERROR_THRESHOLD)]
    split_threshold: f64,

    /// Triangle cache capacity.
    #[arg(long, default_value_t = MeshConfig::DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Point movement strategy.
    #[arg(long, value_enum, default_value_t = Movement::Anneal)]
    movement: Movement,

    /// Triangle rasterizer.
    #[arg(long, value_enum, default_value_t = Raster::Scanline)]
    colorizer: Raster,

    /// Report error per covered pixel, normalized to the 8-bit range,
    /// instead of the absolute sum.
    #[arg(long)]
    per_pixel_error: bool,

    /// Colorize on a single thread.
    #[arg(long)]
    sequential: bool,

    /// Seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Full mesh config as a JSON string.
    ///
    /// When provided, all other mesh parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write a rendered PNG to file.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Log a progress line every N steps (0 disables).
    #[arg(long, default_value_t = 100)]
    report_every: usize,

    /// Print every step report as a JSON line on stdout.
    #[arg(long)]
    json: bool,
}

/// Point movement strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Movement {
    /// Uniform sample in a disk around the last accepted position.
    Anneal,
    /// Independent uniform offset on each axis.
    Jitter,
    /// Velocity steered toward each point's best position.
    Swarm,
}

/// Rasterizer selection.
#[derive(Clone, Copy, ValueEnum)]
enum Raster {
    /// Per-row edge intersection.
    Scanline,
    /// Filled polygon mask.
    Mask,
}

/// Build a [`MeshConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<MeshConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(MeshConfig {
        point_count: cli.points,
        initial_temperature: cli.temperature,
        temperature_multiplier: cli.multiplier,
        purge_probability: cli.purge_probability,
        purge_count: cli.purge_count,
        split_error_threshold: cli.split_threshold,
        cache_capacity: cli.cache_capacity,
        parallel: !cli.sequential,
        movement: match cli.movement {
            Movement::Anneal => MovementKind::AnnealingShift,
            Movement::Jitter => MovementKind::JitterShift,
            Movement::Swarm => MovementKind::SwarmVelocity,
        },
        colorizer: match cli.colorizer {
            Raster::Scanline => ColorizerKind::Scanline,
            Raster::Mask => ColorizerKind::Mask,
        },
        error_metric: if cli.per_pixel_error {
            ErrorMetric::PerPixel
        } else {
            ErrorMetric::Absolute
        },
        ..MeshConfig::default()
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.image_path) {
        Ok(img) => img.into_rgb8(),
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let dimensions = Dimensions::of(&image);
    log::info!(
        "image {} ({}x{})",
        cli.image_path.display(),
        dimensions.width,
        dimensions.height
    );
    log::debug!("config: {config:#?}");

    let mesh = match cli.seed {
        Some(seed) => Mesh::with_seed(image, config.clone(), seed),
        None => Mesh::new(image, config.clone()),
    };
    let mut mesh = match mesh {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut last: Option<StepReport> = None;
    for step in 1..=cli.iterations {
        let report = match mesh.step() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Step {step} failed: {e}");
                return ExitCode::FAILURE;
            }
        };
        if cli.json {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing step report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        if cli.report_every > 0 && step % cli.report_every == 0 {
            log::info!("{}", report.summary());
        }
        last = Some(report);
    }
    if let Some(report) = &last {
        eprintln!("{}", report.summary());
    }

    let triangles = match mesh.colored_triangles() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("final mesh: {} triangles, {} points", triangles.len(), mesh.points().len());

    if let Some(ref svg_path) = cli.svg {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("vitrail");
        let desc = format!(
            "{} steps, {} points, {} triangles",
            mesh.iteration(),
            mesh.points().len(),
            triangles.len()
        );
        let config_json = serde_json::to_string(&config).ok();
        let metadata = SvgMetadata {
            title: Some(title),
            description: Some(&desc),
            config_json: config_json.as_deref(),
        };
        let svg = to_svg(&triangles, dimensions, &metadata);
        if let Err(e) = std::fs::write(svg_path, &svg) {
            eprintln!("Error writing SVG to {}: {e}", svg_path.display());
            return ExitCode::FAILURE;
        }
        eprintln!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
    }

    if let Some(ref png_path) = cli.png
        && let Err(msg) = write_png(&triangles, dimensions, png_path)
    {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn write_png(
    triangles: &[vitrail_mesh::ColoredTriangle],
    dimensions: Dimensions,
    path: &Path,
) -> Result<(), String> {
    let render = rasterize(triangles, dimensions).map_err(|e| format!("Error rendering: {e}"))?;
    render
        .save(path)
        .map_err(|e| format!("Error writing PNG to {}: {e}", path.display()))?;
    eprintln!("PNG written to {}", path.display());
    Ok(())
}
