//! geokmz CLI - GeoTIFF to KMZ ground overlay conversion

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geokmz_core::io::GeoTiffReader;
use geokmz_core::{extract_footprint, reproject_footprint};
use geokmz_kmz::{convert_file, gather_tasks, run_batch, ConvertOptions, ProcessingMode, TaskOutcome};
use geokmz_palette::PaletteOptions;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geokmz")]
#[command(author, version, about = "Convert GeoTIFF rasters into KMZ ground overlays", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show georeferencing information about a GeoTIFF
    Info {
        /// Input GeoTIFF
        input: PathBuf,
    },
    /// Convert one GeoTIFF into a KMZ
    Convert {
        /// Input GeoTIFF
        input: PathBuf,
        /// Output KMZ file, or a directory to place `<name>.kmz` in
        output: PathBuf,
        #[command(flatten)]
        palette: PaletteArgs,
    },
    /// Convert every GeoTIFF under a directory, mirroring its layout
    Batch {
        /// Directory searched recursively for .tif/.tiff files
        input_root: PathBuf,
        /// Directory receiving the mirrored tree of .kmz files
        output_root: PathBuf,
        /// Number of worker threads (default: all cores)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Convert one file at a time
        #[arg(long, conflicts_with = "jobs")]
        sequential: bool,
        #[command(flatten)]
        palette: PaletteArgs,
    },
}

#[derive(Args)]
struct PaletteArgs {
    /// Maximum palette entries, transparent entry included (2-256)
    #[arg(short = 'c', long, default_value = "256")]
    max_colors: usize,
    /// Disable Floyd-Steinberg dithering
    #[arg(long)]
    no_dither: bool,
}

impl PaletteArgs {
    fn to_options(&self) -> Result<ConvertOptions> {
        let palette = PaletteOptions {
            max_colors: self.max_colors,
            dither: !self.no_dither,
            ..PaletteOptions::default()
        };
        palette.validate().context("Invalid palette options")?;
        Ok(ConvertOptions { palette })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// A directory output means `<dir>/<input base>.kmz`
fn resolve_output(input: &Path, output: PathBuf) -> PathBuf {
    if output.is_dir() {
        geokmz_kmz::kmz_path_for(input, &output)
    } else {
        output
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn info_command(input: &Path) -> Result<()> {
    let reader = GeoTiffReader::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let source = reader.source();
    let gt = &source.transform;

    println!("File: {}", input.display());
    println!(
        "Dimensions: {} x {} ({} bands, {:?}, {})",
        source.width,
        source.height,
        source.band_count(),
        source.layout,
        source.sample_type
    );
    println!("CRS: {}", source.crs);
    println!("Cell size: {}", gt.cell_size());
    println!(
        "Transform: [{}, {}, {}, {}, {}, {}]",
        gt.origin_x, gt.pixel_width, gt.row_rotation, gt.origin_y, gt.col_rotation, gt.pixel_height
    );
    match source.nodata {
        Some(nodata) => println!("NoData: {}", nodata),
        None => println!("NoData: none"),
    }

    let footprint = extract_footprint(source).context("Failed to compute footprint")?;
    let geo = reproject_footprint(&footprint, &source.crs).context("Failed to reproject footprint")?;
    println!("\nGround footprint (WGS84):");
    println!("  Orientation: {:?}", geo.orientation);
    for (label, (lon, lat)) in ["UL", "UR", "LL", "LR"].iter().zip(geo.corners.to_array()) {
        println!("  {}: {:.8}, {:.8}", label, lon, lat);
    }
    let bbox = geo.lat_lon_box();
    println!(
        "  Box: N {:.8}  S {:.8}  E {:.8}  W {:.8}",
        bbox.north, bbox.south, bbox.east, bbox.west
    );
    Ok(())
}

fn convert_command(input: &Path, output: PathBuf, palette: &PaletteArgs) -> Result<()> {
    let options = palette.to_options()?;
    let output = resolve_output(input, output);

    let pb = spinner("Converting...");
    let start = Instant::now();
    let report = convert_file(input, &output, &options)
        .with_context(|| format!("Failed to convert {}", input.display()));
    pb.finish_and_clear();
    let report = report?;

    info!(
        "{} x {}, {:?}, {} palette entries",
        report.width, report.height, report.orientation, report.palette_len
    );
    done("KMZ", &report.output, start.elapsed());
    Ok(())
}

fn batch_command(
    input_root: &Path,
    output_root: &Path,
    mode: ProcessingMode,
    palette: &PaletteArgs,
) -> Result<bool> {
    let options = palette.to_options()?;
    let tasks = gather_tasks(input_root, output_root)
        .with_context(|| format!("Failed to scan {}", input_root.display()))?;
    info!("Found {} GeoTIFF files to process", tasks.len());

    let start = Instant::now();
    let pb = progress_bar(tasks.len() as u64);
    let summary = run_batch(tasks, &options, mode, |_, task, outcome| {
        if let TaskOutcome::Failed(failure) = outcome {
            pb.println(format!("FAILED {}: {}", task.input.display(), failure.reason));
        }
        pb.set_message(geokmz_kmz::base_name(&task.input));
        pb.inc(1);
    })
    .context("Batch aborted")?;
    pb.finish_and_clear();

    println!(
        "Converted {} of {} files into {}",
        summary.converted.len(),
        summary.total(),
        output_root.display()
    );
    if !summary.failed.is_empty() {
        println!("Failed ({}):", summary.failed.len());
        for failure in &summary.failed {
            println!("  {} [{}]: {}", failure.input.display(), failure.kind, failure.reason);
        }
    }
    println!("  Processing time: {:.2?}", start.elapsed());
    Ok(summary.is_success())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => info_command(&input)?,

        Commands::Convert {
            input,
            output,
            palette,
        } => convert_command(&input, output, &palette)?,

        Commands::Batch {
            input_root,
            output_root,
            jobs,
            sequential,
            palette,
        } => {
            let mode = if sequential {
                ProcessingMode::Sequential
            } else {
                ProcessingMode::from_jobs(jobs)
            };
            if !batch_command(&input_root, &output_root, mode, &palette)? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
