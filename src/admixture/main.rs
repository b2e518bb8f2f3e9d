//! Admixture winner-map renderer.
//!
//! Reads per-location ancestry proportions from CSV, interpolates each
//! category with a Gaussian process, and draws the dominant-category map
//! with optional boundary overlay and sample markers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use image::Rgba;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoatlas::interp::{plot_q, Extent, MaskSource, PlotOptions};
use geoatlas::mask::ClipMask;
use geoatlas::render::{tab10, MapCanvas};
use geoatlas::{
    AtlasConfig, BoundaryResolver, BoundarySpec, FeatureStyle, GeoAtlasFeature, GeometryCache,
    SampleTable,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "admixture")]
#[command(about = "Draw a dominant-category map from admixture proportions")]
struct Args {
    /// CSV with lon/lat columns and one proportion column per category
    #[arg(short, long)]
    samples: PathBuf,

    /// Output PNG
    #[arg(short, long)]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plot extent as min_lon,min_lat,max_lon,max_lat (default: samples + 5%)
    #[arg(long)]
    extent: Option<Extent>,

    /// Prediction grid resolution as WxH
    #[arg(long, default_value = "300x300", value_parser = parse_pair::<usize>)]
    shape: (usize, usize),

    /// Image size as WIDTHxHEIGHT
    #[arg(long, default_value = "900x900", value_parser = parse_pair::<u32>)]
    size: (u32, u32),

    /// GeoJSON polygons to clip the grid to (default: Natural Earth land)
    #[arg(long, conflicts_with = "mask_adcode")]
    mask: Option<PathBuf>,

    /// Clip to a GeoAtlas boundary instead of a GeoJSON file
    #[arg(long)]
    mask_adcode: Option<u32>,

    /// Keep every grid point
    #[arg(long, conflicts_with_all = ["mask", "mask_adcode"])]
    no_mask: bool,

    /// Filled bands per category
    #[arg(long, default_value = "8")]
    levels: usize,

    /// Keep the initial kernel hyperparameters
    #[arg(long)]
    no_optimize: bool,

    /// Overlay this GeoAtlas boundary
    #[arg(long)]
    boundary_adcode: Option<u32>,

    /// Overlay the boundary including its sub-regions
    #[arg(long)]
    boundary_full: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_pair<T: std::str::FromStr>(s: &str) -> std::result::Result<(T, T), String>
where
    T::Err: std::fmt::Display,
{
    let (a, b) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("'{}' must look like 300x300", s))?;
    let a = a.trim().parse().map_err(|e| format!("'{}': {}", s, e))?;
    let b = b.trim().parse().map_err(|e| format!("'{}': {}", s, e))?;
    Ok((a, b))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &args.config {
        Some(path) => AtlasConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AtlasConfig::default(),
    };

    info!("GeoAtlas admixture map");
    let samples = SampleTable::from_csv(&args.samples)
        .with_context(|| format!("Failed to read samples {}", args.samples.display()))?;
    info!(
        "Loaded {} samples with categories {:?}",
        samples.len(),
        samples.categories()
    );

    let cache = Arc::new(GeometryCache::new(
        BoundaryResolver::new(&config).context("Failed to create resolver")?,
    ));

    let mask = if args.no_mask {
        MaskSource::Disabled
    } else if let Some(path) = &args.mask {
        MaskSource::Custom(Arc::new(ClipMask::load(path)?))
    } else if let Some(adcode) = args.mask_adcode {
        let spec = BoundarySpec::new(3, adcode, false);
        let geometries = cache
            .geometries(&spec)
            .await
            .with_context(|| format!("Failed to load mask boundary {}", spec))?;
        MaskSource::Custom(Arc::new(ClipMask::from_geometries(geometries.iter())))
    } else {
        MaskSource::Land
    };

    let mut options = PlotOptions {
        extent: args.extent,
        shape: args.shape,
        mask,
        levels: args.levels,
        ..PlotOptions::default()
    };
    options.gaussian_process.optimize = !args.no_optimize;
    options
        .load_land_mask(cache.resolver())
        .await
        .context("Failed to load the land mask")?;

    let extent = options.resolve_extent(&samples);
    options.extent = Some(extent);

    let (width, height) = args.size;
    let canvas = MapCanvas::new(extent, width, height)?;

    let (mut canvas, interpolation, samples) = tokio::task::spawn_blocking(move || {
        let mut canvas = canvas;
        plot_q(&samples, &options, &mut canvas).map(|interp| (canvas, interp, samples))
    })
    .await
    .context("Interpolation task panicked")??;

    if let Some(adcode) = args.boundary_adcode {
        let spec = BoundarySpec::new(3, adcode, args.boundary_full);
        let feature = GeoAtlasFeature::new(Arc::clone(&cache), spec, FeatureStyle::default());
        canvas.add_feature(&feature).await?;
    }

    // sample markers coloured by their own dominant category
    let colors = tab10(samples.categories().len());
    for (i, location) in samples.locations().iter().enumerate() {
        let row = samples.row(i);
        let q = (1..row.len()).fold(0, |best, q| if row[q] > row[best] { q } else { best });
        canvas.draw_marker(location.x, location.y, Rgba([0, 0, 0, 255]), 4);
        canvas.draw_marker(location.x, location.y, colors[q], 3);
    }

    canvas
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let counts = interpolation.field.dominance_counts();
    for (category, count) in samples.categories().iter().zip(counts) {
        info!("{}: dominant at {} grid points", category, count);
    }
    info!("Wrote {}", args.output.display());

    Ok(())
}
