//! Boundary fetcher.
//!
//! Resolves a DataV.GeoAtlas boundary to its local cache path, downloading
//! it on first use, and optionally draws it onto a PNG map.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geoatlas::interp::Extent;
use geoatlas::render::{parse_color, MapCanvas};
use geoatlas::{
    AtlasConfig, BoundaryResolver, BoundarySpec, Feature, FeatureStyle, GeoAtlasFeature,
    GeometryCache, Version,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "fetch")]
#[command(about = "Resolve and cache a DataV.GeoAtlas boundary")]
struct Args {
    /// Administrative area code (100000 is the whole country)
    #[arg(short, long, default_value = "100000")]
    adcode: u32,

    /// Data version: 2, 3 or a literal path segment such as areas_v3
    #[arg(long, default_value = "3")]
    version: Version,

    /// Fetch the boundary including its sub-regions
    #[arg(long)]
    full: bool,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the cache root
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Draw the boundary to this PNG file
    #[arg(long)]
    render: Option<PathBuf>,

    /// Map extent as min_lon,min_lat,max_lon,max_lat (default: boundary bounds)
    #[arg(long)]
    extent: Option<Extent>,

    /// Image size as WIDTHxHEIGHT
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    size: (u32, u32),

    /// Fill colour, or "none"
    #[arg(long, default_value = "none")]
    facecolor: String,

    /// Outline colour, or "none"
    #[arg(long, default_value = "black")]
    edgecolor: String,

    /// Layer opacity
    #[arg(long, default_value = "1.0")]
    alpha: f32,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("size '{}' must look like 800x600", s))?;
    let w = w.trim().parse().map_err(|e| format!("width: {}", e))?;
    let h = h.trim().parse().map_err(|e| format!("height: {}", e))?;
    Ok((w, h))
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

    let mut config = match &args.config {
        Some(path) => AtlasConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AtlasConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    let spec = BoundarySpec::new(args.version.clone(), args.adcode, args.full);
    info!("GeoAtlas fetch: {}", spec);

    let resolver = BoundaryResolver::new(&config).context("Failed to create resolver")?;
    let path = resolver
        .resolve(&spec)
        .await
        .with_context(|| format!("Failed to resolve boundary {}", spec))?;
    println!("{}", path.display());

    let Some(output) = &args.render else {
        return Ok(());
    };

    let style = FeatureStyle::default()
        .with_facecolor(parse_color(&args.facecolor)?)
        .with_edgecolor(parse_color(&args.edgecolor)?)
        .with_alpha(args.alpha);
    let cache = Arc::new(GeometryCache::new(resolver));
    let feature = GeoAtlasFeature::new(Arc::clone(&cache), spec, style);

    let extent = match args.extent {
        Some(extent) => extent,
        None => {
            let geometries = feature.geometries().await?;
            let rect = Extent::bounding(geometries.iter())
                .context("Boundary has no geometries to frame")?;
            Extent::from_rect_with_margin(rect, 0.05)
        }
    };

    let (width, height) = args.size;
    let mut canvas = MapCanvas::new(extent, width, height)?;
    canvas.add_feature(&feature).await?;
    canvas
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {} ({}x{}, extent {})", output.display(), width, height, extent);

    Ok(())
}
