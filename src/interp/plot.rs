//! The admixture winner-map pipeline: extent, grid, fits, field, contours.

use std::sync::Arc;

use ndarray::Array3;
use rayon::prelude::*;
use tracing::{debug, info};

use super::field::PredictionField;
use super::gp::{GaussianProcess, GaussianProcessOptions};
use super::grid::{Extent, PredictionGrid};
use super::kernel::Kernel;
use crate::boundary::BoundaryResolver;
use crate::error::{AtlasError, Result};
use crate::mask::ClipMask;
use crate::models::SampleTable;
use crate::render::{tab10, ContourLayer, MapCanvas};

/// Margin added around the samples when no extent is given
const EXTENT_MARGIN: f64 = 0.05;

/// Which grid points are kept for drawing
#[derive(Debug, Clone, Default)]
pub enum MaskSource {
    /// Natural Earth land polygons; must be loaded with
    /// [`PlotOptions::load_land_mask`] before interpolating
    #[default]
    Land,
    /// Keep every grid point
    Disabled,
    Custom(Arc<ClipMask>),
}

impl MaskSource {
    fn clip_mask(&self) -> Result<Option<&ClipMask>> {
        match self {
            MaskSource::Land => Err(AtlasError::InvalidOptions(
                "land mask has not been loaded; call load_land_mask or disable the mask".into(),
            )),
            MaskSource::Disabled => Ok(None),
            MaskSource::Custom(mask) => Ok(Some(mask.as_ref())),
        }
    }
}

/// Options of [`plot_q`] and [`interpolate`]
#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// Plot extent, defaults to the sample bounds plus a 5% margin
    pub extent: Option<Extent>,
    /// Prediction grid resolution `(W, H)`
    pub shape: (usize, usize),
    /// Overrides `gaussian_process.kernel` when set
    pub kernel: Option<Kernel>,
    /// Grid points outside the mask are not drawn
    pub mask: MaskSource,
    pub gaussian_process: GaussianProcessOptions,
    /// Number of filled bands per category layer
    pub levels: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            extent: None,
            shape: (300, 300),
            kernel: None,
            mask: MaskSource::Land,
            gaussian_process: GaussianProcessOptions::default(),
            levels: 8,
        }
    }
}

impl PlotOptions {
    pub fn resolve_extent(&self, samples: &SampleTable) -> Extent {
        self.extent
            .unwrap_or_else(|| Extent::from_rect_with_margin(samples.bounds(), EXTENT_MARGIN))
    }

    /// Replace [`MaskSource::Land`] with the downloaded land polygons
    pub async fn load_land_mask(&mut self, resolver: &BoundaryResolver) -> Result<()> {
        if matches!(self.mask, MaskSource::Land) {
            let mask = ClipMask::land(resolver).await?;
            self.mask = MaskSource::Custom(Arc::new(mask));
        }
        Ok(())
    }

    /// Regression options with the kernel precedence applied
    pub fn resolved_gaussian_process(&self) -> GaussianProcessOptions {
        let mut options = self.gaussian_process.clone();
        if let Some(kernel) = &self.kernel {
            options.kernel = Some(kernel.clone());
        }
        options.merged_with_defaults()
    }
}

/// Grid and normalized field produced by [`interpolate`]
#[derive(Debug, Clone)]
pub struct Interpolation {
    pub grid: PredictionGrid,
    pub field: PredictionField,
}

/// Fit one regression per category and evaluate it on the clipped grid.
pub fn interpolate(samples: &SampleTable, options: &PlotOptions) -> Result<Interpolation> {
    let extent = options.resolve_extent(samples);
    let grid = PredictionGrid::new(extent, options.shape, options.mask.clip_mask()?)?;
    let (width, height) = grid.shape();
    info!(
        extent = %extent,
        width,
        height,
        inside = grid.inside_count(),
        categories = samples.categories().len(),
        "Interpolating admixture proportions"
    );

    let gp_options = options.resolved_gaussian_process();
    let points = grid.points();

    let predictions = samples
        .categories()
        .par_iter()
        .enumerate()
        .map(|(q, category)| {
            let targets = samples.column(q).to_vec();
            let gp = GaussianProcess::fit(&gp_options, samples.locations(), &targets).map_err(
                |e| AtlasError::Fit {
                    category: category.clone(),
                    reason: e.to_string(),
                },
            )?;
            debug!(category = %category, kernel = %gp.kernel(), "Category fitted");
            Ok(gp.predict(&points))
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let raw = Array3::from_shape_vec(
        (predictions.len(), width, height),
        predictions.into_iter().flatten().collect(),
    )
    .map_err(|e| AtlasError::InvalidOptions(e.to_string()))?;
    let field = PredictionField::from_predictions(samples.categories().to_vec(), raw)?;

    Ok(Interpolation { grid, field })
}

/// Interpolate `samples` and draw one contour layer per category onto `canvas`.
///
/// Each category gets a tab10 colour; its layer covers the unmasked cells it
/// dominates and ramps from #F5F5F5 to that colour.
pub fn plot_q(
    samples: &SampleTable,
    options: &PlotOptions,
    canvas: &mut MapCanvas,
) -> Result<Interpolation> {
    let interpolation = interpolate(samples, options)?;
    let colors = tab10(samples.categories().len());

    for (q, base) in colors.into_iter().enumerate() {
        let layer = ContourLayer::build(
            &interpolation.field,
            &interpolation.grid,
            q,
            base,
            options.levels,
        )?;
        debug!(
            category = %samples.categories()[q],
            cells = layer.cell_count(),
            "Drawing contour layer"
        );
        canvas.draw_contour(&layer, &interpolation.grid);
    }

    Ok(interpolation)
}
