//! Spatial interpolation of admixture proportions and dominant-category maps.

mod field;
mod gp;
mod grid;
mod kernel;
mod optimize;
mod plot;

pub use field::PredictionField;
pub use gp::{GaussianProcess, GaussianProcessOptions, GpError};
pub use grid::{linspace, Bilinear, Extent, PredictionGrid};
pub use kernel::{Kernel, HYPERPARAMETER_BOUNDS};
pub use plot::{interpolate, plot_q, Interpolation, MaskSource, PlotOptions};
