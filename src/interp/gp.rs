//! Gaussian process regression over 2-D locations.

use geo::Coord;
use nalgebra::DVector;
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::kernel::{Kernel, HYPERPARAMETER_BOUNDS};
use super::optimize::nelder_mead;

/// Regression configuration.
///
/// `kernel: None` means "use the default kriging kernel"; call
/// [`GaussianProcessOptions::merged_with_defaults`] to resolve it.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianProcessOptions {
    pub kernel: Option<Kernel>,
    /// Value added to the diagonal of the training covariance
    pub alpha: f64,
    /// Standardize targets before fitting
    pub normalize_y: bool,
    /// Maximize the log marginal likelihood over the kernel hyperparameters
    pub optimize: bool,
    pub max_iterations: usize,
}

impl Default for GaussianProcessOptions {
    fn default() -> Self {
        Self {
            kernel: None,
            alpha: 1e-10,
            normalize_y: false,
            optimize: true,
            max_iterations: 200,
        }
    }
}

impl GaussianProcessOptions {
    pub fn merged_with_defaults(mut self) -> Self {
        if self.kernel.is_none() {
            self.kernel = Some(Kernel::default_kriging());
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum GpError {
    #[error("no training samples")]
    Empty,

    #[error("{inputs} inputs but {targets} targets")]
    LengthMismatch { inputs: usize, targets: usize },

    #[error("non-finite target value")]
    NonFinite,

    #[error("kernel matrix is not positive definite with {kernel}")]
    NotPositiveDefinite { kernel: String },
}

/// A fitted Gaussian process (posterior mean only).
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernel: Kernel,
    x_train: Vec<Coord<f64>>,
    weights: DVector<f64>,
    y_mean: f64,
    y_std: f64,
    log_marginal_likelihood: f64,
}

struct Factorization {
    weights: DVector<f64>,
    log_marginal_likelihood: f64,
}

fn factorize(
    kernel: &Kernel,
    x: &[Coord<f64>],
    y: &DVector<f64>,
    alpha: f64,
) -> Option<Factorization> {
    let mut k = kernel.gram(x);
    for i in 0..x.len() {
        k[(i, i)] += alpha;
    }
    let chol = k.cholesky()?;
    let weights = chol.solve(y);

    let n = x.len() as f64;
    let log_det_half: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    let lml =
        -0.5 * y.dot(&weights) - log_det_half - 0.5 * n * (2.0 * std::f64::consts::PI).ln();
    if !lml.is_finite() {
        return None;
    }

    Some(Factorization {
        weights,
        log_marginal_likelihood: lml,
    })
}

impl GaussianProcess {
    pub fn fit(
        options: &GaussianProcessOptions,
        x: &[Coord<f64>],
        y: &[f64],
    ) -> Result<Self, GpError> {
        if x.is_empty() {
            return Err(GpError::Empty);
        }
        if x.len() != y.len() {
            return Err(GpError::LengthMismatch {
                inputs: x.len(),
                targets: y.len(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(GpError::NonFinite);
        }

        let (y_mean, y_std) = if options.normalize_y {
            let n = y.len() as f64;
            let mean = y.iter().sum::<f64>() / n;
            let std = (y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
            (mean, if std > 0.0 { std } else { 1.0 })
        } else {
            (0.0, 1.0)
        };
        let targets = DVector::from_iterator(y.len(), y.iter().map(|v| (v - y_mean) / y_std));

        let initial = options
            .kernel
            .clone()
            .unwrap_or_else(Kernel::default_kriging);

        let kernel = if options.optimize {
            let (lo, hi) = HYPERPARAMETER_BOUNDS;
            let (theta, _) = nelder_mead(
                |theta| {
                    let candidate = initial.with_log_params(theta);
                    factorize(&candidate, x, &targets, options.alpha)
                        .map(|f| -f.log_marginal_likelihood)
                        .unwrap_or(f64::INFINITY)
                },
                &initial.log_params(),
                (lo.ln(), hi.ln()),
                1.0,
                options.max_iterations,
                1e-8,
            );
            initial.with_log_params(&theta)
        } else {
            initial
        };

        let factorization = factorize(&kernel, x, &targets, options.alpha).ok_or_else(|| {
            GpError::NotPositiveDefinite {
                kernel: kernel.to_string(),
            }
        })?;
        debug!(
            kernel = %kernel,
            lml = factorization.log_marginal_likelihood,
            "Fitted Gaussian process"
        );

        Ok(Self {
            kernel,
            x_train: x.to_vec(),
            weights: factorization.weights,
            y_mean,
            y_std,
            log_marginal_likelihood: factorization.log_marginal_likelihood,
        })
    }

    /// Posterior mean at each point
    pub fn predict(&self, points: &[Coord<f64>]) -> Vec<f64> {
        points
            .par_iter()
            .map(|&p| {
                let mean: f64 = self
                    .x_train
                    .iter()
                    .zip(self.weights.iter())
                    .map(|(&x, w)| self.kernel.covariance(p, x) * w)
                    .sum();
                mean * self.y_std + self.y_mean
            })
            .collect()
    }

    /// Kernel after hyperparameter optimization
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }
}
