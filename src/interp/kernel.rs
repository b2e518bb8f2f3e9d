//! Stationary covariance kernels for Gaussian process regression.

use std::fmt;
use std::ops::Add;

use geo::Coord;
use nalgebra::DMatrix;

/// Bounds applied to every hyperparameter during optimization
pub const HYPERPARAMETER_BOUNDS: (f64, f64) = (1e-5, 1e5);

/// Covariance function over 2-D locations.
///
/// `White` only contributes on the diagonal of a training covariance; it
/// adds nothing between distinct point sets.
#[derive(Debug, Clone, PartialEq)]
pub enum Kernel {
    /// `(1 + d² / (2 α ℓ²))^-α`
    RationalQuadratic { length_scale: f64, alpha: f64 },
    /// `exp(-d² / (2 ℓ²))`
    Rbf { length_scale: f64 },
    /// `noise_level` on the diagonal
    White { noise_level: f64 },
    Sum(Vec<Kernel>),
}

impl Kernel {
    /// Rational quadratic + RBF + white noise: a smooth large-scale trend,
    /// short-range variation and per-sample noise.
    pub fn default_kriging() -> Self {
        Kernel::RationalQuadratic {
            length_scale: 1.0,
            alpha: 0.1,
        } + Kernel::Rbf { length_scale: 1.0 }
            + Kernel::White { noise_level: 0.1 }
    }

    /// Covariance between two distinct locations
    pub fn covariance(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        self.stationary(dx * dx + dy * dy)
    }

    fn stationary(&self, d2: f64) -> f64 {
        match self {
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => (1.0 + d2 / (2.0 * alpha * length_scale * length_scale)).powf(-alpha),
            Kernel::Rbf { length_scale } => (-0.5 * d2 / (length_scale * length_scale)).exp(),
            Kernel::White { .. } => 0.0,
            Kernel::Sum(terms) => terms.iter().map(|k| k.stationary(d2)).sum(),
        }
    }

    fn diagonal_noise(&self) -> f64 {
        match self {
            Kernel::White { noise_level } => *noise_level,
            Kernel::Sum(terms) => terms.iter().map(|k| k.diagonal_noise()).sum(),
            _ => 0.0,
        }
    }

    /// Training covariance `K(X, X)`, white noise included
    pub fn gram(&self, x: &[Coord<f64>]) -> DMatrix<f64> {
        let noise = self.diagonal_noise();
        let n = x.len();
        let mut k = DMatrix::zeros(n, n);
        for i in 0..n {
            k[(i, i)] = self.stationary(0.0) + noise;
            for j in 0..i {
                let v = self.covariance(x[i], x[j]);
                k[(i, j)] = v;
                k[(j, i)] = v;
            }
        }
        k
    }

    /// Hyperparameters in log space, in a fixed traversal order
    pub fn log_params(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out.into_iter().map(f64::ln).collect()
    }

    fn collect_params(&self, out: &mut Vec<f64>) {
        match self {
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => {
                out.push(*length_scale);
                out.push(*alpha);
            }
            Kernel::Rbf { length_scale } => out.push(*length_scale),
            Kernel::White { noise_level } => out.push(*noise_level),
            Kernel::Sum(terms) => terms.iter().for_each(|k| k.collect_params(out)),
        }
    }

    /// Copy of this kernel with hyperparameters replaced from log space
    pub fn with_log_params(&self, theta: &[f64]) -> Kernel {
        let mut values = theta.iter().map(|t| t.exp());
        self.rebuild(&mut values)
    }

    fn rebuild(&self, values: &mut impl Iterator<Item = f64>) -> Kernel {
        let (lo, hi) = HYPERPARAMETER_BOUNDS;
        let mut next = |current: f64| values.next().unwrap_or(current).clamp(lo, hi);
        match self {
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => {
                let length_scale = next(*length_scale);
                let alpha = next(*alpha);
                Kernel::RationalQuadratic {
                    length_scale,
                    alpha,
                }
            }
            Kernel::Rbf { length_scale } => Kernel::Rbf {
                length_scale: next(*length_scale),
            },
            Kernel::White { noise_level } => Kernel::White {
                noise_level: next(*noise_level),
            },
            Kernel::Sum(terms) => Kernel::Sum(terms.iter().map(|k| k.rebuild(values)).collect()),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::default_kriging()
    }
}

impl Add for Kernel {
    type Output = Kernel;

    fn add(self, rhs: Kernel) -> Kernel {
        let mut terms = match self {
            Kernel::Sum(terms) => terms,
            other => vec![other],
        };
        match rhs {
            Kernel::Sum(more) => terms.extend(more),
            other => terms.push(other),
        }
        Kernel::Sum(terms)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => write!(
                f,
                "RationalQuadratic(alpha={:.3}, length_scale={:.3})",
                alpha, length_scale
            ),
            Kernel::Rbf { length_scale } => write!(f, "RBF(length_scale={:.3})", length_scale),
            Kernel::White { noise_level } => {
                write!(f, "WhiteKernel(noise_level={:.3})", noise_level)
            }
            Kernel::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" + ")?;
                    }
                    write!(f, "{}", term)?;
                }
                Ok(())
            }
        }
    }
}
