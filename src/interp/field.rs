//! Normalized per-category predictions and dominant-category assignment.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::error::{AtlasError, Result};

/// Predicted proportions indexed `[category, ix, iy]`.
///
/// Values are clipped to [0, 1] and normalized so they sum to 1 across
/// categories at every point. A point whose clipped predictions are all
/// zero cannot be normalized: its values stay 0 and it has no dominant
/// category.
#[derive(Debug, Clone)]
pub struct PredictionField {
    categories: Vec<String>,
    values: Array3<f64>,
    dominant: Array2<Option<usize>>,
}

impl PredictionField {
    pub fn from_predictions(categories: Vec<String>, mut raw: Array3<f64>) -> Result<Self> {
        let (n_cat, width, height) = raw.dim();
        if n_cat == 0 || n_cat != categories.len() {
            return Err(AtlasError::InvalidOptions(format!(
                "{} prediction layers for {} categories",
                n_cat,
                categories.len()
            )));
        }

        raw.mapv_inplace(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 });

        let mut dominant = Array2::from_elem((width, height), None);
        for ix in 0..width {
            for iy in 0..height {
                let mut lane = raw.slice_mut(s![.., ix, iy]);
                let sum: f64 = lane.sum();
                if sum <= 0.0 {
                    continue;
                }
                lane.mapv_inplace(|v| v / sum);

                // strict comparison keeps the first category on ties
                let mut best = 0;
                for q in 1..n_cat {
                    if lane[q] > lane[best] {
                        best = q;
                    }
                }
                dominant[[ix, iy]] = Some(best);
            }
        }

        Ok(Self {
            categories,
            values: raw,
            dominant,
        })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// `(W, H)`
    pub fn shape(&self) -> (usize, usize) {
        let (_, width, height) = self.values.dim();
        (width, height)
    }

    pub fn value(&self, category: usize, ix: usize, iy: usize) -> f64 {
        self.values[[category, ix, iy]]
    }

    /// Normalized proportions of one category over the grid
    pub fn category_values(&self, category: usize) -> ArrayView2<'_, f64> {
        self.values.index_axis(Axis(0), category)
    }

    /// Index of the dominant category, `None` for unclassified points
    pub fn dominant(&self, ix: usize, iy: usize) -> Option<usize> {
        self.dominant[[ix, iy]]
    }

    pub fn dominant_map(&self) -> &Array2<Option<usize>> {
        &self.dominant
    }

    /// Number of points dominated by each category
    pub fn dominance_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.categories.len()];
        for q in self.dominant.iter().flatten() {
            counts[*q] += 1;
        }
        counts
    }
}
