//! Filled-contour layers for the dominant-category map.

use ndarray::Array2;

use super::colors::{lerp, Color, NEUTRAL};
use crate::error::{AtlasError, Result};
use crate::interp::{PredictionField, PredictionGrid};

/// One category's filled contours.
///
/// Only cells that are inside the clip mask and dominated by the category
/// belong to the layer. Values are split into `levels` equal bands between
/// the layer's own minimum and maximum, so each layer has an independent
/// colour scale ramping from #F5F5F5 to the category's base colour.
///
/// Between cells the layer is sampled bilinearly: the layer edge is the
/// zero line of the category's lead over the strongest other category, and
/// band edges are the interpolated level lines. Quads with a corner outside
/// the mask or unclassified are left empty.
#[derive(Debug, Clone)]
pub struct ContourLayer {
    category: usize,
    values: Array2<f64>,
    /// lead of this category over the best other one
    margin: Array2<f64>,
    eligible: Array2<bool>,
    bands: Array2<Option<usize>>,
    colors: Vec<Color>,
    range: Option<(f64, f64)>,
}

impl ContourLayer {
    pub fn build(
        field: &PredictionField,
        grid: &PredictionGrid,
        category: usize,
        base: Color,
        levels: usize,
    ) -> Result<Self> {
        if levels == 0 {
            return Err(AtlasError::InvalidOptions(
                "contour levels must be at least 1".to_string(),
            ));
        }
        if field.shape() != grid.shape() {
            return Err(AtlasError::InvalidOptions(format!(
                "field shape {:?} does not match grid shape {:?}",
                field.shape(),
                grid.shape()
            )));
        }
        let n_cat = field.categories().len();
        if category >= n_cat {
            return Err(AtlasError::InvalidOptions(format!(
                "category index {} out of range",
                category
            )));
        }

        let shape = grid.shape();
        let values = field.category_values(category).to_owned();
        let eligible = Array2::from_shape_fn(shape, |(ix, iy)| {
            grid.is_inside(ix, iy) && field.dominant(ix, iy).is_some()
        });
        let margin = Array2::from_shape_fn(shape, |(ix, iy)| {
            let best_other = (0..n_cat)
                .filter(|&p| p != category)
                .map(|p| field.value(p, ix, iy))
                .fold(None, |best: Option<f64>, v| Some(best.map_or(v, |b| b.max(v))));
            values[[ix, iy]] - best_other.unwrap_or(0.0)
        });
        let member = |ix: usize, iy: usize| {
            eligible[[ix, iy]] && field.dominant(ix, iy) == Some(category)
        };

        let mut range: Option<(f64, f64)> = None;
        for ((ix, iy), &v) in values.indexed_iter() {
            if !member(ix, iy) {
                continue;
            }
            range = Some(match range {
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
                None => (v, v),
            });
        }

        // a flat layer collapses to a single band in the base colour
        let flat = matches!(range, Some((lo, hi)) if hi <= lo);
        let colors: Vec<Color> = if flat {
            vec![base]
        } else {
            (0..levels)
                .map(|i| lerp(NEUTRAL, base, (i as f64 + 0.5) / levels as f64))
                .collect()
        };

        let bands = Array2::from_shape_fn(shape, |(ix, iy)| {
            member(ix, iy).then(|| band_index(values[[ix, iy]], range, colors.len()))
        });

        Ok(Self {
            category,
            values,
            margin,
            eligible,
            bands,
            colors,
            range,
        })
    }

    pub fn category(&self) -> usize {
        self.category
    }

    /// Band index of a cell, `None` when the cell is not part of the layer
    pub fn band_at(&self, ix: usize, iy: usize) -> Option<usize> {
        self.bands[[ix, iy]]
    }

    /// Colour of the layer at an arbitrary map position, `None` where the
    /// layer is not drawn
    pub fn color_near(&self, grid: &PredictionGrid, x: f64, y: f64) -> Option<Color> {
        self.range?;
        let cell = grid.bilinear(x, y)?;
        if !cell.corners.iter().all(|&c| self.eligible[c]) {
            return None;
        }

        let margin = cell.interpolate(&self.margin);
        // exact ties fall back to the nearest cell's winner
        let owned = margin > 0.0 || (margin == 0.0 && self.bands[cell.nearest()].is_some());
        if !owned {
            return None;
        }
        let value = cell.interpolate(&self.values);
        Some(self.colors[band_index(value, self.range, self.colors.len())])
    }

    /// Band colours from lowest to highest
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// `(min, max)` of the layer's values
    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    pub fn cell_count(&self) -> usize {
        self.bands.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_none()
    }
}

/// Equal-width band of `value` within `range`
fn band_index(value: f64, range: Option<(f64, f64)>, bands: usize) -> usize {
    match range {
        Some((lo, hi)) if bands > 1 && hi > lo => {
            let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
            ((t * bands as f64) as usize).min(bands - 1)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Extent;
    use crate::mask::ClipMask;
    use geo::{polygon, Geometry};
    use image::Rgba;
    use ndarray::Array3;

    const BLUE: Color = Rgba([0x1f, 0x77, 0xb4, 255]);

    fn field_1x4() -> PredictionField {
        // category 0 dominates the first three cells with rising values
        let raw = Array3::from_shape_vec(
            (2, 4, 1),
            vec![0.6, 0.7, 0.9, 0.1, 0.4, 0.3, 0.1, 0.9],
        )
        .unwrap();
        PredictionField::from_predictions(vec!["K1".into(), "K2".into()], raw).unwrap()
    }

    fn grid_1x4(mask: Option<&ClipMask>) -> PredictionGrid {
        let extent = Extent::new(0.0, 0.0, 3.0, 0.0).unwrap();
        PredictionGrid::new(extent, (4, 1), mask).unwrap()
    }

    #[test]
    fn test_layer_covers_dominated_cells() {
        let field = field_1x4();
        let grid = grid_1x4(None);

        let first = ContourLayer::build(&field, &grid, 0, BLUE, 4).unwrap();
        assert_eq!(first.cell_count(), 3);
        assert_eq!(first.band_at(0, 0), Some(0));
        assert_eq!(first.band_at(2, 0), Some(3));
        assert_eq!(first.band_at(3, 0), None);

        let (lo, hi) = first.range().unwrap();
        assert!((lo - 0.6).abs() < 1e-12);
        assert!((hi - 0.9).abs() < 1e-12);

        let second = ContourLayer::build(&field, &grid, 1, BLUE, 4).unwrap();
        assert_eq!(second.cell_count(), 1);
        assert_eq!(second.colors(), &[BLUE][..]);
    }

    #[test]
    fn test_ramp_runs_from_neutral_to_base() {
        let layer = ContourLayer::build(&field_1x4(), &grid_1x4(None), 0, BLUE, 8).unwrap();
        let colors = layer.colors();
        assert_eq!(colors.len(), 8);
        assert_eq!(colors[0], lerp(NEUTRAL, BLUE, 1.0 / 16.0));
        assert_eq!(colors[7], lerp(NEUTRAL, BLUE, 15.0 / 16.0));
    }

    #[test]
    fn test_masked_cells_are_excluded() {
        let mask = ClipMask::from_geometries(&[Geometry::Polygon(polygon![
            (x: 0.5, y: -1.0),
            (x: 5.0, y: -1.0),
            (x: 5.0, y: 1.0),
            (x: 0.5, y: 1.0),
        ])]);
        let layer =
            ContourLayer::build(&field_1x4(), &grid_1x4(Some(&mask)), 0, BLUE, 4).unwrap();
        assert_eq!(layer.band_at(0, 0), None);
        assert_eq!(layer.cell_count(), 2);
    }

    #[test]
    fn test_rejects_zero_levels() {
        assert!(ContourLayer::build(&field_1x4(), &grid_1x4(None), 0, BLUE, 0).is_err());
    }

    #[test]
    fn test_bands_interpolate_between_cells() {
        let layer = ContourLayer::build(&field_1x4(), &grid_1x4(None), 0, BLUE, 4).unwrap();
        let grid = grid_1x4(None);

        // halfway between 0.7 and 0.9 is 0.8, two thirds up the 0.6..0.9 range
        assert_eq!(layer.color_near(&grid, 1.5, 0.0), Some(layer.colors()[2]));
        assert_eq!(layer.color_near(&grid, 0.0, 0.0), Some(layer.colors()[0]));
        assert_eq!(layer.color_near(&grid, 2.0, 0.0), Some(layer.colors()[3]));
    }

    #[test]
    fn test_layer_edge_follows_zero_lead() {
        let field = field_1x4();
        let grid = grid_1x4(None);
        let first = ContourLayer::build(&field, &grid, 0, BLUE, 4).unwrap();
        let second = ContourLayer::build(&field, &grid, 1, BLUE, 4).unwrap();

        // leads of +0.8 and -0.8 cross halfway between cells 2 and 3
        assert!(first.color_near(&grid, 2.4, 0.0).is_some());
        assert!(second.color_near(&grid, 2.4, 0.0).is_none());
        assert!(first.color_near(&grid, 2.6, 0.0).is_none());
        assert!(second.color_near(&grid, 2.6, 0.0).is_some());

        assert!(second.color_near(&grid, 3.4, 0.0).is_some());
        assert!(second.color_near(&grid, 3.6, 0.0).is_none());
    }

    #[test]
    fn test_quads_touching_the_mask_are_empty() {
        let mask = ClipMask::from_geometries(&[Geometry::Polygon(polygon![
            (x: 0.5, y: -1.0),
            (x: 5.0, y: -1.0),
            (x: 5.0, y: 1.0),
            (x: 0.5, y: 1.0),
        ])]);
        let grid = grid_1x4(Some(&mask));
        let layer = ContourLayer::build(&field_1x4(), &grid, 0, BLUE, 4).unwrap();
        assert!(layer.color_near(&grid, 0.5, 0.0).is_none());
        assert!(layer.color_near(&grid, 1.5, 0.0).is_some());
    }
}
