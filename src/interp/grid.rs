//! Plot extents and regular prediction grids.

use std::fmt;
use std::str::FromStr;

use geo::{BoundingRect, Coord, Geometry, Rect};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::mask::ClipMask;

/// Longitude/latitude bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let all_finite = [min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite());
        if !all_finite || min_x > max_x || min_y > max_y {
            return Err(AtlasError::InvalidOptions(format!(
                "invalid extent ({}, {}, {}, {})",
                min_x, min_y, max_x, max_y
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Expand `rect` by `fraction` of its size on each axis.
    ///
    /// An axis with no extent (all points on one meridian or parallel) is
    /// first widened to [`MIN_SPAN`] degrees around its value.
    pub fn from_rect_with_margin(rect: Rect<f64>, fraction: f64) -> Self {
        let (min_x, max_x) = widen(rect.min().x, rect.max().x);
        let (min_y, max_y) = widen(rect.min().y, rect.max().y);
        let margin_x = fraction * (max_x - min_x);
        let margin_y = fraction * (max_y - min_y);
        Self {
            min_x: min_x - margin_x,
            min_y: min_y - margin_y,
            max_x: max_x + margin_x,
            max_y: max_y + margin_y,
        }
    }

    /// Bounding box of a geometry set, `None` when it is empty
    pub fn bounding<'a, I>(geometries: I) -> Option<Rect<f64>>
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        geometries
            .into_iter()
            .filter_map(|g| g.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord {
                        x: a.min().x.min(b.min().x),
                        y: a.min().y.min(b.min().y),
                    },
                    Coord {
                        x: a.max().x.max(b.max().x),
                        y: a.max().y.max(b.max().y),
                    },
                )
            })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

impl FromStr for Extent {
    type Err = AtlasError;

    /// `min_x,min_y,max_x,max_y`
    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| AtlasError::InvalidOptions(format!("extent '{}': {}", s, e)))?;

        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Extent::new(*min_x, *min_y, *max_x, *max_y),
            _ => Err(AtlasError::InvalidOptions(format!(
                "extent '{}' must have four comma-separated values",
                s
            ))),
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// Span given to a degenerate extent axis, in degrees
pub const MIN_SPAN: f64 = 1.0;

fn widen(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        (min, max)
    } else {
        (min - MIN_SPAN / 2.0, max + MIN_SPAN / 2.0)
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| {
                    if i == n - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Regular `(W, H)` lattice over an extent with a per-point clip flag.
///
/// Cells are addressed `(ix, iy)` with `ix` along x and `iy` along y.
/// Points outside the mask keep their position but are flagged outside.
#[derive(Debug, Clone)]
pub struct PredictionGrid {
    extent: Extent,
    xs: Vec<f64>,
    ys: Vec<f64>,
    inside: Array2<bool>,
}

impl PredictionGrid {
    pub fn new(extent: Extent, shape: (usize, usize), mask: Option<&ClipMask>) -> Result<Self> {
        let (width, height) = shape;
        if width == 0 || height == 0 {
            return Err(AtlasError::InvalidOptions(format!(
                "grid shape {}x{} has a zero dimension",
                width, height
            )));
        }

        let xs = linspace(extent.min_x, extent.max_x, width);
        let ys = linspace(extent.min_y, extent.max_y, height);

        let inside = match mask {
            Some(mask) => {
                let flags: Vec<bool> = (0..width * height)
                    .into_par_iter()
                    .map(|i| mask.contains(xs[i / height], ys[i % height]))
                    .collect();
                Array2::from_shape_vec((width, height), flags)
                    .map_err(|e| AtlasError::InvalidOptions(e.to_string()))?
            }
            None => Array2::from_elem((width, height), true),
        };

        Ok(Self {
            extent,
            xs,
            ys,
            inside,
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    /// `(W, H)`
    pub fn shape(&self) -> (usize, usize) {
        (self.xs.len(), self.ys.len())
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn point(&self, ix: usize, iy: usize) -> Coord<f64> {
        Coord {
            x: self.xs[ix],
            y: self.ys[iy],
        }
    }

    /// All lattice points, `ix`-major (index `ix * H + iy`)
    pub fn points(&self) -> Vec<Coord<f64>> {
        self.xs
            .iter()
            .flat_map(|&x| self.ys.iter().map(move |&y| Coord { x, y }))
            .collect()
    }

    pub fn is_inside(&self, ix: usize, iy: usize) -> bool {
        self.inside[[ix, iy]]
    }

    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|&&v| v).count()
    }

    /// Bilinear weights of the four lattice cells around `(x, y)`.
    ///
    /// Points up to half a cell outside the lattice take the edge values;
    /// anything further out gives `None`.
    pub fn bilinear(&self, x: f64, y: f64) -> Option<Bilinear> {
        let (ix0, ix1, tx) = axis_weights(&self.xs, x)?;
        let (iy0, iy1, ty) = axis_weights(&self.ys, y)?;
        Some(Bilinear {
            corners: [(ix0, iy0), (ix1, iy0), (ix0, iy1), (ix1, iy1)],
            weights: [
                (1.0 - tx) * (1.0 - ty),
                tx * (1.0 - ty),
                (1.0 - tx) * ty,
                tx * ty,
            ],
        })
    }
}

/// Four `(ix, iy)` cells and their interpolation weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bilinear {
    pub corners: [(usize, usize); 4],
    pub weights: [f64; 4],
}

impl Bilinear {
    /// Weighted sum of `values` at the corners
    pub fn interpolate(&self, values: &Array2<f64>) -> f64 {
        self.corners
            .iter()
            .zip(self.weights)
            .map(|(&cell, w)| values[cell] * w)
            .sum()
    }

    /// Corner with the largest weight (the first one on ties)
    pub fn nearest(&self) -> (usize, usize) {
        let mut best = 0;
        for i in 1..4 {
            if self.weights[i] > self.weights[best] {
                best = i;
            }
        }
        self.corners[best]
    }
}

/// Lower index, upper index and fraction towards the upper one
fn axis_weights(axis: &[f64], value: f64) -> Option<(usize, usize, f64)> {
    let n = axis.len();
    let (start, end) = (axis[0], axis[n - 1]);
    if n == 1 || end == start {
        return (value == start).then_some((0, 0, 0.0));
    }

    let step = (end - start) / (n - 1) as f64;
    let pos = (value - start) / step;
    if pos < -0.5 || pos > (n - 1) as f64 + 0.5 {
        return None;
    }
    let pos = pos.clamp(0.0, (n - 1) as f64);
    let lower = (pos.floor() as usize).min(n - 2);
    Some((lower, lower + 1, pos - lower as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_margin_extent() {
        let rect = Rect::new((0.0, 10.0), (100.0, 30.0));
        let extent = Extent::from_rect_with_margin(rect, 0.05);
        assert_eq!(extent, Extent::new(-5.0, 9.0, 105.0, 31.0).unwrap());
    }

    #[test]
    fn test_flat_axis_gets_a_span() {
        let rect = Rect::new((81.0, 40.0), (81.0, 42.0));
        let extent = Extent::from_rect_with_margin(rect, 0.05);
        assert!((extent.width() - 1.1).abs() < 1e-9);
        assert!((extent.min_x - 80.45).abs() < 1e-9);
        assert!((extent.height() - 2.2).abs() < 1e-9);

        let point = Extent::from_rect_with_margin(Rect::new((5.0, 5.0), (5.0, 5.0)), 0.0);
        assert_eq!(point, Extent::new(4.5, 4.5, 5.5, 5.5).unwrap());
    }

    #[test]
    fn test_parse_extent() {
        let extent: Extent = "73, 2, 136, 51".parse().unwrap();
        assert_eq!(extent.width(), 63.0);
        assert!("1,2,3".parse::<Extent>().is_err());
        assert!("5,0,1,1".parse::<Extent>().is_err());
    }

    #[test]
    fn test_linspace_endpoints() {
        let xs = linspace(80.5, 82.0, 4);
        assert_eq!(xs.len(), 4);
        assert_eq!(xs[0], 80.5);
        assert_eq!(xs[3], 82.0);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
    }

    #[test]
    fn test_grid_mask_keeps_positions() {
        let mask = ClipMask::from_geometries(&[Geometry::Polygon(polygon![
            (x: -0.1, y: -0.1),
            (x: 0.4, y: -0.1),
            (x: 0.4, y: 1.1),
            (x: -0.1, y: 1.1),
        ])]);
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0).unwrap();
        let grid = PredictionGrid::new(extent, (3, 2), Some(&mask)).unwrap();

        assert_eq!(grid.shape(), (3, 2));
        assert_eq!(grid.points().len(), 6);
        assert!(grid.is_inside(0, 0));
        assert!(grid.is_inside(0, 1));
        assert!(!grid.is_inside(1, 0));
        assert!(!grid.is_inside(2, 1));
        assert_eq!(grid.inside_count(), 2);
        assert_eq!(grid.point(2, 1), Coord { x: 1.0, y: 1.0 });
    }

    #[test]
    fn test_zero_shape_rejected() {
        let extent = Extent::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(PredictionGrid::new(extent, (0, 10), None).is_err());
    }

    #[test]
    fn test_bilinear_weights() {
        let extent = Extent::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let grid = PredictionGrid::new(extent, (11, 11), None).unwrap();

        let cell = grid.bilinear(3.25, 7.5).unwrap();
        assert_eq!(cell.corners, [(3, 7), (4, 7), (3, 8), (4, 8)]);
        let expected = [0.375, 0.125, 0.375, 0.125];
        for (w, e) in cell.weights.iter().zip(expected) {
            assert!((w - e).abs() < 1e-12);
        }
        assert_eq!(cell.nearest(), (3, 7));

        let values = Array2::from_shape_fn((11, 11), |(ix, iy)| ix as f64 + 10.0 * iy as f64);
        assert!((cell.interpolate(&values) - 78.25).abs() < 1e-9);

        // half a cell beyond the edge clamps to it
        let edge = grid.bilinear(-0.4, 10.4).unwrap();
        assert!((edge.interpolate(&values) - 100.0).abs() < 1e-9);
        assert_eq!(edge.nearest(), (0, 10));
        assert_eq!(grid.bilinear(-0.6, 5.0), None);
    }
}
