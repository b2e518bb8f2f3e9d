//! Plate carrée raster canvas for boundaries, contour layers and markers.

use std::path::Path;

use geo::{Coord, Geometry, LineString, Polygon};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, Blend};
use tracing::debug;

use super::colors::{blend, with_alpha, Color};
use super::contour::ContourLayer;
use crate::boundary::{Feature, FeatureStyle};
use crate::error::{AtlasError, Result};
use crate::interp::{Extent, PredictionGrid};

const BACKGROUND: Color = Rgba([255, 255, 255, 255]);

/// An RGBA image mapped linearly onto a longitude/latitude extent.
///
/// Pixel `(0, 0)` is the top-left corner, at `(min_x, max_y)`.
pub struct MapCanvas {
    extent: Extent,
    image: RgbaImage,
}

impl MapCanvas {
    pub fn new(extent: Extent, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AtlasError::InvalidOptions(format!(
                "canvas size {}x{} has a zero dimension",
                width, height
            )));
        }
        if extent.width() <= 0.0 || extent.height() <= 0.0 {
            return Err(AtlasError::InvalidOptions(format!(
                "canvas extent {} has no area",
                extent
            )));
        }
        Ok(Self {
            extent,
            image: RgbaImage::from_pixel(width, height, BACKGROUND),
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        *self.image.get_pixel(x, y)
    }

    /// Continuous pixel coordinates of a lon/lat position
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let e = &self.extent;
        (
            (lon - e.min_x) / e.width() * self.width() as f64,
            (e.max_y - lat) / e.height() * self.height() as f64,
        )
    }

    /// Lon/lat of a pixel centre
    pub fn to_geo(&self, px: u32, py: u32) -> Coord<f64> {
        let e = &self.extent;
        Coord {
            x: e.min_x + (px as f64 + 0.5) / self.width() as f64 * e.width(),
            y: e.max_y - (py as f64 + 0.5) / self.height() as f64 * e.height(),
        }
    }

    pub fn draw_geometries(&mut self, geometries: &[Geometry<f64>], style: &FeatureStyle) {
        for geometry in geometries {
            self.draw_geometry(geometry, style);
        }
    }

    fn draw_geometry(&mut self, geometry: &Geometry<f64>, style: &FeatureStyle) {
        match geometry {
            Geometry::Polygon(p) => self.draw_polygon(p, style),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|p| self.draw_polygon(p, style)),
            Geometry::Rect(r) => self.draw_polygon(&r.to_polygon(), style),
            Geometry::Triangle(t) => self.draw_polygon(&t.to_polygon(), style),
            Geometry::LineString(ls) => self.stroke(ls, style),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.stroke(ls, style)),
            Geometry::Line(l) => self.stroke(&LineString::from(vec![l.start, l.end]), style),
            Geometry::Point(p) => self.draw_point(p.0, style),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.draw_point(p.0, style)),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.draw_geometry(g, style)),
        }
    }

    fn draw_polygon(&mut self, polygon: &Polygon<f64>, style: &FeatureStyle) {
        if let Some(face) = style.facecolor {
            self.fill_polygon(polygon, face, style.alpha);
        }
        self.stroke(polygon.exterior(), style);
        for ring in polygon.interiors() {
            self.stroke(ring, style);
        }
    }

    fn draw_point(&mut self, coord: Coord<f64>, style: &FeatureStyle) {
        let color = style.edgecolor.or(style.facecolor);
        if let Some(color) = color {
            let radius = style.linewidth.max(1.0).round() as i32;
            self.draw_marker(coord.x, coord.y, with_alpha(color, style.alpha), radius);
        }
    }

    /// Even-odd scanline fill sampled at pixel centres
    fn fill_polygon(&mut self, polygon: &Polygon<f64>, color: Color, alpha: f32) {
        let rings: Vec<Vec<(f64, f64)>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(|ring| ring.coords().map(|c| self.to_pixel(c.x, c.y)).collect())
            .collect();

        let (min_y, max_y) = rings
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
                (lo.min(y), hi.max(y))
            });
        if !min_y.is_finite() || !max_y.is_finite() {
            return;
        }

        let (width, height) = (self.width() as i64, self.height() as i64);
        let first_row = (min_y - 0.5).ceil().max(0.0) as i64;
        let last_row = ((max_y - 0.5).floor() as i64).min(height - 1);

        let mut crossings = Vec::new();
        for row in first_row..=last_row {
            let y = row as f64 + 0.5;
            crossings.clear();
            for ring in &rings {
                for edge in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                    if (y0 <= y) != (y1 <= y) {
                        crossings.push(x0 + (y - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            crossings.sort_by(f64::total_cmp);

            for span in crossings.chunks_exact(2) {
                let start = ((span[0] - 0.5).ceil() as i64).max(0);
                let end = ((span[1] - 0.5).ceil() as i64).min(width);
                for col in start..end {
                    blend(self.image.get_pixel_mut(col as u32, row as u32), color, alpha);
                }
            }
        }
    }

    fn stroke(&mut self, line: &LineString<f64>, style: &FeatureStyle) {
        let Some(edge) = style.edgecolor else {
            return;
        };
        if style.linewidth <= 0.0 {
            return;
        }
        let color = with_alpha(edge, style.alpha);
        let passes = style.linewidth.round().max(1.0) as i32;

        let segments: Vec<((f32, f32), (f32, f32))> = line
            .lines()
            .map(|l| {
                let (x0, y0) = self.to_pixel(l.start.x, l.start.y);
                let (x1, y1) = self.to_pixel(l.end.x, l.end.y);
                ((x0 as f32, y0 as f32), (x1 as f32, y1 as f32))
            })
            .collect();

        let mut canvas = Blend(std::mem::replace(&mut self.image, RgbaImage::new(0, 0)));
        for ((x0, y0), (x1, y1)) in segments {
            let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
            let (nx, ny) = if length > 0.0 {
                (-(y1 - y0) / length, (x1 - x0) / length)
            } else {
                (0.0, 0.0)
            };
            for pass in 0..passes {
                let offset = pass as f32 - (passes - 1) as f32 / 2.0;
                draw_line_segment_mut(
                    &mut canvas,
                    (x0 + nx * offset, y0 + ny * offset),
                    (x1 + nx * offset, y1 + ny * offset),
                    color,
                );
            }
        }
        self.image = canvas.0;
    }

    /// Draw every geometry of a map layer with its own style
    pub async fn add_feature(&mut self, feature: &dyn Feature) -> Result<()> {
        let geometries = feature.geometries().await?;
        debug!(count = geometries.len(), "Drawing feature");
        self.draw_geometries(&geometries, feature.style());
        Ok(())
    }

    /// Paint the layer, sampled bilinearly at each pixel centre
    pub fn draw_contour(&mut self, layer: &ContourLayer, grid: &PredictionGrid) {
        if layer.is_empty() {
            return;
        }
        for py in 0..self.height() {
            for px in 0..self.width() {
                let at = self.to_geo(px, py);
                if let Some(color) = layer.color_near(grid, at.x, at.y) {
                    self.image.put_pixel(px, py, color);
                }
            }
        }
    }

    pub fn draw_marker(&mut self, lon: f64, lat: f64, color: Color, radius: i32) {
        let (x, y) = self.to_pixel(lon, lat);
        let mut canvas = Blend(std::mem::replace(&mut self.image, RgbaImage::new(0, 0)));
        draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), radius, color);
        self.image = canvas.0;
    }

    /// Write the canvas as PNG
    pub fn save(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| AtlasError::Render(format!("{}: {}", path.display(), e)))
    }
}
