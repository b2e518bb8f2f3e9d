//! Drawable boundary layers.

use std::sync::Arc;

use async_trait::async_trait;

use super::cache::{CachedGeometrySet, GeometryCache};
use crate::error::Result;
use crate::models::BoundarySpec;
use crate::render::colors::Color;

/// Drawing attributes of a map layer
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStyle {
    /// Polygon fill, `None` leaves the interior untouched
    pub facecolor: Option<Color>,
    /// Outline colour, `None` draws no outline
    pub edgecolor: Option<Color>,
    /// Opacity applied to both fill and outline
    pub alpha: f32,
    /// Outline width in pixels
    pub linewidth: f32,
}

impl Default for FeatureStyle {
    fn default() -> Self {
        Self {
            facecolor: None,
            edgecolor: Some(Color::from([0, 0, 0, 255])),
            alpha: 1.0,
            linewidth: 1.0,
        }
    }
}

impl FeatureStyle {
    pub fn with_facecolor(mut self, color: Option<Color>) -> Self {
        self.facecolor = color;
        self
    }

    pub fn with_edgecolor(mut self, color: Option<Color>) -> Self {
        self.edgecolor = color;
        self
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_linewidth(mut self, linewidth: f32) -> Self {
        self.linewidth = linewidth.max(0.0);
        self
    }
}

/// Something a map canvas can draw: a restartable geometry sequence plus style.
#[async_trait]
pub trait Feature: Send + Sync {
    /// Geometries of the layer; may be requested any number of times
    async fn geometries(&self) -> Result<CachedGeometrySet>;

    fn style(&self) -> &FeatureStyle;
}

/// A DataV.GeoAtlas boundary as a map layer.
pub struct GeoAtlasFeature {
    cache: Arc<GeometryCache>,
    spec: BoundarySpec,
    style: FeatureStyle,
}

impl GeoAtlasFeature {
    pub fn new(cache: Arc<GeometryCache>, spec: BoundarySpec, style: FeatureStyle) -> Self {
        Self { cache, spec, style }
    }

    pub fn spec(&self) -> &BoundarySpec {
        &self.spec
    }
}

#[async_trait]
impl Feature for GeoAtlasFeature {
    async fn geometries(&self) -> Result<CachedGeometrySet> {
        self.cache.geometries(&self.spec).await
    }

    fn style(&self) -> &FeatureStyle {
        &self.style
    }
}
