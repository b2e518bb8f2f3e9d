//! Clip masks for prediction grids (typically land polygons).

use std::fmt;
use std::path::Path;

use geo::{BoundingRect, Geometry, Intersects, Point, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use crate::boundary::{read_geometries, BoundaryResolver};
use crate::error::{AtlasError, Result};

/// Wrapper for R-tree indexing of mask polygons
struct MaskPolygon {
    polygon: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for MaskPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl MaskPolygon {
    fn new(polygon: Polygon<f64>) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        Some(Self {
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
            polygon,
        })
    }
}

/// Polygon set deciding which grid points are kept.
///
/// Points on a polygon boundary count as inside.
pub struct ClipMask {
    tree: RTree<MaskPolygon>,
}

impl fmt::Debug for ClipMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipMask")
            .field("polygons", &self.tree.size())
            .finish()
    }
}

impl ClipMask {
    /// Build from any geometries; non-areal geometries are ignored
    pub fn from_geometries<'a, I>(geometries: I) -> Self
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        let mut polygons = Vec::new();
        for geometry in geometries {
            match geometry {
                Geometry::Polygon(p) => polygons.push(p.clone()),
                Geometry::MultiPolygon(mp) => polygons.extend(mp.iter().cloned()),
                Geometry::Rect(r) => polygons.push(r.to_polygon()),
                Geometry::Triangle(t) => polygons.push(t.to_polygon()),
                _ => {}
            }
        }

        let indexed: Vec<MaskPolygon> = polygons.into_iter().filter_map(MaskPolygon::new).collect();
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Load a GeoJSON polygon set
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading clip mask from {}...", path.display());
        let geometries = read_geometries(path)?;
        let mask = Self::from_geometries(&geometries);
        if mask.is_empty() {
            return Err(AtlasError::Parse {
                path: path.to_path_buf(),
                reason: "mask contains no polygons".to_string(),
            });
        }
        info!("Clip mask ready with {} polygons", mask.len());
        Ok(mask)
    }

    /// Natural Earth land polygons, downloaded and cached by `resolver` on first use
    pub async fn land(resolver: &BoundaryResolver) -> Result<Self> {
        let path = resolver.resolve_land_mask().await?;
        let read_path = path.clone();
        tokio::task::spawn_blocking(move || Self::load(&read_path))
            .await
            .map_err(|e| AtlasError::io(&path, std::io::Error::other(e)))?
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        let point = Point::new(x, y);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .any(|mp| mp.polygon.intersects(&point))
    }

    /// Number of indexed polygons
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
