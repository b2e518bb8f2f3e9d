//! DataV.GeoAtlas administrative boundaries.
//!
//! Resolves boundary documents to local files (downloading on first use),
//! parses them into geometries, memoizes the result per spec and exposes
//! it as a drawable map layer.

mod cache;
mod feature;
pub mod geometry;
mod resolver;

pub use cache::{CachedGeometrySet, GeometryCache};
pub use feature::{Feature, FeatureStyle, GeoAtlasFeature};
pub use geometry::{parse_geometries, read_geometries};
pub use resolver::BoundaryResolver;
