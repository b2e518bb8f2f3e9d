//! GeoAtlas - DataV.GeoAtlas boundaries and admixture winner maps
//!
//! This library provides the boundary resolver and geometry cache used by the
//! `fetch` binary, and the interpolation and rendering pipeline used by the
//! `admixture` binary.

pub mod boundary;
pub mod config;
pub mod error;
pub mod interp;
pub mod mask;
pub mod models;
pub mod render;

pub use boundary::{BoundaryResolver, Feature, FeatureStyle, GeoAtlasFeature, GeometryCache};
pub use config::AtlasConfig;
pub use error::{AtlasError, Result};
pub use models::{BoundarySpec, SampleTable, Version};
