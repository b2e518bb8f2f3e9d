//! Error types for boundary resolution, interpolation and rendering.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::BoundarySpec;

/// Result type alias using AtlasError.
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Primary error type for the crate.
#[derive(Debug, Error)]
pub enum AtlasError {
    // === Boundary Errors ===
    #[error("Failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Failed to download boundary {spec} from {url}: {source}")]
    Download {
        spec: BoundarySpec,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Boundary {spec} request to {url} returned HTTP {status}")]
    HttpStatus {
        spec: BoundarySpec,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Invalid dataset version '{0}'")]
    InvalidVersion(String),

    #[error("Failed to download land mask from {url}: {reason}")]
    LandMask { url: String, reason: String },

    #[error("Invalid URL template: {0}")]
    UrlTemplate(String),

    // === Interpolation Errors ===
    #[error("Invalid sample table: {0}")]
    InvalidSamples(String),

    #[error("Gaussian process fit failed for category '{category}': {reason}")]
    Fit { category: String, reason: String },

    #[error("Invalid plot options: {0}")]
    InvalidOptions(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    Render(String),
}

impl AtlasError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AtlasError::Io {
            path: path.into(),
            source,
        }
    }
}
