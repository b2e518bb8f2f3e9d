//! Maps boundary specs to local GeoJSON files, downloading on first use.

use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::models::BoundarySpec;

/// Resolves [`BoundarySpec`]s to local files under a cache root.
///
/// Lookup order is the read-only pre-existing root, then the writable
/// cache root, then a download into the cache root. Downloads are written
/// to a temporary file in the target directory and renamed into place, so
/// the final path never holds a partial document.
pub struct BoundaryResolver {
    client: Client,
    data_dir: PathBuf,
    pre_existing_data_dir: Option<PathBuf>,
    url_template: String,
    land_mask: Option<PathBuf>,
    land_mask_url: String,
}

#[derive(Debug, Error)]
enum FetchFailure {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
}

impl BoundaryResolver {
    pub fn new(config: &AtlasConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(AtlasError::Client)?;

        Ok(Self {
            client,
            data_dir: config.data_dir.clone(),
            pre_existing_data_dir: config.pre_existing_data_dir.clone(),
            url_template: config.url_template.clone(),
            land_mask: config.land_mask.clone(),
            land_mask_url: config.land_mask_url.clone(),
        })
    }

    /// Path of a boundary document relative to a data root
    pub fn relative_path(spec: &BoundarySpec) -> PathBuf {
        Path::new("shapefiles")
            .join("datav_geoatlas")
            .join(spec.version.segment())
            .join(format!(
                "geoatlas_{}{}.json",
                spec.adcode,
                spec.full_suffix()
            ))
    }

    /// Path of the downloaded land polygons relative to a data root
    pub fn land_mask_relative_path() -> PathBuf {
        Path::new("shapefiles")
            .join("natural_earth")
            .join("physical")
            .join("ne_110m_land.geojson")
    }

    /// Location in the writable cache root
    pub fn target_path(&self, spec: &BoundarySpec) -> PathBuf {
        self.data_dir.join(Self::relative_path(spec))
    }

    /// Location in the read-only root, if one is configured
    pub fn pre_existing_path(&self, spec: &BoundarySpec) -> Option<PathBuf> {
        self.pre_existing_data_dir
            .as_ref()
            .map(|root| root.join(Self::relative_path(spec)))
    }

    /// Remote URL of the boundary document
    pub fn url(&self, spec: &BoundarySpec) -> Result<Url> {
        spec.version.check()?;
        let raw = self
            .url_template
            .replace("{version}", &spec.version.segment())
            .replace("{adcode}", &spec.adcode.to_string())
            .replace("{full}", spec.full_suffix());

        Url::parse(&raw).map_err(|e| AtlasError::UrlTemplate(format!("{}: {}", raw, e)))
    }

    /// Whether resolving `spec` would be served from disk
    pub fn is_cached(&self, spec: &BoundarySpec) -> bool {
        spec.version.check().is_ok() && self.local_path(&Self::relative_path(spec)).is_some()
    }

    fn local_path(&self, relative: &Path) -> Option<PathBuf> {
        self.pre_existing_data_dir
            .iter()
            .map(|root| root.join(relative))
            .chain(std::iter::once(self.data_dir.join(relative)))
            .find(|p| p.is_file())
    }

    /// Return a local path for `spec`, downloading it if no copy exists.
    #[instrument(skip_all, fields(spec = %spec))]
    pub async fn resolve(&self, spec: &BoundarySpec) -> Result<PathBuf> {
        spec.version.check()?;
        if let Some(path) = self.local_path(&Self::relative_path(spec)) {
            debug!(path = %path.display(), "Boundary already on disk");
            return Ok(path);
        }

        let url = self.url(spec)?;
        let target = self.target_path(spec);

        info!(url = %url, "Downloading boundary");
        let body = self.fetch(&url).await.map_err(|failure| match failure {
            FetchFailure::Transport(source) => AtlasError::Download {
                spec: spec.clone(),
                url: url.to_string(),
                source,
            },
            FetchFailure::Status(status) => AtlasError::HttpStatus {
                spec: spec.clone(),
                url: url.to_string(),
                status,
            },
        })?;

        self.save(&target, body).await?;
        Ok(target)
    }

    /// Local land polygons for the default clip mask, downloaded on first use.
    ///
    /// A configured `land_mask` file is used as is. Otherwise the lookup
    /// order of [`resolve`](Self::resolve) applies under
    /// [`land_mask_relative_path`](Self::land_mask_relative_path).
    #[instrument(skip_all)]
    pub async fn resolve_land_mask(&self) -> Result<PathBuf> {
        if let Some(path) = &self.land_mask {
            return Ok(path.clone());
        }

        let relative = Self::land_mask_relative_path();
        if let Some(path) = self.local_path(&relative) {
            debug!(path = %path.display(), "Land mask already on disk");
            return Ok(path);
        }

        let url = Url::parse(&self.land_mask_url)
            .map_err(|e| AtlasError::UrlTemplate(format!("{}: {}", self.land_mask_url, e)))?;
        let target = self.data_dir.join(relative);

        info!(url = %url, "Downloading land mask");
        let body = self
            .fetch(&url)
            .await
            .map_err(|failure| AtlasError::LandMask {
                url: url.to_string(),
                reason: failure.to_string(),
            })?;

        self.save(&target, body).await?;
        Ok(target)
    }

    /// Remove the cached copy of `spec` from the writable root.
    ///
    /// The pre-existing root is never touched. Returns whether a file was removed.
    pub fn evict(&self, spec: &BoundarySpec) -> Result<bool> {
        spec.version.check()?;
        let target = self.target_path(spec);
        match std::fs::remove_file(&target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AtlasError::io(target, e)),
        }
    }

    async fn fetch(&self, url: &Url) -> std::result::Result<Vec<u8>, FetchFailure> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    async fn save(&self, target: &Path, body: Vec<u8>) -> Result<()> {
        let bytes = body.len();
        let write_target = target.to_path_buf();
        tokio::task::spawn_blocking(move || persist_atomic(&write_target, &body))
            .await
            .map_err(|e| AtlasError::io(target, std::io::Error::other(e)))??;

        info!(path = %target.display(), bytes, "Saved download");
        Ok(())
    }
}

fn persist_atomic(target: &Path, body: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| AtlasError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".geoatlas-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(|e| AtlasError::io(dir, e))?;
    tmp.write_all(body)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AtlasError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| AtlasError::io(target, e.error))?;
    Ok(())
}
