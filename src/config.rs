use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AtlasError, Result};

/// Remote location of the DataV.GeoAtlas boundary documents.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://geo.datav.aliyun.com/{version}/bound/{adcode}{full}.json";

/// Natural Earth 1:110m land polygons, the default clip mask.
pub const DEFAULT_LAND_MASK_URL: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_110m_land.geojson";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AtlasConfig {
    /// Writable cache root for downloaded boundaries
    pub data_dir: PathBuf,
    /// Read-only root (e.g. vendored data) checked before `data_dir`
    pub pre_existing_data_dir: Option<PathBuf>,
    pub url_template: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Local GeoJSON land polygons, used instead of downloading `land_mask_url`
    pub land_mask: Option<PathBuf>,
    /// Source of the default land clip mask
    pub land_mask_url: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pre_existing_data_dir: None,
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            timeout_secs: 60,
            user_agent: format!("geoatlas/{}", env!("CARGO_PKG_VERSION")),
            land_mask: None,
            land_mask_url: DEFAULT_LAND_MASK_URL.to_string(),
        }
    }
}

impl AtlasConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| AtlasError::io(path, e))?;
        toml::from_str(&content).map_err(|e| AtlasError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("geoatlas");
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("geoatlas");
    }
    PathBuf::from("geoatlas-data")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "data_dir = \"/srv/atlas\"\ntimeout_secs = 5").unwrap();

        let config = AtlasConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/atlas"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.url_template, DEFAULT_URL_TEMPLATE);
        assert!(config.pre_existing_data_dir.is_none());
        assert_eq!(config.land_mask_url, DEFAULT_LAND_MASK_URL);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout_secs = \"soon\"").unwrap();

        let err = AtlasConfig::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, AtlasError::Config { .. }));
    }
}
