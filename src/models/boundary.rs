//! Identification of DataV.GeoAtlas boundary documents.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Dataset version, either a short numeric alias or an explicit name.
///
/// `2` and `3` are aliases for `areas_v2` and `areas_v3`. Equality and
/// hashing use the normalized segment, so an alias and its name are the
/// same version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Version {
    Numeric(u32),
    Named(String),
}

impl Version {
    /// URL/path segment for this version
    pub fn segment(&self) -> String {
        match self {
            Version::Numeric(n @ (2 | 3)) => format!("areas_v{}", n),
            Version::Numeric(n) => n.to_string(),
            Version::Named(name) => name.clone(),
        }
    }

    /// Reject names that cannot be a single path and URL segment
    pub fn check(&self) -> Result<()> {
        match self {
            Version::Named(name)
                if name.is_empty()
                    || name == "."
                    || name.contains("..")
                    || name.contains(['/', '\\', '?', '#']) =>
            {
                Err(AtlasError::InvalidVersion(name.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::Numeric(3)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segment() == other.segment()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segment().hash(state);
    }
}

impl From<u32> for Version {
    fn from(n: u32) -> Self {
        Version::Numeric(n)
    }
}

impl From<&str> for Version {
    fn from(name: &str) -> Self {
        Version::Named(name.to_string())
    }
}

impl From<String> for Version {
    fn from(name: String) -> Self {
        Version::Named(name)
    }
}

impl FromStr for Version {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let version = match s.parse::<u32>() {
            Ok(n) => Version::Numeric(n),
            Err(_) => Version::Named(s.to_string()),
        };
        version.check()?;
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment())
    }
}

/// One remote boundary document: (version, area code, full flag).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundarySpec {
    pub version: Version,
    pub adcode: u32,
    /// Include the subregions of the area
    pub full: bool,
}

impl BoundarySpec {
    pub fn new(version: impl Into<Version>, adcode: u32, full: bool) -> Self {
        Self {
            version: version.into(),
            adcode,
            full,
        }
    }

    /// Filename suffix token (`_full` or empty)
    pub fn full_suffix(&self) -> &'static str {
        if self.full {
            "_full"
        } else {
            ""
        }
    }
}

impl Default for BoundarySpec {
    /// National boundary of the current dataset
    fn default() -> Self {
        Self::new(3, 100000, false)
    }
}

impl fmt::Display for BoundarySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}{}",
            self.version.segment(),
            self.adcode,
            self.full_suffix()
        )
    }
}
