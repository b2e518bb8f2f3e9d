//! Memoized boundary geometries keyed by [`BoundarySpec`].

use std::sync::{Arc, Mutex, PoisonError};

use geo::Geometry;
use hashbrown::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::geometry::read_geometries;
use super::resolver::BoundaryResolver;
use crate::error::{AtlasError, Result};
use crate::models::BoundarySpec;

/// Parsed geometries of one boundary document, shared read-only.
pub type CachedGeometrySet = Arc<[Geometry<f64>]>;

/// Eviction-free geometry cache in front of a [`BoundaryResolver`].
///
/// Each spec gets its own once-cell, so concurrent requests for one spec
/// share a single download and parse while other specs proceed
/// independently. A failed load leaves the cell empty and the next request
/// starts over.
pub struct GeometryCache {
    resolver: BoundaryResolver,
    entries: Mutex<HashMap<BoundarySpec, Arc<OnceCell<CachedGeometrySet>>>>,
}

impl GeometryCache {
    pub fn new(resolver: BoundaryResolver) -> Self {
        Self {
            resolver,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &BoundaryResolver {
        &self.resolver
    }

    /// Geometries for `spec`, loading them on first request
    pub async fn geometries(&self, spec: &BoundarySpec) -> Result<CachedGeometrySet> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(entries.entry(spec.clone()).or_default())
        };

        if let Some(set) = cell.get() {
            debug!(spec = %spec, "Geometry cache hit");
            return Ok(Arc::clone(set));
        }

        let set = cell.get_or_try_init(|| self.load(spec)).await?;
        Ok(Arc::clone(set))
    }

    async fn load(&self, spec: &BoundarySpec) -> Result<CachedGeometrySet> {
        let path = self.resolver.resolve(spec).await?;

        let read_path = path.clone();
        let parsed = tokio::task::spawn_blocking(move || read_geometries(&read_path))
            .await
            .map_err(|e| AtlasError::io(&path, std::io::Error::other(e)))?;

        match parsed {
            Ok(geometries) => {
                info!(
                    spec = %spec,
                    count = geometries.len(),
                    "Loaded boundary geometries"
                );
                Ok(Arc::from(geometries))
            }
            Err(e) => {
                // a corrupt download must not pin the spec to a bad file
                if path == self.resolver.target_path(spec) {
                    warn!(spec = %spec, path = %path.display(), "Removing unparsable boundary");
                    return Err(parse_failure(spec, e, self.resolver.evict(spec)));
                }
                Err(e)
            }
        }
    }

    /// Whether geometries for `spec` are loaded
    pub fn contains(&self, spec: &BoundarySpec) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(spec)
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    /// Number of loaded specs
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The parse error wins over a failed removal of the bad file
fn parse_failure(spec: &BoundarySpec, error: AtlasError, evicted: Result<bool>) -> AtlasError {
    if let Err(evict_error) = evicted {
        warn!(spec = %spec, error = %evict_error, "Failed to remove unparsable boundary");
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtlasConfig;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ONE: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}
    ]}"#;
    const TWO: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
        {"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[2,2],[3,2],[3,3],[2,2]]]}}
    ]}"#;

    fn cache_for(server: &MockServer, dir: &TempDir) -> GeometryCache {
        let config = AtlasConfig {
            data_dir: dir.path().to_path_buf(),
            url_template: format!("{}/{{version}}/bound/{{adcode}}{{full}}.json", server.uri()),
            ..AtlasConfig::default()
        };
        GeometryCache::new(BoundaryResolver::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_second_request_is_a_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/areas_v3/bound/650000.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = cache_for(&server, &dir);
        let spec = BoundarySpec::new(3, 650000, false);

        let first = cache.geometries(&spec).await.unwrap();
        let second = cache.geometries(&spec).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains(&spec));
        // the alias names the same entry
        assert!(cache.contains(&BoundarySpec::new("areas_v3", 650000, false)));
    }

    #[tokio::test]
    async fn test_full_flag_is_part_of_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/areas_v3/bound/100000.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/areas_v3/bound/100000_full.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(TWO))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = cache_for(&server, &dir);

        let plain = cache
            .geometries(&BoundarySpec::new(3, 100000, false))
            .await
            .unwrap();
        let full = cache
            .geometries(&BoundarySpec::new(3, 100000, true))
            .await
            .unwrap();

        assert_eq!(plain.len(), 1);
        assert_eq!(full.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(TWO)
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = Arc::new(cache_for(&server, &dir));
        let spec = BoundarySpec::new(3, 659002, false);

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let spec = spec.clone();
                tokio::spawn(async move { cache.geometries(&spec).await })
            })
            .collect();

        let mut sets = Vec::new();
        for task in tasks {
            sets.push(task.await.unwrap().unwrap());
        }
        assert!(sets.iter().all(|s| Arc::ptr_eq(s, &sets[0])));
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ONE))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let cache = cache_for(&server, &dir);
        let spec = BoundarySpec::new(3, 652900, false);

        let err = cache.geometries(&spec).await.unwrap_err();
        assert!(matches!(err, AtlasError::Parse { .. }));
        assert!(!cache.contains(&spec));
        assert!(!cache.resolver().is_cached(&spec));

        let geoms = cache.geometries(&spec).await.unwrap();
        assert_eq!(geoms.len(), 1);
        assert!(cache.contains(&spec));
    }

    #[test]
    fn test_failed_eviction_keeps_parse_error() {
        let spec = BoundarySpec::new(3, 652900, false);
        let parse = AtlasError::Parse {
            path: "geoatlas_652900.json".into(),
            reason: "expected value".to_string(),
        };
        let denied = Err(AtlasError::io(
            "geoatlas_652900.json",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        ));

        let err = parse_failure(&spec, parse, denied);
        match err {
            AtlasError::Parse { reason, .. } => assert_eq!(reason, "expected value"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
