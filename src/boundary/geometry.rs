//! GeoJSON boundary document parsing.

use std::fs;
use std::path::Path;

use geo::Geometry;
use geojson::GeoJson;

use crate::error::{AtlasError, Result};

/// Read every feature geometry of a GeoJSON document, in document order.
pub fn read_geometries(path: &Path) -> Result<Vec<Geometry<f64>>> {
    let text = fs::read_to_string(path).map_err(|e| AtlasError::io(path, e))?;
    parse_geometries(&text).map_err(|reason| AtlasError::Parse {
        path: path.to_path_buf(),
        reason,
    })
}

/// Parse a FeatureCollection, Feature or bare Geometry.
///
/// Features without geometry are skipped; geometry collections are flattened.
pub fn parse_geometries(text: &str) -> std::result::Result<Vec<Geometry<f64>>, String> {
    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| e.to_string())?;

    let values = match geojson {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .map(|g| g.value)
            .collect(),
        GeoJson::Feature(f) => f.geometry.map(|g| g.value).into_iter().collect(),
        GeoJson::Geometry(g) => vec![g.value],
    };

    let mut geometries = Vec::with_capacity(values.len());
    for value in values {
        let geometry: Geometry<f64> = value
            .try_into()
            .map_err(|e: geojson::Error| format!("Failed to convert geometry: {}", e))?;
        flatten_into(geometry, &mut geometries);
    }

    Ok(geometries)
}

fn flatten_into(geometry: Geometry<f64>, out: &mut Vec<Geometry<f64>>) {
    match geometry {
        Geometry::GeometryCollection(gc) => {
            for inner in gc {
                flatten_into(inner, out);
            }
        }
        other => out.push(other),
    }
}
