//! Point-sampled admixture proportions.

use std::fs::File;
use std::path::Path;

use csv::ReaderBuilder;
use geo::{Coord, Rect};
use ndarray::{Array2, ArrayView1};

use crate::error::{AtlasError, Result};

const LON_COLUMNS: &[&str] = &["lon", "longitude", "x"];
const LAT_COLUMNS: &[&str] = &["lat", "latitude", "y"];

/// Sample locations with one proportion per category.
///
/// Proportions are in [0, 1] but need not sum to 1 across a row.
#[derive(Debug, Clone)]
pub struct SampleTable {
    categories: Vec<String>,
    locations: Vec<Coord<f64>>,
    /// rows = samples, columns = categories
    proportions: Array2<f64>,
}

impl SampleTable {
    pub fn new(
        categories: Vec<String>,
        locations: Vec<Coord<f64>>,
        proportions: Array2<f64>,
    ) -> Result<Self> {
        if categories.is_empty() {
            return Err(AtlasError::InvalidSamples("no category columns".into()));
        }
        if locations.is_empty() {
            return Err(AtlasError::InvalidSamples("no sample rows".into()));
        }
        if proportions.dim() != (locations.len(), categories.len()) {
            return Err(AtlasError::InvalidSamples(format!(
                "proportions have shape {:?}, expected ({}, {})",
                proportions.dim(),
                locations.len(),
                categories.len()
            )));
        }
        if let Some(c) = locations.iter().find(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(AtlasError::InvalidSamples(format!(
                "non-finite location ({}, {})",
                c.x, c.y
            )));
        }
        for ((row, col), value) in proportions.indexed_iter() {
            if !(0.0..=1.0).contains(value) {
                return Err(AtlasError::InvalidSamples(format!(
                    "proportion {} for '{}' at row {} is outside [0, 1]",
                    value, categories[col], row
                )));
            }
        }

        Ok(Self {
            categories,
            locations,
            proportions,
        })
    }

    /// Build from `(location, proportions)` rows in category order
    pub fn from_rows(categories: Vec<String>, rows: Vec<(Coord<f64>, Vec<f64>)>) -> Result<Self> {
        let n_cat = categories.len();
        let mut locations = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len() * n_cat);

        for (i, (location, props)) in rows.into_iter().enumerate() {
            if props.len() != n_cat {
                return Err(AtlasError::InvalidSamples(format!(
                    "row {} has {} proportions, expected {}",
                    i,
                    props.len(),
                    n_cat
                )));
            }
            locations.push(location);
            values.extend(props);
        }

        let proportions = Array2::from_shape_vec((locations.len(), n_cat), values)
            .map_err(|e| AtlasError::InvalidSamples(e.to_string()))?;
        Self::new(categories, locations, proportions)
    }

    /// Read a CSV with longitude/latitude columns; every other column is a category.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| AtlasError::io(path, e))?;
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        let parse_err = |reason: String| AtlasError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let headers = rdr.headers().map_err(|e| parse_err(e.to_string()))?.clone();
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };
        let lon_idx = find(LON_COLUMNS)
            .ok_or_else(|| parse_err("missing longitude column (lon/longitude/x)".into()))?;
        let lat_idx = find(LAT_COLUMNS)
            .ok_or_else(|| parse_err("missing latitude column (lat/latitude/y)".into()))?;

        let category_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != lon_idx && *i != lat_idx)
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| parse_err(e.to_string()))?;
            let field = |idx: usize| -> Result<f64> {
                let raw = record.get(idx).unwrap_or("");
                raw.parse::<f64>().map_err(|_| {
                    parse_err(format!(
                        "record {}: '{}' in column '{}' is not a number",
                        line + 1,
                        raw,
                        &headers[idx]
                    ))
                })
            };

            let location = Coord {
                x: field(lon_idx)?,
                y: field(lat_idx)?,
            };
            let props = category_cols
                .iter()
                .map(|(idx, _)| field(*idx))
                .collect::<Result<Vec<f64>>>()?;
            rows.push((location, props));
        }

        let categories = category_cols.into_iter().map(|(_, name)| name).collect();
        Self::from_rows(categories, rows)
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn locations(&self) -> &[Coord<f64>] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Proportions of one category across all samples
    pub fn column(&self, category: usize) -> ArrayView1<'_, f64> {
        self.proportions.column(category)
    }

    /// Proportions of every category at one sample
    pub fn row(&self, sample: usize) -> ArrayView1<'_, f64> {
        self.proportions.row(sample)
    }

    /// Bounding box of the sample locations
    pub fn bounds(&self) -> Rect<f64> {
        let first = self.locations[0];
        let (min, max) = self.locations.iter().fold((first, first), |(min, max), c| {
            (
                Coord {
                    x: min.x.min(c.x),
                    y: min.y.min(c.y),
                },
                Coord {
                    x: max.x.max(c.x),
                    y: max.y.max(c.y),
                },
            )
        });
        Rect::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "K1,lon,lat,K2").unwrap();
        writeln!(file, "0.25, 80.5, 40.1, 0.75").unwrap();
        writeln!(file, "1.0, 81.0, 41.0, 0.0").unwrap();

        let table = SampleTable::from_csv(file.path()).unwrap();
        assert_eq!(table.categories(), &["K1".to_string(), "K2".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.locations()[1], Coord { x: 81.0, y: 41.0 });
        assert_eq!(table.column(1).to_vec(), vec![0.75, 0.0]);
    }

    #[test]
    fn test_csv_missing_latitude() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lon,K1").unwrap();
        writeln!(file, "1.0,0.5").unwrap();

        let err = SampleTable::from_csv(file.path()).unwrap_err();
        assert!(matches!(err, AtlasError::Parse { .. }));
    }

    #[test]
    fn test_out_of_range_proportion() {
        let err = SampleTable::from_rows(
            vec!["K1".into()],
            vec![(Coord { x: 0.0, y: 0.0 }, vec![1.5])],
        )
        .unwrap_err();
        assert!(matches!(err, AtlasError::InvalidSamples(_)));
    }

    #[test]
    fn test_bounds() {
        let table = SampleTable::from_rows(
            vec!["K1".into()],
            vec![
                (Coord { x: 1.0, y: 5.0 }, vec![0.1]),
                (Coord { x: -2.0, y: 7.0 }, vec![0.2]),
            ],
        )
        .unwrap();
        let bounds = table.bounds();
        assert_eq!(bounds.min(), Coord { x: -2.0, y: 5.0 });
        assert_eq!(bounds.max(), Coord { x: 1.0, y: 7.0 });
    }
}
