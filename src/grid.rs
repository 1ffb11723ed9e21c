use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::fetch;
use crate::geo::{self, GeoBounds, Geometry, LatLng};

/// Property keys checked, in order, for a feature's grid name.
const NAME_KEYS: [&str; 5] = ["name", "Name", "title", "TITLE", "id"];
const FALLBACK_NAME: &str = "Grid";

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Value>,
}

/// One tile of the grid. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFeature {
    /// Name as it appears in the dataset.
    pub name: String,
    pub geometry: Geometry,
    /// The GeoJSON geometry exactly as loaded, used for export.
    pub raw_geometry: Value,
    pub properties: Map<String, Value>,
}

impl GridFeature {
    /// Builds a feature from a GeoJSON geometry value. Returns `None` unless
    /// the geometry is a Polygon or MultiPolygon.
    pub fn new(name: impl Into<String>, raw_geometry: Value, properties: Map<String, Value>) -> Option<Self> {
        let geometry = Geometry::from_value(&raw_geometry)?;
        if !geometry.is_polygonal() {
            return None;
        }
        Some(Self {
            name: name.into(),
            geometry,
            raw_geometry,
            properties,
        })
    }

    /// Identity of the feature: its uppercased name.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn centroid(&self) -> Option<LatLng> {
        geo::centroid(&self.geometry)
    }

    pub fn contains(&self, point: LatLng) -> bool {
        geo::geometry_contains(&self.geometry, point)
    }

    /// Full extent of the feature, falling back to its centroid when the
    /// geometry has no usable vertex.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut b = GeoBounds::empty();
        if geo::accumulate_bounds(&mut b, &self.geometry) {
            return Some(b);
        }
        let c = self.centroid()?;
        b.extend(c.lng, c.lat);
        Some(b)
    }
}

/// Canonical form of a grid name: trimmed and uppercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Resolves a feature's display name from its properties.
pub fn resolve_name(properties: &Map<String, Value>) -> String {
    NAME_KEYS
        .iter()
        .filter_map(|key| properties.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

/// The loaded grid with a case-insensitive name index. At most one feature
/// per uppercased name.
#[derive(Debug, Clone, Default)]
pub struct GridIndex {
    features: Vec<Arc<GridFeature>>,
    by_name: HashMap<String, usize>,
}

impl GridIndex {
    /// Builds the index, keeping the first feature seen for each name.
    pub fn from_features(features: impl IntoIterator<Item = GridFeature>) -> Self {
        let mut index = Self::default();
        for feature in features {
            match index.by_name.entry(feature.key()) {
                Entry::Occupied(e) => {
                    warn!(name = %feature.name, kept = %index.features[*e.get()].name, "dropping duplicate grid name");
                }
                Entry::Vacant(e) => {
                    e.insert(index.features.len());
                    index.features.push(Arc::new(feature));
                }
            }
        }
        index
    }

    /// Parses a GeoJSON FeatureCollection. Non-polygonal features are skipped.
    pub fn from_geojson(geojson: &str) -> Result<Self> {
        let fc: FeatureCollection = serde_json::from_str(geojson)?;
        let total = fc.features.len();
        let features = fc.features.into_iter().filter_map(|f| {
            let properties = f.properties.unwrap_or_default();
            let name = resolve_name(&properties);
            let feature = f
                .geometry
                .and_then(|raw| GridFeature::new(name.clone(), raw, properties));
            if feature.is_none() {
                debug!(%name, "skipping feature without polygon geometry");
            }
            feature
        });
        let index = Self::from_features(features);
        info!(loaded = index.len(), total, "grid dataset parsed");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[Arc<GridFeature>] {
        &self.features
    }

    /// Case-insensitive exact lookup.
    pub fn find(&self, name: &str) -> Option<&Arc<GridFeature>> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&idx| &self.features[idx])
    }

    /// Names starting with `prefix` (case-insensitive), sorted, at most `limit`.
    pub fn search(&self, prefix: &str, limit: usize) -> Vec<&Arc<GridFeature>> {
        let prefix = normalize_name(prefix);
        if prefix.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(&String, usize)> = self
            .by_name
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, &idx)| (key, idx))
            .collect();
        hits.sort_unstable();
        hits.into_iter()
            .take(limit)
            .map(|(_, idx)| &self.features[idx])
            .collect()
    }

    /// Looks up every name, silently dropping the ones that are unknown.
    pub fn resolve<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<Arc<GridFeature>> {
        names
            .into_iter()
            .filter_map(|name| {
                let hit = self.find(name).cloned();
                if hit.is_none() {
                    warn!(name, "grid name not found in dataset");
                }
                hit
            })
            .collect()
    }
}

/// Loads the grid dataset from a path or URL. Failure here is fatal to the UI.
pub fn load_grid(source: &str) -> Result<GridIndex> {
    info!(source, "loading grid dataset");
    let text = fetch::read_source(source)?;
    GridIndex::from_geojson(&text)
}

/// Areas without satellite coverage, drawn as a supplementary layer.
#[derive(Debug, Clone, Default)]
pub struct CoverageOverlay {
    pub geometries: Vec<Geometry>,
}

impl CoverageOverlay {
    pub fn from_geojson(geojson: &str) -> Result<Self> {
        let fc: FeatureCollection = serde_json::from_str(geojson)?;
        let geometries = fc
            .features
            .into_iter()
            .filter_map(|f| f.geometry.as_ref().and_then(Geometry::from_value))
            .collect();
        Ok(Self { geometries })
    }
}

/// Loads the no-coverage overlay. Any failure is logged and swallowed.
pub fn load_overlay(source: &str) -> Option<CoverageOverlay> {
    let loaded = fetch::read_source(source).and_then(|text| CoverageOverlay::from_geojson(&text));
    match loaded {
        Ok(overlay) => {
            info!(source, parts = overlay.geometries.len(), "coverage overlay loaded");
            Some(overlay)
        }
        Err(err) => {
            warn!(source, %err, "coverage overlay unavailable");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) static SAMPLE: &str = include_str!("../data/sample-grid.geojson");

    pub(crate) fn sample() -> GridIndex {
        GridIndex::from_geojson(SAMPLE).expect("sample grid parses")
    }

    #[test]
    fn name_resolution_order() {
        let props = |v: Value| v.as_object().cloned().unwrap();
        assert_eq!(resolve_name(&props(json!({"Name": "b", "name": "a"}))), "a");
        assert_eq!(resolve_name(&props(json!({"TITLE": "t", "id": 7}))), "t");
        assert_eq!(resolve_name(&props(json!({"id": 7}))), "7");
        assert_eq!(resolve_name(&props(json!({"name": "  ", "title": "x"}))), "x");
        assert_eq!(resolve_name(&props(json!({"other": 1}))), "Grid");
    }

    #[test]
    fn sample_is_deduplicated_case_insensitively() {
        let grid = sample();
        let keys: Vec<String> = grid.features().iter().map(|f| f.key()).collect();
        let mut unique = keys.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(keys.len(), unique.len());
        // the lowercase duplicate comes second in the file and is dropped
        assert_eq!(grid.find("31uds").unwrap().name, "31UDS");
    }

    #[test]
    fn skips_non_polygon_features() {
        let grid = GridIndex::from_geojson(
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"name":"P"},"geometry":{"type":"Point","coordinates":[0,0]}},
                {"type":"Feature","properties":{"name":"N"},"geometry":null},
                {"type":"Feature","properties":{"name":"Q"},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(grid.len(), 1);
        assert!(grid.find("q").is_some());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            GridIndex::from_geojson("{not json"),
            Err(crate::error::Error::DatasetParse(_))
        ));
    }

    #[test]
    fn prefix_search_is_sorted_and_capped() {
        let grid = sample();
        let names: Vec<&str> = grid.search("01", 10).iter().map(|f| f.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.iter().all(|n| n.starts_with("01")));
        assert_eq!(grid.search("01", 1).len(), 1);
        assert!(grid.search("", 10).is_empty());
    }

    #[test]
    fn resolve_drops_unknown_names() {
        let grid = sample();
        let hits = grid.resolve(["31UDS", "NOPE", "01ccv"]);
        let names: Vec<&str> = hits.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["31UDS", "01CCV"]);
    }

    #[test]
    fn overlay_failure_is_silent() {
        assert!(load_overlay("/no/such/overlay.geojson").is_none());
    }

    #[test]
    fn bounds_cover_all_parts() {
        let grid = sample();
        let f = grid.find("60CWT").unwrap();
        let b = f.bounds().unwrap();
        assert!(b.west < -179.0 && b.east > 179.0);
    }
}
