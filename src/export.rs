use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::info;

use crate::error::{Error, Result};
use crate::selection::SelectionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Geojson,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Geojson => "geojson",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Geojson => "application/geo+json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

/// A file ready to hand to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub filename: String,
    pub mime: &'static str,
    pub body: String,
}

/// `<base>-selection-<timestamp>.<ext>`, with `:` and `T` of the ISO
/// timestamp turned into `-`.
pub fn export_filename(base: &str, format: ExportFormat, now: DateTime<Utc>) -> String {
    let stamp = now
        .to_rfc3339_opts(SecondsFormat::Secs, true)
        .replace([':', 'T'], "-");
    format!("{base}-selection-{stamp}.{}", format.extension())
}

/// The selected features as a pretty-printed FeatureCollection, geometry
/// and properties exactly as loaded.
pub fn to_geojson(store: &SelectionStore) -> Result<String> {
    let features: Vec<Value> = store
        .sorted_entries()
        .into_iter()
        .map(|entry| {
            json!({
                "type": "Feature",
                "properties": entry.feature.properties.clone(),
                "geometry": entry.feature.raw_geometry.clone(),
            })
        })
        .collect();
    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    serde_json::to_string_pretty(&collection).map_err(|e| Error::Export(e.to_string()))
}

/// Quotes a CSV field when it contains a comma, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// One row per selected grid, sorted by name. Property columns are the
/// sorted union of every property key except case variants of `name`.
pub fn to_csv(store: &SelectionStore) -> String {
    let entries = store.sorted_entries();
    let keys: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.feature.properties.keys())
        .map(String::as_str)
        .filter(|k| !k.eq_ignore_ascii_case("name"))
        .collect();

    let mut header = vec![
        "name".to_string(),
        "centroid_lat".to_string(),
        "centroid_lng".to_string(),
    ];
    header.extend(keys.iter().map(|k| k.to_string()));

    let mut lines = vec![
        header
            .iter()
            .map(|h| escape_csv(h))
            .collect::<Vec<_>>()
            .join(","),
    ];
    for entry in &entries {
        let (lat, lng) = match entry.centroid.filter(|c| c.is_finite()) {
            Some(c) => (format!("{:.6}", c.lat), format!("{:.6}", c.lng)),
            None => (String::new(), String::new()),
        };
        let mut row = vec![entry.name.clone(), lat, lng];
        row.extend(keys.iter().map(|k| cell(entry.feature.properties.get(*k))));
        lines.push(row.iter().map(|f| escape_csv(f)).collect::<Vec<_>>().join(","));
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Serializes the selection. An empty selection is an error the caller
/// reports as transient feedback.
pub fn export_selection(
    store: &SelectionStore,
    format: ExportFormat,
    basename: &str,
    now: DateTime<Utc>,
) -> Result<Download> {
    if store.is_empty() {
        return Err(Error::EmptySelection);
    }
    let body = match format {
        ExportFormat::Geojson => to_geojson(store)?,
        ExportFormat::Csv => to_csv(store),
    };
    Ok(Download {
        filename: export_filename(basename, format, now),
        mime: format.mime(),
        body,
    })
}

/// Writes a download into `dir`, returning the file's path.
pub fn write_download(dir: &Path, download: &Download) -> Result<PathBuf> {
    let path = dir.join(&download.filename);
    std::fs::write(&path, &download.body)
        .map_err(|e| Error::Export(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), bytes = download.body.len(), "selection exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::sample;
    use crate::grid::GridFeature;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::Map;
    use std::sync::Arc;

    fn store_with(names: &[&str]) -> SelectionStore {
        let grid = sample();
        let mut store = SelectionStore::new();
        store.add_all(&grid.resolve(names.iter().copied()));
        store
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 9).unwrap()
    }

    #[test]
    fn filename_strips_colons_and_t() {
        assert_eq!(
            export_filename("s2-grids", ExportFormat::Csv, at()),
            "s2-grids-selection-2026-10-19-08-05-09Z.csv"
        );
    }

    #[test]
    fn csv_header_is_sorted_union_without_name_variants() {
        let store = store_with(&["33UVP", "31UES", "31UDS"]);
        let csv = to_csv(&store);
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "name,centroid_lat,centroid_lng,epsg,land,meta,note,utm_zone"
        );

        // same header whichever order the grids were picked in
        let reversed = store_with(&["31UDS", "31UES", "33UVP"]);
        assert_eq!(to_csv(&reversed).lines().next().unwrap(), header);
    }

    #[test]
    fn csv_rows_escape_and_format() {
        let store = store_with(&["33UVP", "31UES"]);
        let csv = to_csv(&store);
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(
            rows,
            vec![
                "31UES,49.000000,2.100000,,true,\"{\"\"source\"\":\"\"esa\"\"}\",,31",
                "33UVP,48.400000,13.600000,32633,,,\"alps, \"\"east\"\"\",",
            ]
        );
    }

    #[test]
    fn csv_missing_centroid_leaves_fields_empty() {
        let feature = GridFeature::new(
            "hollow",
            json!({"type": "Polygon", "coordinates": []}),
            Map::new(),
        )
        .unwrap();
        let mut store = SelectionStore::new();
        store.add_all(&[Arc::new(feature)]);
        assert_eq!(to_csv(&store), "name,centroid_lat,centroid_lng\nHOLLOW,,\n");
    }

    #[test]
    fn geojson_keeps_original_geometry_and_properties() {
        let store = store_with(&["60CWT"]);
        let text = to_geojson(&store).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "FeatureCollection");
        let feature = &parsed["features"][0];
        assert_eq!(feature["geometry"]["type"], "MultiPolygon");
        assert_eq!(feature["properties"]["name"], "60CWT");
        assert_eq!(feature["properties"]["epsg"], 32760);
        assert!(text.contains('\n'));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let store = SelectionStore::new();
        assert!(matches!(
            export_selection(&store, ExportFormat::Geojson, "x", at()),
            Err(Error::EmptySelection)
        ));
    }

    #[test]
    fn writes_download_to_dir() {
        let store = store_with(&["31UDS"]);
        let download = export_selection(&store, ExportFormat::Csv, "tiles", at()).unwrap();
        assert_eq!(download.mime, "text/csv");
        let dir = tempfile::tempdir().unwrap();
        let path = write_download(dir.path(), &download).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), download.body);
    }
}
