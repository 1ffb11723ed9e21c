use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for the picker. Every field can be overridden from an
/// `S2GRID_*` environment variable, see [`Config::from_env`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Below this zoom the grid is not drawn at all.
    pub min_zoom: f64,
    /// Upper bound on features handed to the renderer per viewport.
    pub max_features: usize,
    /// Quiet period before a viewport change triggers recomputation.
    pub debounce_ms: u64,
    /// How long clicks are ignored after a rectangle drag ends.
    pub click_suppression_ms: u64,
    /// Lifetime of a transient feedback message.
    pub feedback_ttl_ms: u64,
    /// Pixel padding used when fitting the map to a restored selection.
    pub fit_padding: u32,
    /// Zoom level used when jumping to a searched grid.
    pub search_zoom: f64,
    /// Prefix for export filenames.
    pub export_basename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_zoom: 5.0,
            max_features: 4000,
            debounce_ms: 150,
            click_suppression_ms: 250,
            feedback_ttl_ms: 3000,
            fit_padding: 24,
            search_zoom: 9.0,
            export_basename: "s2-grids".to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by whatever `S2GRID_*` variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            min_zoom: parse_var(&lookup, "S2GRID_MIN_ZOOM", defaults.min_zoom),
            max_features: parse_var(&lookup, "S2GRID_MAX_FEATURES", defaults.max_features),
            debounce_ms: parse_var(&lookup, "S2GRID_DEBOUNCE_MS", defaults.debounce_ms),
            click_suppression_ms: parse_var(
                &lookup,
                "S2GRID_CLICK_SUPPRESSION_MS",
                defaults.click_suppression_ms,
            ),
            feedback_ttl_ms: parse_var(&lookup, "S2GRID_FEEDBACK_TTL_MS", defaults.feedback_ttl_ms),
            fit_padding: parse_var(&lookup, "S2GRID_FIT_PADDING", defaults.fit_padding),
            search_zoom: parse_var(&lookup, "S2GRID_SEARCH_ZOOM", defaults.search_zoom),
            export_basename: lookup("S2GRID_EXPORT_BASENAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.export_basename),
        }
    }
}

fn parse_var<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "ignoring unparseable environment override");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_overrides_yields_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup(&[
            ("S2GRID_MIN_ZOOM", "3.5"),
            ("S2GRID_MAX_FEATURES", "10"),
            ("S2GRID_EXPORT_BASENAME", "tiles"),
        ]));
        assert_eq!(cfg.min_zoom, 3.5);
        assert_eq!(cfg.max_features, 10);
        assert_eq!(cfg.export_basename, "tiles");
        assert_eq!(cfg.debounce_ms, 150);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let cfg = Config::from_lookup(lookup(&[("S2GRID_DEBOUNCE_MS", "soon")]));
        assert_eq!(cfg.debounce_ms, Config::default().debounce_ms);
    }
}
