use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geo::{self, GeoBounds};
use crate::grid::GridFeature;
use crate::wrap;

/// What the map currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(north: f64, south: f64, east: f64, west: f64, zoom: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
            zoom,
        }
    }

    pub fn bounds(&self) -> GeoBounds {
        GeoBounds::new(self.south, self.west, self.north, self.east)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityOptions {
    pub min_zoom: f64,
    pub max_features: usize,
}

/// Result of a visibility query.
#[derive(Debug, Clone, Default)]
pub struct Visible {
    pub features: Vec<Arc<GridFeature>>,
    /// True when the render cap cut the list short.
    pub truncated: bool,
}

impl Visible {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// True if any outer ring of `feature` has a bounding box overlapping any of `boxes`.
pub fn intersects_any(feature: &GridFeature, boxes: &[GeoBounds]) -> bool {
    feature
        .geometry
        .outer_rings()
        .any(|ring| boxes.iter().any(|b| geo::bounding_box_intersects(ring, b)))
}

/// Features to draw for `viewport`, in dataset order. Empty below the
/// minimum zoom; truncated, not rejected, beyond the render cap.
pub fn visible_features(
    features: &[Arc<GridFeature>],
    viewport: &Viewport,
    opts: VisibilityOptions,
) -> Visible {
    if viewport.zoom < opts.min_zoom {
        debug!(zoom = viewport.zoom, min_zoom = opts.min_zoom, "zoomed out past grid threshold");
        return Visible::default();
    }

    let boxes = wrap::wrapped_bounds(&viewport.bounds());
    let mut out = Visible::default();
    for feature in features {
        if !intersects_any(feature, &boxes) {
            continue;
        }
        if out.features.len() == opts.max_features {
            out.truncated = true;
            break;
        }
        out.features.push(Arc::clone(feature));
    }
    debug!(
        visible = out.features.len(),
        truncated = out.truncated,
        "visibility recomputed"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::sample;
    use serde_json::{Map, json};

    fn names(v: &Visible) -> Vec<&str> {
        v.features.iter().map(|f| f.name.as_str()).collect()
    }

    const OPTS: VisibilityOptions = VisibilityOptions {
        min_zoom: 5.0,
        max_features: 100,
    };

    #[test]
    fn antimeridian_viewport_sees_straddling_tiles() {
        let grid = sample();
        let vp = Viewport::new(-70.0, -76.0, -170.0, 170.0, 6.0);
        let got = visible_features(grid.features(), &vp, OPTS);
        assert!(names(&got).contains(&"60CWT"));
        assert!(names(&got).contains(&"60CWU"));
        assert!(!names(&got).contains(&"31UDS"));
    }

    #[test]
    fn antimeridian_viewport_skips_tiles_elsewhere_in_the_band() {
        let far = GridFeature::new(
            "FAR",
            json!({"type": "Polygon", "coordinates": [[[0, -73], [1, -73], [1, -72], [0, -72], [0, -73]]]}),
            Map::new(),
        )
        .unwrap();
        let mut features = sample().features().to_vec();
        features.push(Arc::new(far));

        let vp = Viewport::new(-70.0, -76.0, -170.0, 170.0, 6.0);
        let got = visible_features(&features, &vp, OPTS);
        assert_eq!(names(&got), vec!["60CWT", "60CWU"]);
    }

    #[test]
    fn world_copy_viewport_sees_wrapped_tiles() {
        let grid = sample();
        // One world to the east: 01CCV lives at -179..-178.
        let vp = Viewport::new(-79.0, -80.5, 182.5, 180.5, 8.0);
        let got = visible_features(grid.features(), &vp, OPTS);
        assert!(names(&got).contains(&"01CCV"));
    }

    #[test]
    fn below_min_zoom_is_empty() {
        let grid = sample();
        let vp = Viewport::new(90.0, -90.0, 180.0, -180.0, 2.0);
        assert!(visible_features(grid.features(), &vp, OPTS).is_empty());
    }

    #[test]
    fn render_cap_truncates() {
        let grid = sample();
        let vp = Viewport::new(90.0, -90.0, 180.0, -180.0, 10.0);
        let capped = visible_features(
            grid.features(),
            &vp,
            VisibilityOptions {
                min_zoom: 0.0,
                max_features: 2,
            },
        );
        assert_eq!(capped.features.len(), 2);
        assert!(capped.truncated);

        let all = visible_features(grid.features(), &vp, OPTS);
        assert_eq!(all.features.len(), grid.len());
        assert!(!all.truncated);
    }
}
