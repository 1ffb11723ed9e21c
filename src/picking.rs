use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::geo::{GeoBounds, LatLng};
use crate::grid::GridFeature;
use crate::selection::SelectionStore;
use crate::visibility;
use crate::wrap::{self, WORLD_WIDTH};

fn dedup_by_name(features: impl IntoIterator<Item = Arc<GridFeature>>) -> Vec<Arc<GridFeature>> {
    let mut seen = HashSet::new();
    features
        .into_iter()
        .filter(|f| seen.insert(f.key()))
        .collect()
}

/// Every candidate whose polygon contains `point`, in any world copy.
///
/// All matches are returned, not just the topmost one, since tiles overlap
/// along their edges.
pub fn features_at(candidates: &[Arc<GridFeature>], point: LatLng) -> Vec<Arc<GridFeature>> {
    let probes = [
        point,
        LatLng::new(point.lat, point.lng - WORLD_WIDTH),
        LatLng::new(point.lat, point.lng + WORLD_WIDTH),
    ];
    dedup_by_name(
        candidates
            .iter()
            .filter(|f| probes.iter().any(|p| f.contains(*p)))
            .cloned(),
    )
}

/// Every feature whose outer-ring bounding box overlaps `rect`. Features
/// without a usable outer ring are matched by the center of their bounds,
/// which falls back to the centroid.
pub fn features_in_rect(features: &[Arc<GridFeature>], rect: &GeoBounds) -> Vec<Arc<GridFeature>> {
    let boxes = wrap::wrapped_bounds(rect);
    dedup_by_name(
        features
            .iter()
            .filter(|f| {
                let has_ring = f.geometry.outer_rings().any(|ring| !ring.is_empty());
                if has_ring {
                    visibility::intersects_any(f, &boxes)
                } else {
                    f.bounds()
                        .is_some_and(|fb| boxes.iter().any(|b| b.contains(fb.center())))
                }
            })
            .cloned(),
    )
}

/// Applies the result of a rectangle drag: it replaces an empty selection and
/// adds to a non-empty one. A drag never deselects.
pub fn apply_rectangle(store: &mut SelectionStore, hits: &[Arc<GridFeature>]) -> bool {
    if hits.is_empty() {
        return false;
    }
    if store.is_empty() {
        store.replace_all(hits)
    } else {
        store.add_all(hits)
    }
}

/// Live state of one shift-drag gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragGesture {
    pub start: LatLng,
    pub last: LatLng,
    pub has_moved: bool,
    /// Whether the map's own pan-drag was on before the gesture disabled it.
    pub restore_dragging: bool,
}

impl DragGesture {
    pub fn bounds(&self) -> GeoBounds {
        GeoBounds::from_corners(self.start, self.last)
    }
}

/// How a gesture ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragEnd {
    pub restore_dragging: bool,
    /// Rectangle to select from; `None` when the pointer never moved or the
    /// gesture was cancelled.
    pub rect: Option<GeoBounds>,
}

/// Shift-drag rectangle selection: `Idle -> Dragging -> Idle`.
#[derive(Debug, Clone, Default)]
pub struct RectangleSelect {
    gesture: Option<DragGesture>,
}

impl RectangleSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    pub fn gesture(&self) -> Option<&DragGesture> {
        self.gesture.as_ref()
    }

    /// Starts a gesture if the modifier is held and the grid is loaded.
    /// Returns true when the caller must disable map panning.
    pub fn pointer_down(
        &mut self,
        point: LatLng,
        modifier: bool,
        dataset_ready: bool,
        dragging_enabled: bool,
    ) -> bool {
        if !modifier || !dataset_ready || self.gesture.is_some() {
            return false;
        }
        debug!(lat = point.lat, lng = point.lng, "rectangle drag started");
        self.gesture = Some(DragGesture {
            start: point,
            last: point,
            has_moved: false,
            restore_dragging: dragging_enabled,
        });
        true
    }

    /// Tracks the pointer and returns the rectangle to draw.
    pub fn pointer_move(&mut self, point: LatLng) -> Option<GeoBounds> {
        let gesture = self.gesture.as_mut()?;
        gesture.last = point;
        gesture.has_moved = true;
        Some(gesture.bounds())
    }

    /// Ends the gesture. `point` is the release position when known; a
    /// document-level release outside the map passes `None`.
    pub fn pointer_up(&mut self, point: Option<LatLng>) -> Option<DragEnd> {
        let mut gesture = self.gesture.take()?;
        if let Some(p) = point {
            if gesture.has_moved {
                gesture.last = p;
            }
        }
        let rect = gesture.has_moved.then(|| gesture.bounds());
        debug!(moved = gesture.has_moved, "rectangle drag finished");
        Some(DragEnd {
            restore_dragging: gesture.restore_dragging,
            rect,
        })
    }

    pub fn cancel(&mut self) -> Option<DragEnd> {
        let gesture = self.gesture.take()?;
        debug!("rectangle drag cancelled");
        Some(DragEnd {
            restore_dragging: gesture.restore_dragging,
            rect: None,
        })
    }
}
