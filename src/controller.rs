//! The single owner of picker state.
//!
//! The map widget feeds [`Message`]s in and applies the [`Effect`]s that come
//! back. Every handler runs to completion before the next message, so
//! selection mutations are serialized by `&mut self`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{self, Download, ExportFormat};
use crate::geo::{GeoBounds, LatLng};
use crate::grid::{CoverageOverlay, GridFeature, GridIndex};
use crate::picking::{self, RectangleSelect};
use crate::selection::SelectionStore;
use crate::share;
use crate::timer::{Debouncer, Millis, Window};
use crate::visibility::{self, Viewport, VisibilityOptions};

#[derive(Debug)]
pub enum Message {
    DatasetLoaded(Result<GridIndex>),
    OverlayLoaded(Option<CoverageOverlay>),
    /// The map has settled on its initial view.
    MapReady,
    ViewportChanged(Viewport),
    /// Lets due timers fire; see [`Controller::next_deadline`].
    Tick,
    PointerDown {
        point: LatLng,
        shift: bool,
        dragging_enabled: bool,
    },
    PointerMove {
        point: LatLng,
    },
    PointerUp {
        point: LatLng,
    },
    /// Pointer released outside the map container.
    DocumentPointerUp,
    Click {
        point: LatLng,
    },
    CancelDrag,
    Remove(String),
    Clear,
    Search(String),
    Export {
        format: ExportFormat,
        at: DateTime<Utc>,
    },
    /// The host failed to hand a download to the user.
    DownloadFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Draw exactly these grids, replacing whatever was drawn.
    RenderGrid(Vec<String>),
    ClearGrid,
    RenderOverlay,
    /// Highlight exactly these selected grids.
    Highlight(Vec<String>),
    /// Replace the current history entry with this URL.
    ReplaceUrl(String),
    SharePanel {
        visible: bool,
        focus: bool,
    },
    SetDragging(bool),
    DrawRect(Option<GeoBounds>),
    FitBounds {
        bounds: GeoBounds,
        padding: u32,
    },
    PanTo {
        center: LatLng,
        zoom: f64,
    },
    Feedback(String),
    ClearFeedback,
    /// Persistent error: the grid could not be loaded.
    DatasetError(String),
    Download(Download),
}

pub struct Controller {
    config: Config,
    grid: Option<GridIndex>,
    overlay: Option<CoverageOverlay>,
    selection: SelectionStore,
    rect: RectangleSelect,
    rendered: Vec<Arc<GridFeature>>,
    viewport: Option<Viewport>,
    initial_render_done: bool,
    debounce: Debouncer,
    click_guard: Window,
    feedback: Window,
    pending_restore: Vec<String>,
    map_ready: bool,
    url: String,
}

impl Controller {
    /// Creates a controller for a page opened at `url`. Grid names in the URL
    /// are held until the dataset is loaded and the map is ready.
    pub fn new(config: Config, url: &str) -> Self {
        let pending_restore = share::decode_share_url(url);
        if !pending_restore.is_empty() {
            debug!(names = ?pending_restore, "selection pending from URL");
        }
        Self {
            debounce: Debouncer::new(Duration::from_millis(config.debounce_ms)),
            click_guard: Window::new(Duration::from_millis(config.click_suppression_ms)),
            feedback: Window::new(Duration::from_millis(config.feedback_ttl_ms)),
            config,
            grid: None,
            overlay: None,
            selection: SelectionStore::new(),
            rect: RectangleSelect::new(),
            rendered: Vec::new(),
            viewport: None,
            initial_render_done: false,
            pending_restore,
            map_ready: false,
            url: url.to_string(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> Option<&GridIndex> {
        self.grid.as_ref()
    }

    pub fn overlay(&self) -> Option<&CoverageOverlay> {
        self.overlay.as_ref()
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    /// Grids currently drawn.
    pub fn rendered(&self) -> &[Arc<GridFeature>] {
        &self.rendered
    }

    pub fn share_url(&self) -> &str {
        &self.url
    }

    pub fn is_dragging(&self) -> bool {
        self.rect.is_active()
    }

    /// Earliest time a `Tick` would do anything.
    pub fn next_deadline(&self) -> Option<Millis> {
        [self.debounce.deadline(), self.feedback.until()]
            .into_iter()
            .flatten()
            .min()
    }

    pub fn handle(&mut self, now: Millis, msg: Message) -> Vec<Effect> {
        let mut fx = Vec::new();
        match msg {
            Message::DatasetLoaded(Ok(grid)) => {
                info!(grids = grid.len(), "grid dataset ready");
                self.grid = Some(grid);
                self.recompute_visible(&mut fx);
                self.try_restore(&mut fx);
            }
            Message::DatasetLoaded(Err(err)) => {
                error!(%err, "grid dataset failed to load");
                fx.push(Effect::DatasetError(format!("Could not load the tile grid: {err}")));
            }
            Message::OverlayLoaded(overlay) => {
                if overlay.is_some() {
                    fx.push(Effect::RenderOverlay);
                }
                self.overlay = overlay;
            }
            Message::MapReady => {
                self.map_ready = true;
                self.try_restore(&mut fx);
            }
            Message::ViewportChanged(viewport) => {
                self.viewport = Some(viewport);
                if self.initial_render_done {
                    self.debounce.schedule(now);
                } else {
                    self.recompute_visible(&mut fx);
                }
            }
            Message::Tick => {
                if self.debounce.fire(now) {
                    self.recompute_visible(&mut fx);
                }
                if self.feedback.expired(now) {
                    fx.push(Effect::ClearFeedback);
                }
            }
            Message::PointerDown {
                point,
                shift,
                dragging_enabled,
            } => {
                if self
                    .rect
                    .pointer_down(point, shift, self.grid.is_some(), dragging_enabled)
                {
                    fx.push(Effect::SetDragging(false));
                }
            }
            Message::PointerMove { point } => {
                if let Some(bounds) = self.rect.pointer_move(point) {
                    fx.push(Effect::DrawRect(Some(bounds)));
                }
            }
            Message::PointerUp { point } => self.finish_drag(now, Some(point), &mut fx),
            Message::DocumentPointerUp => self.finish_drag(now, None, &mut fx),
            Message::CancelDrag => {
                if let Some(end) = self.rect.cancel() {
                    if end.restore_dragging {
                        fx.push(Effect::SetDragging(true));
                    }
                    fx.push(Effect::DrawRect(None));
                }
            }
            Message::Click { point } => self.click(now, point, &mut fx),
            Message::Remove(name) => {
                if self.selection.remove(&name) {
                    self.refresh(true, &mut fx);
                }
            }
            Message::Clear => {
                if self.selection.clear() {
                    self.refresh(true, &mut fx);
                }
            }
            Message::Search(query) => self.search(now, &query, &mut fx),
            Message::Export { format, at } => {
                match export::export_selection(&self.selection, format, &self.config.export_basename, at) {
                    Ok(download) => {
                        info!(filename = %download.filename, "export prepared");
                        fx.push(Effect::Download(download));
                    }
                    Err(Error::EmptySelection) => {
                        self.feedback(now, "Select at least one grid before exporting.", &mut fx);
                    }
                    Err(err) => self.feedback(now, &format!("Export failed: {err}"), &mut fx),
                }
            }
            Message::DownloadFailed(reason) => {
                self.feedback(now, &format!("Download failed: {reason}"), &mut fx);
            }
        }
        fx
    }

    fn feedback(&mut self, now: Millis, text: &str, fx: &mut Vec<Effect>) {
        self.feedback.open(now);
        fx.push(Effect::Feedback(text.to_string()));
    }

    fn recompute_visible(&mut self, fx: &mut Vec<Effect>) {
        let (Some(grid), Some(viewport)) = (&self.grid, &self.viewport) else {
            return;
        };
        let visible = visibility::visible_features(
            grid.features(),
            viewport,
            VisibilityOptions {
                min_zoom: self.config.min_zoom,
                max_features: self.config.max_features,
            },
        );
        self.initial_render_done = true;
        self.rendered = visible.features;
        if self.rendered.is_empty() {
            fx.push(Effect::ClearGrid);
        } else {
            fx.push(Effect::RenderGrid(
                self.rendered.iter().map(|f| f.name.clone()).collect(),
            ));
        }
    }

    /// Emits the cascade that follows a membership change.
    fn refresh(&mut self, user_initiated: bool, fx: &mut Vec<Effect>) {
        let names = self.selection.sorted_names();
        self.url = share::encode_share_url(&self.url, &names);
        fx.push(Effect::Highlight(names));
        fx.push(Effect::ReplaceUrl(self.url.clone()));
        if user_initiated {
            let visible = !self.selection.is_empty();
            fx.push(Effect::SharePanel {
                visible,
                focus: visible,
            });
        }
    }

    fn try_restore(&mut self, fx: &mut Vec<Effect>) {
        if !self.map_ready || self.pending_restore.is_empty() {
            return;
        }
        let Some(grid) = &self.grid else {
            return;
        };
        let pending = std::mem::take(&mut self.pending_restore);
        let matched = grid.resolve(pending.iter().map(String::as_str));
        if matched.is_empty() {
            info!(requested = pending.len(), "no grid in the shared URL matched; ignoring");
            return;
        }
        info!(requested = pending.len(), restored = matched.len(), "selection restored from URL");
        self.selection.replace_all(&matched);
        self.refresh(false, fx);
        fx.push(Effect::SharePanel {
            visible: true,
            focus: false,
        });
        if let Some(bounds) = self.selection.bounds() {
            fx.push(Effect::FitBounds {
                bounds,
                padding: self.config.fit_padding,
            });
        }
    }

    fn finish_drag(&mut self, now: Millis, point: Option<LatLng>, fx: &mut Vec<Effect>) {
        let Some(end) = self.rect.pointer_up(point) else {
            return;
        };
        if end.restore_dragging {
            fx.push(Effect::SetDragging(true));
        }
        fx.push(Effect::DrawRect(None));
        let Some(rect) = end.rect else {
            return;
        };
        self.click_guard.open(now);
        let Some(grid) = &self.grid else {
            return;
        };
        let hits = picking::features_in_rect(grid.features(), &rect);
        debug!(hits = hits.len(), "rectangle resolved");
        if picking::apply_rectangle(&mut self.selection, &hits) {
            self.refresh(true, fx);
        }
    }

    fn click(&mut self, now: Millis, point: LatLng, fx: &mut Vec<Effect>) {
        if self.rect.is_active() || self.click_guard.is_open(now) {
            debug!("click suppressed after drag");
            return;
        }
        let hits = picking::features_at(&self.rendered, point);
        if hits.is_empty() {
            return;
        }
        if self.selection.toggle(&hits) {
            self.refresh(true, fx);
        }
    }

    fn search(&mut self, now: Millis, query: &str, fx: &mut Vec<Effect>) {
        let hit = self
            .grid
            .as_ref()
            .and_then(|g| g.find(query))
            .and_then(|f| f.centroid());
        match hit {
            Some(center) => fx.push(Effect::PanTo {
                center,
                zoom: self.config.search_zoom,
            }),
            None => {
                let text = format!("No grid named \"{}\".", query.trim());
                self.feedback(now, &text, fx);
            }
        }
    }
}
