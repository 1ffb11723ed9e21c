//! Selection and spatial-query engine for browsing the Sentinel-2 tile grid.
//!
//! The map widget is an outside collaborator: it reports viewport changes and
//! pointer events to a [`Controller`] and applies the [`Effect`]s it returns.

pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod fetch;
pub mod geo;
pub mod grid;
pub mod picking;
pub mod selection;
pub mod share;
pub mod timer;
pub mod visibility;
pub mod wrap;

pub use config::Config;
pub use controller::{Controller, Effect, Message};
pub use error::{Error, Result};
pub use export::ExportFormat;
pub use geo::{GeoBounds, LatLng};
pub use grid::{GridFeature, GridIndex};
pub use selection::SelectionStore;
pub use timer::Millis;
pub use visibility::Viewport;
