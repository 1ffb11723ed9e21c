use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::geo::{GeoBounds, LatLng};
use crate::grid::{GridFeature, normalize_name};

/// One selected grid. The centroid is computed once, when the grid is added.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEntry {
    /// Uppercased grid name.
    pub name: String,
    pub feature: Arc<GridFeature>,
    pub centroid: Option<LatLng>,
}

impl SelectionEntry {
    fn new(feature: Arc<GridFeature>) -> Self {
        Self {
            name: feature.key(),
            centroid: feature.centroid(),
            feature,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    entry: SelectionEntry,
}

/// The set of selected grids, keyed by uppercased name.
///
/// Ordering contract:
/// - `entries()` yields grids in insertion order.
/// - `sorted_names()` / `sorted_entries()` yield grids in lexicographic name order;
///   this is the order used for sharing and export.
///
/// Every mutator returns `true` only if membership changed, so callers can
/// skip refresh work on no-ops.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    slots: HashMap<String, Slot>,
    next_seq: u64,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(&normalize_name(name))
    }

    pub fn get(&self, name: &str) -> Option<&SelectionEntry> {
        self.slots.get(&normalize_name(name)).map(|s| &s.entry)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<&SelectionEntry> {
        let mut slots: Vec<&Slot> = self.slots.values().collect();
        slots.sort_unstable_by_key(|s| s.seq);
        slots.into_iter().map(|s| &s.entry).collect()
    }

    /// Entries ordered by name.
    pub fn sorted_entries(&self) -> Vec<&SelectionEntry> {
        let mut entries: Vec<&SelectionEntry> = self.slots.values().map(|s| &s.entry).collect();
        entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn sorted_names(&self) -> Vec<String> {
        self.sorted_entries()
            .into_iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// Combined extent of every selected grid.
    pub fn bounds(&self) -> Option<GeoBounds> {
        let mut out = GeoBounds::empty();
        for slot in self.slots.values() {
            if let Some(b) = slot.entry.feature.bounds() {
                out.extend_bounds(&b);
            }
        }
        (!out.is_empty()).then_some(out)
    }

    fn insert(&mut self, feature: Arc<GridFeature>) -> bool {
        let entry = SelectionEntry::new(feature);
        if self.slots.contains_key(&entry.name) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(entry.name.clone(), Slot { seq, entry });
        true
    }

    /// Flips membership of every candidate: absent ones are added, present
    /// ones removed. Candidates sharing a name count once.
    pub fn toggle(&mut self, candidates: &[Arc<GridFeature>]) -> bool {
        let mut seen = HashSet::new();
        let mut to_add = Vec::new();
        let mut to_remove = Vec::new();
        for feature in candidates {
            let key = feature.key();
            if !seen.insert(key.clone()) {
                continue;
            }
            if self.slots.contains_key(&key) {
                to_remove.push(key);
            } else {
                to_add.push(Arc::clone(feature));
            }
        }

        for key in &to_remove {
            self.slots.remove(key);
        }
        let removed = to_remove.len();
        let added = to_add.into_iter().filter(|f| self.insert(Arc::clone(f))).count();
        debug!(added, removed, total = self.len(), "selection toggled");
        added + removed > 0
    }

    /// Adds every feature not already selected.
    pub fn add_all(&mut self, features: &[Arc<GridFeature>]) -> bool {
        let added = features
            .iter()
            .filter(|f| self.insert(Arc::clone(f)))
            .count();
        if added > 0 {
            debug!(added, total = self.len(), "selection extended");
        }
        added > 0
    }

    /// Removes every named grid that is selected.
    pub fn remove_all<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let removed = names
            .into_iter()
            .filter(|name| self.slots.remove(&normalize_name(name)).is_some())
            .count();
        if removed > 0 {
            debug!(removed, total = self.len(), "selection reduced");
        }
        removed > 0
    }

    /// Replaces the selection with `features`. When several features share an
    /// uppercased name, the first one wins.
    pub fn replace_all(&mut self, features: &[Arc<GridFeature>]) -> bool {
        let before: HashSet<String> = self.slots.keys().cloned().collect();
        self.slots.clear();
        for feature in features {
            self.insert(Arc::clone(feature));
        }
        let changed = before.len() != self.slots.len()
            || !before.iter().all(|k| self.slots.contains_key(k));
        debug!(total = self.len(), changed, "selection replaced");
        changed
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.remove_all([name])
    }

    pub fn clear(&mut self) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        self.slots.clear();
        debug!("selection cleared");
        true
    }
}
