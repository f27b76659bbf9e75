//! Dataset retrieval, preview catalog, and the stale-response guard.

use std::fs;
use std::path::{Path, PathBuf};

use mimic_core::{Dataset, Metadata, MimicError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compare::is_reference;
use crate::series::Series;

/// Where precomputed datasets come from
pub trait DatasetSource {
    /// Identifiers of every available dataset
    fn list(&self) -> Result<Vec<String>>;

    fn fetch(&self, id: &str) -> Result<Dataset>;
}

/// `<root>/<id>.json` files
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl DatasetSource for DirectorySource {
    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| MimicError::Fetch {
            source_id: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn fetch(&self, id: &str) -> Result<Dataset> {
        let path = self.path_of(id);
        let text = fs::read_to_string(&path).map_err(|e| MimicError::Fetch {
            source_id: id.to_string(),
            reason: e.to_string(),
        })?;
        Dataset::from_json_str(&text)
            .map_err(|e| MimicError::MalformedDataset(format!("{}: {e}", path.display())))
    }
}

/// One row of the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewEntry {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub has_trace: bool,
    pub has_spikes: bool,
    pub metadata: Metadata,
}

impl PreviewEntry {
    pub fn from_dataset(id: &str, dataset: &Dataset) -> Self {
        let meta = &dataset.metadata;
        let name = meta
            .name
            .clone()
            .or_else(|| meta.extra.get("title").and_then(|v| v.as_str()).map(str::to_string))
            .unwrap_or_else(|| id.to_string());
        Self {
            id: id.to_string(),
            name,
            summary: meta
                .summary
                .clone()
                .or_else(|| dataset.summary.clone())
                .unwrap_or_default(),
            has_trace: dataset.has_trace(),
            has_spikes: dataset.has_spikes(),
            metadata: meta.clone(),
        }
    }

    /// Marked as the wild-type reference
    pub fn is_reference(&self) -> bool {
        is_reference(&self.id, &self.name)
    }
}

/// Previews of every readable dataset in a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub entries: Vec<PreviewEntry>,
}

impl Catalog {
    /// Read every dataset once; unreadable ones are skipped.
    pub fn scan(source: &impl DatasetSource) -> Result<Self> {
        let mut entries = Vec::new();
        for id in source.list()? {
            match source.fetch(&id) {
                Ok(dataset) => entries.push(PreviewEntry::from_dataset(&id, &dataset)),
                Err(e) => warn!(id = %id, error = %e, "skipping unreadable dataset"),
            }
        }
        debug!(count = entries.len(), "catalog scanned");
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&PreviewEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// First wild-type entry
    pub fn reference(&self) -> Option<&PreviewEntry> {
        self.entries.iter().find(|e| e.is_reference())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Identifies one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

/// A dataset together with its display series
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub id: String,
    pub dataset: Dataset,
    pub series: Series,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading { id: String, ticket: LoadTicket },
    Ready(Loaded),
    Failed { id: String, reason: String },
}

/// Tracks the latest selection; results of superseded requests are dropped.
#[derive(Debug, Clone)]
pub struct LoadTracker {
    generation: u64,
    state: LoadState,
}

impl Default for LoadTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadTracker {
    pub fn new() -> Self {
        Self {
            generation: 0,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn loaded(&self) -> Option<&Loaded> {
        match &self.state {
            LoadState::Ready(loaded) => Some(loaded),
            _ => None,
        }
    }

    pub fn series(&self) -> Option<&Series> {
        self.loaded().map(|l| &l.series)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading { .. })
    }

    /// Start loading `id`; any earlier request becomes stale.
    pub fn begin(&mut self, id: impl Into<String>) -> LoadTicket {
        self.generation += 1;
        let ticket = LoadTicket(self.generation);
        self.state = LoadState::Loading { id: id.into(), ticket };
        ticket
    }

    /// Drop the selection
    pub fn clear(&mut self) {
        self.generation += 1;
        self.state = LoadState::Idle;
    }

    /// Apply a finished request. Returns `false` if the ticket is stale.
    pub fn resolve(&mut self, ticket: LoadTicket, result: Result<Dataset>) -> bool {
        let id = match &self.state {
            LoadState::Loading { id, ticket: current } if *current == ticket => id.clone(),
            _ => {
                debug!(ticket = ticket.0, generation = self.generation, "stale load result dropped");
                return false;
            }
        };

        self.state = match result.and_then(|dataset| {
            let series = Series::from_dataset(&dataset)?;
            Ok((dataset, series))
        }) {
            Ok((dataset, series)) => LoadState::Ready(Loaded { id, dataset, series }),
            Err(e) => {
                warn!(id = %id, error = %e, "dataset load failed");
                LoadState::Failed {
                    id,
                    reason: e.to_string(),
                }
            }
        };
        true
    }

    /// Fetch synchronously from `source`
    pub fn load(&mut self, source: &impl DatasetSource, id: &str) -> &LoadState {
        let ticket = self.begin(id);
        self.resolve(ticket, source.fetch(id));
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MemorySource(HashMap<String, String>);

    impl DatasetSource for MemorySource {
        fn list(&self) -> Result<Vec<String>> {
            let mut ids: Vec<String> = self.0.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        }

        fn fetch(&self, id: &str) -> Result<Dataset> {
            let text = self.0.get(id).ok_or_else(|| MimicError::Fetch {
                source_id: id.to_string(),
                reason: "not found".into(),
            })?;
            Dataset::from_json_str(text)
        }
    }

    fn source() -> MemorySource {
        let mut files = HashMap::new();
        files.insert(
            "sim_wt".to_string(),
            r#"{"metadata": {"name": "WT baseline"}, "times": [0, 1], "voltages": [-65, -64]}"#.to_string(),
        );
        files.insert(
            "e999k".to_string(),
            r#"{"metadata": {"title": "E999K"}, "summary": "slowed inactivation", "times": [0, 1], "voltages": [-65, 10]}"#
                .to_string(),
        );
        files.insert("raster".to_string(), r#"[{"time": 1, "neuron": 0}]"#.to_string());
        files.insert("broken".to_string(), "{not json".to_string());
        MemorySource(files)
    }

    #[test]
    fn test_catalog_skips_unreadable() {
        let catalog = Catalog::scan(&source()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("e999k").unwrap().name, "E999K");
        assert_eq!(catalog.get("e999k").unwrap().summary, "slowed inactivation");
        assert_eq!(catalog.get("raster").unwrap().summary, "");
        assert_eq!(catalog.get("raster").unwrap().name, "raster");
        assert!(catalog.get("raster").unwrap().has_spikes);
        assert_eq!(catalog.reference().unwrap().id, "sim_wt");
    }

    #[test]
    fn test_stale_result_dropped() {
        let src = source();
        let mut tracker = LoadTracker::new();
        let first = tracker.begin("sim_wt");
        let second = tracker.begin("e999k");

        assert!(!tracker.resolve(first, src.fetch("sim_wt")));
        assert!(tracker.is_loading());

        assert!(tracker.resolve(second, src.fetch("e999k")));
        assert_eq!(tracker.loaded().unwrap().id, "e999k");
    }

    #[test]
    fn test_failure_is_reported_not_substituted() {
        let src = source();
        let mut tracker = LoadTracker::new();
        tracker.load(&src, "sim_wt");
        assert!(tracker.series().is_some());

        let state = tracker.load(&src, "missing");
        assert!(matches!(state, LoadState::Failed { id, .. } if id == "missing"));
        assert!(tracker.series().is_none());
    }

    #[test]
    fn test_cleared_selection_ignores_late_result() {
        let src = source();
        let mut tracker = LoadTracker::new();
        let ticket = tracker.begin("sim_wt");
        tracker.clear();
        assert!(!tracker.resolve(ticket, src.fetch("sim_wt")));
        assert_eq!(tracker.state(), &LoadState::Idle);
    }
}
