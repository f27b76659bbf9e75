//! # Mimic Core
//!
//! Shared types for the Mimic membrane-potential toolkit.
//!
//! ## Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `mimic-hh` | Hodgkin-Huxley integrator and frame-driven sweep driver |
//! | `mimic-trace` | Voltage trace / spike raster mapping and overlay lifecycle |
//! | `mimic-cli` | Command-line front end |
//! | `mimic-gui` | egui drawing surface |
//!
//! ## Data Shape
//!
//! Every series exchanged between the integrator, the renderer and the
//! on-disk previews is a [`Dataset`]: optional `times`/`voltages` for a
//! continuous trace, optional `spikes` for a raster, plus opaque metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common errors
#[derive(Debug, Error)]
pub enum MimicError {
    #[error("Malformed dataset: {0}")]
    MalformedDataset(String),

    #[error("Failed to load {source_id}: {reason}")]
    Fetch { source_id: String, reason: String },

    #[error("Numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MimicError>;

/// Time point (ms unless stated otherwise)
pub type Time = f64;

/// Voltage (mV)
pub type Voltage = f64;

/// Injected current (uA/cm^2)
pub type Current = f64;

/// Conductance (mS/cm^2)
pub type Conductance = f64;

// =============================================================================
// TIME UNITS
// =============================================================================

/// Largest time value still read as seconds when a series is ingested.
pub const MILLISECOND_THRESHOLD: f64 = 50.0;

/// Unit a stored time axis was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Infer the unit of a time axis from its largest value.
    ///
    /// Values above [`MILLISECOND_THRESHOLD`] mean milliseconds. An empty
    /// axis reads as seconds.
    pub fn detect(times: impl IntoIterator<Item = Time>) -> Self {
        let max = times.into_iter().fold(f64::NEG_INFINITY, f64::max);
        if max > MILLISECOND_THRESHOLD {
            Self::Milliseconds
        } else {
            Self::Seconds
        }
    }

    /// Convert a value in this unit to seconds
    pub fn to_seconds(self, t: Time) -> Time {
        match self {
            Self::Seconds => t,
            Self::Milliseconds => t / 1000.0,
        }
    }
}

// =============================================================================
// TRAJECTORY
// =============================================================================

/// Voltage trajectory produced by the integrator (times in ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Sample times, strictly increasing
    pub times: Vec<Time>,
    /// Membrane potential at each sample
    pub voltages: Vec<Voltage>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            times: Vec::with_capacity(n),
            voltages: Vec::with_capacity(n),
        }
    }

    /// Append a sample. Samples must arrive in increasing time order.
    pub fn push(&mut self, t: Time, v: Voltage) -> Result<()> {
        if !t.is_finite() || !v.is_finite() {
            return Err(MimicError::NumericalDegeneracy(format!(
                "non-finite sample (t={t}, V={v})"
            )));
        }
        if let Some(&last) = self.times.last() {
            if t <= last {
                return Err(MimicError::InvalidParameter(format!(
                    "sample at t={t} does not follow t={last}"
                )));
            }
        }
        self.times.push(t);
        self.voltages.push(v);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.times.clear();
        self.voltages.clear();
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn last(&self) -> Option<(Time, Voltage)> {
        Some((*self.times.last()?, *self.voltages.last()?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Time, Voltage)> + '_ {
        self.times.iter().copied().zip(self.voltages.iter().copied())
    }

    /// Largest voltage reached, if any samples exist
    pub fn peak(&self) -> Option<Voltage> {
        self.voltages.iter().copied().reduce(f64::max)
    }
}

// =============================================================================
// DATASET SHAPE
// =============================================================================

/// Discrete spike of one unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    #[serde(default)]
    pub time: Time,
    #[serde(default)]
    pub neuron: usize,
}

impl SpikeEvent {
    pub fn new(time: Time, neuron: usize) -> Self {
        Self { time, neuron }
    }
}

/// Free-form descriptive fields carried alongside a dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Metadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Precomputed or simulated series as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Vec<Time>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltages: Option<Vec<Voltage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spikes: Option<Vec<SpikeEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neurons: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Summary stored beside the metadata rather than in it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_metadata")]
    pub metadata: Metadata,
}

fn is_empty_metadata(meta: &Metadata) -> bool {
    *meta == Metadata::default()
}

/// Either a full record or a bare list of spikes
#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Spikes(Vec<SpikeEvent>),
    Record(Dataset),
}

impl Dataset {
    /// Trace dataset from an integrator trajectory
    pub fn from_trajectory(trajectory: &Trajectory, metadata: Metadata) -> Self {
        Self {
            times: Some(trajectory.times.clone()),
            voltages: Some(trajectory.voltages.clone()),
            metadata,
            ..Self::default()
        }
    }

    /// Raster dataset from spike events
    pub fn from_spikes(spikes: Vec<SpikeEvent>, neurons: Option<usize>, duration: Option<f64>) -> Self {
        Self {
            spikes: Some(spikes),
            neurons,
            duration,
            ..Self::default()
        }
    }

    /// Parse a dataset document. A bare JSON array is read as a spike list.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(match serde_json::from_str::<DatasetFile>(text)? {
            DatasetFile::Spikes(spikes) => Self::from_spikes(spikes, None, None),
            DatasetFile::Record(record) => record,
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Carries both trace fields
    pub fn has_trace(&self) -> bool {
        self.times.is_some() && self.voltages.is_some()
    }

    pub fn has_spikes(&self) -> bool {
        self.spikes.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_unit_detection() {
        assert_eq!(TimeUnit::detect([0.0, 0.5, 1.0]), TimeUnit::Seconds);
        assert_eq!(TimeUnit::detect([0.0, 500.0, 1000.0]), TimeUnit::Milliseconds);
        assert_eq!(TimeUnit::detect(Vec::new()), TimeUnit::Seconds);
        assert_eq!(TimeUnit::Milliseconds.to_seconds(250.0), 0.25);
    }

    #[test]
    fn test_trajectory_rejects_out_of_order() {
        let mut tr = Trajectory::new();
        tr.push(0.0, -70.0).unwrap();
        tr.push(0.01, -69.9).unwrap();
        assert!(tr.push(0.01, -69.8).is_err());
        assert!(tr.push(0.005, -69.8).is_err());
        assert_eq!(tr.len(), 2);
    }

    #[test]
    fn test_trajectory_rejects_non_finite() {
        let mut tr = Trajectory::new();
        assert!(matches!(
            tr.push(0.0, f64::NAN),
            Err(MimicError::NumericalDegeneracy(_))
        ));
        assert!(tr.is_empty());
    }

    #[test]
    fn test_dataset_bare_spike_array() {
        let ds = Dataset::from_json_str(r#"[{"time": 10, "neuron": 0}, {"time": 20, "neuron": 3}]"#).unwrap();
        assert!(ds.has_spikes());
        assert!(!ds.has_trace());
        assert_eq!(ds.spikes.unwrap()[1], SpikeEvent::new(20.0, 3));
    }

    #[test]
    fn test_dataset_record_with_metadata() {
        let text = r#"{
            "metadata": {"name": "WT", "summary": "baseline", "gene": "control"},
            "times": [0, 1, 2],
            "voltages": [-65, -64, -30]
        }"#;
        let ds = Dataset::from_json_str(text).unwrap();
        assert!(ds.has_trace());
        assert_eq!(ds.name(), Some("WT"));
        assert_eq!(ds.metadata.extra["gene"], "control");

        let back = Dataset::from_json_str(&ds.to_json_string().unwrap()).unwrap();
        assert_eq!(back, ds);
    }
}
