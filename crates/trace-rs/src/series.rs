//! Ingestion of stored datasets into display-ready series.
//!
//! The trace/raster decision is made once here. Time values are normalized
//! to seconds per series using [`TimeUnit::detect`].

use mimic_core::{Dataset, MimicError, Result, SpikeEvent, Time, TimeUnit, Voltage};
use serde::{Deserialize, Serialize};

/// Continuous voltage trace, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSeries {
    pub times: Vec<Time>,
    pub voltages: Vec<Voltage>,
    /// Unit the times were stored in
    pub unit: TimeUnit,
}

impl TraceSeries {
    pub fn new(times: &[Time], voltages: &[Voltage]) -> Result<Self> {
        if times.len() != voltages.len() {
            return Err(MimicError::MalformedDataset(format!(
                "{} times but {} voltages",
                times.len(),
                voltages.len()
            )));
        }
        if times.is_empty() {
            return Err(MimicError::MalformedDataset("trace has no samples".into()));
        }
        if times.iter().chain(voltages).any(|x| !x.is_finite()) {
            return Err(MimicError::MalformedDataset("trace contains non-finite values".into()));
        }

        let unit = TimeUnit::detect(times.iter().copied());
        Ok(Self {
            times: times.iter().map(|&t| unit.to_seconds(t)).collect(),
            voltages: voltages.to_vec(),
            unit,
        })
    }

    /// First and last sample times
    pub fn span(&self) -> (Time, Time) {
        let first = self.times.first().copied().unwrap_or(0.0);
        let last = self.times.last().copied().unwrap_or(first);
        (first, last)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Discrete spikes of several units, times in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSeries {
    pub spikes: Vec<SpikeEvent>,
    /// Declared count, or one more than the largest index seen
    pub neurons: usize,
    /// Declared duration, else last spike time, else 1
    pub duration: Time,
    pub unit: TimeUnit,
}

impl RasterSeries {
    pub fn new(spikes: &[SpikeEvent], neurons: Option<usize>, duration: Option<f64>) -> Result<Self> {
        if spikes.iter().any(|s| !s.time.is_finite()) {
            return Err(MimicError::MalformedDataset("spike with non-finite time".into()));
        }

        let unit = TimeUnit::detect(spikes.iter().map(|s| s.time));
        let spikes: Vec<SpikeEvent> = spikes
            .iter()
            .map(|s| SpikeEvent::new(unit.to_seconds(s.time), s.neuron))
            .collect();

        // zero counts and non-positive durations read as undeclared
        let neurons = neurons
            .filter(|&n| n > 0)
            .unwrap_or_else(|| spikes.iter().map(|s| s.neuron).max().map_or(1, |n| n + 1));
        let last_spike = spikes.iter().map(|s| s.time).fold(0.0, f64::max);
        let duration = duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| unit.to_seconds(d))
            .unwrap_or(if last_spike > 0.0 { last_spike } else { 1.0 });

        Ok(Self {
            spikes,
            neurons,
            duration,
            unit,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesKind {
    Trace,
    Raster,
}

/// A dataset classified for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Series {
    Trace(TraceSeries),
    Raster(RasterSeries),
}

impl Series {
    /// Classify a dataset. Both `times` and `voltages` make a trace;
    /// otherwise `spikes` make a raster; anything else is malformed.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        match (&dataset.times, &dataset.voltages, &dataset.spikes) {
            (Some(times), Some(voltages), _) => Ok(Self::Trace(TraceSeries::new(times, voltages)?)),
            (_, _, Some(spikes)) => Ok(Self::Raster(RasterSeries::new(
                spikes,
                dataset.neurons,
                dataset.duration,
            )?)),
            _ => Err(MimicError::MalformedDataset(
                "dataset has neither times/voltages nor spikes".into(),
            )),
        }
    }

    pub fn kind(&self) -> SeriesKind {
        match self {
            Self::Trace(_) => SeriesKind::Trace,
            Self::Raster(_) => SeriesKind::Raster,
        }
    }

    pub fn unit(&self) -> TimeUnit {
        match self {
            Self::Trace(t) => t.unit,
            Self::Raster(r) => r.unit,
        }
    }

    pub fn as_trace(&self) -> Option<&TraceSeries> {
        match self {
            Self::Trace(t) => Some(t),
            Self::Raster(_) => None,
        }
    }

    pub fn as_raster(&self) -> Option<&RasterSeries> {
        match self {
            Self::Raster(r) => Some(r),
            Self::Trace(_) => None,
        }
    }
}

impl TryFrom<&Dataset> for Series {
    type Error = MimicError;

    fn try_from(dataset: &Dataset) -> Result<Self> {
        Self::from_dataset(dataset)
    }
}
