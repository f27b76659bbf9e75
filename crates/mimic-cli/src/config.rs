//! TOML configuration for the CLI

use std::path::Path;

use mimic_core::{MimicError, Result};
use mimic_hh::{Conductances, StimulusProtocol, Timestep, MAX_DT};
use mimic_trace::{Palette, PlotSize};
use serde::{Deserialize, Serialize};

/// Integration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Step size (ms)
    pub dt: f64,
    /// Run length (ms)
    pub duration: f64,
    /// Keep every n-th step
    pub record_every: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            duration: 200.0,
            record_every: 1,
        }
    }
}

impl SimulationConfig {
    pub fn timestep(&self) -> Result<Timestep> {
        Timestep::new(self.dt)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0 && self.dt <= MAX_DT) {
            return Err(MimicError::Config(format!(
                "simulation.dt = {} must be in (0, {MAX_DT}] ms",
                self.dt
            )));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(MimicError::Config(format!(
                "simulation.duration = {} must be positive",
                self.duration
            )));
        }
        if self.record_every == 0 {
            return Err(MimicError::Config("simulation.record_every must be at least 1".into()));
        }
        Ok(())
    }
}

/// Plot output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: f64,
    pub height: f64,
    pub accent: String,
    pub muted: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        let palette = Palette::default();
        Self {
            width: 900.0,
            height: 260.0,
            accent: palette.accent,
            muted: palette.muted,
        }
    }
}

impl PlotConfig {
    pub fn size(&self) -> PlotSize {
        PlotSize {
            width: self.width,
            height: self.height,
        }
    }

    pub fn palette(&self) -> Palette {
        Palette {
            accent: self.accent.clone(),
            muted: self.muted.clone(),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimicConfig {
    pub log_level: String,
    pub simulation: SimulationConfig,
    pub neuron: Conductances,
    pub stimulus: StimulusProtocol,
    pub plot: PlotConfig,
}

impl Default for MimicConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            simulation: SimulationConfig::default(),
            neuron: Conductances::default(),
            stimulus: StimulusProtocol::Step {
                start: 10.0,
                end: 190.0,
                amplitude: 10.0,
            },
            plot: PlotConfig::default(),
        }
    }
}

impl MimicConfig {
    /// Load from `path`; a missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MimicError::Config(format!("Invalid config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MimicError::Config(format!("Failed to serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation.validate()?;
        self.stimulus
            .validate()
            .map_err(|e| MimicError::Config(format!("stimulus: {e}")))
    }
}
