//! Frame-driven sweep over several independent lanes.
//!
//! A display `width` pixels wide spans `window_ms` of simulated time. Each
//! call to [`SweepDriver::advance_frame`] moves the cursor `speed` pixels to
//! the right and integrates every lane until simulated time reaches the
//! cursor. Once the cursor reaches the right edge the next frame starts a
//! fresh sweep from the initial condition.

use mimic_core::{Result, Time, Trajectory, Voltage};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::profiles::CellProfile;
use crate::{Integrator, NeuronState, Timestep};

/// Geometry and pacing of a sweep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Display width in pixels
    pub width: f64,
    /// Simulated time covered by one full sweep (ms)
    pub window_ms: Time,
    /// Cursor advance per frame (pixels)
    pub speed: f64,
    /// Spacing of time-axis labels (ms)
    pub label_every_ms: Time,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            width: 1400.0,
            window_ms: 200.0,
            speed: 0.5,
            label_every_ms: 25.0,
        }
    }
}

impl SweepConfig {
    pub fn ms_per_pixel(&self) -> f64 {
        self.window_ms / self.width
    }

    pub fn validate(&self) -> Result<()> {
        let ok = |x: f64| x.is_finite() && x > 0.0;
        if ok(self.width) && ok(self.window_ms) && ok(self.speed) && ok(self.label_every_ms) {
            Ok(())
        } else {
            Err(mimic_core::MimicError::InvalidParameter(format!(
                "sweep geometry must be positive and finite: {self:?}"
            )))
        }
    }
}

/// One independently simulated neuron with its sample buffer
#[derive(Debug, Clone)]
pub struct Lane {
    pub label: String,
    integrator: Integrator,
    buffer: Trajectory,
}

impl Lane {
    pub fn new(label: impl Into<String>, integrator: Integrator) -> Self {
        let mut lane = Self {
            label: label.into(),
            integrator,
            buffer: Trajectory::new(),
        };
        lane.restart();
        lane
    }

    pub fn from_profile(profile: CellProfile, dt: Timestep) -> Result<Self> {
        Ok(Self::new(profile.name(), profile.integrator(dt)?))
    }

    /// Samples of the current sweep, one per frame (time in ms)
    pub fn buffer(&self) -> &Trajectory {
        &self.buffer
    }

    pub fn state(&self) -> NeuronState {
        self.integrator.state()
    }

    pub fn voltage(&self) -> Voltage {
        self.integrator.state().v
    }

    fn restart(&mut self) {
        self.integrator.reset();
        self.buffer.clear();
        // starts at t = 0 so the buffer cannot be empty
        let v = self.integrator.state().v;
        self.buffer.times.push(0.0);
        self.buffer.voltages.push(v);
    }

    fn advance_to(&mut self, target: Time) -> Result<()> {
        if self.integrator.run_until(target)? > 0 {
            self.buffer.push(self.integrator.time(), self.integrator.state().v)?;
        }
        Ok(())
    }
}

/// Time-axis label placed when the sweep passes a label boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLabel {
    /// Cursor position when the boundary was reached (pixels)
    pub x: f64,
    /// Label value (ms)
    pub ms: u64,
}

/// Result of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    /// Cursor position after the frame (pixels)
    pub cursor: f64,
    /// Simulated time reached (ms)
    pub time: Time,
    /// This frame started a new sweep
    pub wrapped: bool,
}

/// Owns the lanes, the cursor, and the sweep clock.
#[derive(Debug, Clone)]
pub struct SweepDriver {
    config: SweepConfig,
    lanes: Vec<Lane>,
    cursor: f64,
    labels: Vec<AxisLabel>,
    next_label: u64,
    sweeps: u64,
}

impl SweepDriver {
    pub fn new(config: SweepConfig, lanes: Vec<Lane>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            lanes,
            cursor: 0.0,
            labels: Vec::new(),
            next_label: 1,
            sweeps: 0,
        })
    }

    /// Lanes for every preset cell, in display order
    pub fn with_profiles(config: SweepConfig, profiles: &[CellProfile], dt: Timestep) -> Result<Self> {
        let lanes = profiles
            .iter()
            .map(|p| Lane::from_profile(*p, dt))
            .collect::<Result<Vec<_>>>()?;
        Self::new(config, lanes)
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn labels(&self) -> &[AxisLabel] {
        &self.labels
    }

    /// Completed sweeps so far
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Simulated time of the current cursor position (ms)
    pub fn time(&self) -> Time {
        self.cursor * self.config.ms_per_pixel()
    }

    /// Advance every lane by one frame.
    pub fn advance_frame(&mut self) -> Result<FrameOutcome> {
        let wrapped = self.cursor >= self.config.width;
        if wrapped {
            self.restart();
            self.sweeps += 1;
            debug!(sweeps = self.sweeps, "sweep wrapped");
        }

        let next = self.cursor + self.config.speed;
        let target = next * self.config.ms_per_pixel();
        for lane in &mut self.lanes {
            lane.advance_to(target)?;
        }

        let boundary = (target / self.config.label_every_ms).floor() as u64;
        if boundary >= self.next_label {
            self.labels.push(AxisLabel {
                x: next,
                ms: (boundary as f64 * self.config.label_every_ms).round() as u64,
            });
            self.next_label = boundary + 1;
        }

        self.cursor = next;
        trace!(cursor = self.cursor, time = target, "frame advanced");

        Ok(FrameOutcome {
            cursor: self.cursor,
            time: target,
            wrapped,
        })
    }

    /// Discard the current sweep and start over from the initial condition
    pub fn restart(&mut self) {
        self.cursor = 0.0;
        self.labels.clear();
        self.next_label = 1;
        for lane in &mut self.lanes {
            lane.restart();
        }
    }
}
