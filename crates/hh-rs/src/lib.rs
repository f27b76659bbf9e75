//! # HH-RS
//!
//! Hodgkin-Huxley membrane-potential integrator.
//!
//! ## Model
//!
//! ```text
//! dV/dt = I - gNa*m^3*h*(V - ENa) - gK*n^4*(V - EK) - gL*(V - EL)
//! dx/dt = alpha_x(V)*(1 - x) - beta_x(V)*x        x in {m, h, n}
//! ```
//!
//! Rate constants follow the classic empirical fits with the resting
//! potential convention V_rest = -65 mV.
//!
//! ## Stepping
//!
//! A single forward-Euler step reads only the pre-step state: gates relax
//! toward their steady state using the old `V`, and the ionic currents use
//! the old gates. The explicit scheme is only stable for small steps, so
//! the step size is carried as a [`Timestep`] that refuses anything above
//! [`MAX_DT`].
//!
//! ## Components
//!
//! - [`step`]: pure single-step update
//! - [`integrate`]: fixed-duration run producing a [`Trajectory`]
//! - [`Integrator`]: stateful driving loop owned by the caller
//! - [`sweep::SweepDriver`]: frame-driven sweep over several lanes
//! - [`profiles::CellProfile`]: preset cells used by the animated panels

use mimic_core::{
    Conductance, Current, Dataset, MimicError, Result, SpikeEvent, Time, Trajectory, Voltage,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod sweep;

// =============================================================================
// RATE FUNCTIONS
// =============================================================================

/// Rate function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RateFunction {
    /// Standard HH form: A*(V+B)/(exp((V+B)/C)-1)
    HodgkinHuxley { a: f64, b: f64, c: f64 },
    /// Exponential: A*exp((V+B)/C)
    Exponential { a: f64, b: f64, c: f64 },
    /// Sigmoid: A/(1+exp((V+B)/C))
    Sigmoid { a: f64, b: f64, c: f64 },
}

impl RateFunction {
    /// Evaluate rate at given voltage
    pub fn eval(&self, v: Voltage) -> f64 {
        match *self {
            Self::HodgkinHuxley { a, b, c } => {
                let x = (v + b) / c;
                if x.abs() < 1e-6 {
                    // removable singularity at V = -B
                    a * c
                } else {
                    a * (v + b) / (x.exp() - 1.0)
                }
            }
            Self::Exponential { a, b, c } => a * ((v + b) / c).exp(),
            Self::Sigmoid { a, b, c } => a / (1.0 + ((v + b) / c).exp()),
        }
    }
}

/// alpha_n = 0.01*(V+55)/(1-exp(-(V+55)/10))
pub const ALPHA_N: RateFunction = RateFunction::HodgkinHuxley { a: -0.01, b: 55.0, c: -10.0 };
/// beta_n = 0.125*exp(-(V+65)/80)
pub const BETA_N: RateFunction = RateFunction::Exponential { a: 0.125, b: 65.0, c: -80.0 };
/// alpha_m = 0.1*(V+40)/(1-exp(-(V+40)/10))
pub const ALPHA_M: RateFunction = RateFunction::HodgkinHuxley { a: -0.1, b: 40.0, c: -10.0 };
/// beta_m = 4*exp(-(V+65)/18)
pub const BETA_M: RateFunction = RateFunction::Exponential { a: 4.0, b: 65.0, c: -18.0 };
/// alpha_h = 0.07*exp(-(V+65)/20)
pub const ALPHA_H: RateFunction = RateFunction::Exponential { a: 0.07, b: 65.0, c: -20.0 };
/// beta_h = 1/(1+exp(-(V+35)/10))
pub const BETA_H: RateFunction = RateFunction::Sigmoid { a: 1.0, b: 35.0, c: -10.0 };

/// Opening/closing rates of the three gates at one voltage (1/ms)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConstants {
    pub alpha_n: f64,
    pub beta_n: f64,
    pub alpha_m: f64,
    pub beta_m: f64,
    pub alpha_h: f64,
    pub beta_h: f64,
}

impl RateConstants {
    pub fn at(v: Voltage) -> Self {
        Self {
            alpha_n: ALPHA_N.eval(v),
            beta_n: BETA_N.eval(v),
            alpha_m: ALPHA_M.eval(v),
            beta_m: BETA_M.eval(v),
            alpha_h: ALPHA_H.eval(v),
            beta_h: BETA_H.eval(v),
        }
    }
}

// =============================================================================
// STATE AND PARAMETERS
// =============================================================================

/// Membrane potential and gating variables of one neuron
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronState {
    /// Membrane potential (mV)
    pub v: Voltage,
    /// Sodium activation
    pub m: f64,
    /// Sodium inactivation
    pub h: f64,
    /// Potassium activation
    pub n: f64,
}

impl NeuronState {
    /// Canonical initial condition of every run
    pub const RESTING: Self = Self {
        v: -70.0,
        m: 0.0529,
        h: 0.5961,
        n: 0.3177,
    };

    pub fn resting() -> Self {
        Self::RESTING
    }

    /// Gates at their steady state `alpha/(alpha+beta)` for voltage `v`
    pub fn steady_state(v: Voltage) -> Self {
        let r = RateConstants::at(v);
        Self {
            v,
            m: r.alpha_m / (r.alpha_m + r.beta_m),
            h: r.alpha_h / (r.alpha_h + r.beta_h),
            n: r.alpha_n / (r.alpha_n + r.beta_n),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.v.is_finite() && self.m.is_finite() && self.h.is_finite() && self.n.is_finite()
    }
}

impl Default for NeuronState {
    fn default() -> Self {
        Self::RESTING
    }
}

/// Maximal conductances (mS/cm^2) and reversal potentials (mV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conductances {
    pub g_na: Conductance,
    pub g_k: Conductance,
    pub g_l: Conductance,
    pub e_na: Voltage,
    pub e_k: Voltage,
    pub e_l: Voltage,
}

impl Default for Conductances {
    fn default() -> Self {
        Self {
            g_na: 120.0,
            g_k: 36.0,
            g_l: 0.3,
            e_na: 50.0,
            e_k: -77.0,
            e_l: -54.4,
        }
    }
}

impl Conductances {
    pub fn with_sodium(mut self, g_na: Conductance) -> Self {
        self.g_na = g_na;
        self
    }

    pub fn with_potassium(mut self, g_k: Conductance) -> Self {
        self.g_k = g_k;
        self
    }
}

/// Sodium, potassium and leak currents at one state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Currents {
    pub i_na: Current,
    pub i_k: Current,
    pub i_l: Current,
}

impl Currents {
    pub fn of(state: &NeuronState, params: &Conductances) -> Self {
        Self {
            i_na: params.g_na * state.m.powi(3) * state.h * (state.v - params.e_na),
            i_k: params.g_k * state.n.powi(4) * (state.v - params.e_k),
            i_l: params.g_l * (state.v - params.e_l),
        }
    }

    pub fn total(&self) -> Current {
        self.i_na + self.i_k + self.i_l
    }
}

/// Largest step the explicit scheme is run with (ms)
pub const MAX_DT: Time = 0.05;

/// Integration step in ms, restricted to `(0, MAX_DT]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Timestep(f64);

impl Timestep {
    /// 0.01 ms, the step used by the animated traces
    pub const FINE: Self = Self(0.01);
    /// 0.05 ms, the coarsest supported step
    pub const COARSE: Self = Self(MAX_DT);

    pub fn new(dt: Time) -> Result<Self> {
        if dt.is_finite() && dt > 0.0 && dt <= MAX_DT {
            Ok(Self(dt))
        } else {
            Err(MimicError::InvalidParameter(format!(
                "timestep {dt} ms outside (0, {MAX_DT}] ms"
            )))
        }
    }

    pub fn get(self) -> Time {
        self.0
    }

    /// Number of steps needed to cover `duration`
    pub fn steps_for(self, duration: Time) -> u64 {
        ((duration / self.0) - 1e-6).ceil().max(0.0) as u64
    }
}

impl Default for Timestep {
    fn default() -> Self {
        Self::FINE
    }
}

impl TryFrom<f64> for Timestep {
    type Error = MimicError;

    fn try_from(dt: f64) -> Result<Self> {
        Self::new(dt)
    }
}

// =============================================================================
// STEP
// =============================================================================

fn relax(x: f64, alpha: f64, beta: f64, dt: Time) -> f64 {
    (x + dt * (alpha * (1.0 - x) - beta * x)).clamp(0.0, 1.0)
}

/// Advance one forward-Euler step under injected current `i`.
///
/// Every derivative is evaluated at the incoming state. Gates are held
/// inside [0, 1] after the update.
pub fn step(state: NeuronState, params: &Conductances, i: Current, dt: Timestep) -> NeuronState {
    let dt = dt.get();
    let rates = RateConstants::at(state.v);
    let currents = Currents::of(&state, params);

    NeuronState {
        v: state.v + dt * (i - currents.total()),
        m: relax(state.m, rates.alpha_m, rates.beta_m, dt),
        h: relax(state.h, rates.alpha_h, rates.beta_h, dt),
        n: relax(state.n, rates.alpha_n, rates.beta_n, dt),
    }
}

// =============================================================================
// STIMULUS
// =============================================================================

/// Constant current on the half-open window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    pub start: Time,
    pub end: Time,
    pub amplitude: Current,
}

impl Pulse {
    pub fn new(start: Time, end: Time, amplitude: Current) -> Self {
        Self { start, end, amplitude }
    }

    pub fn contains(&self, t: Time) -> bool {
        t >= self.start && t < self.end
    }

    fn validate(&self) -> Result<()> {
        if !(self.start.is_finite() && self.end.is_finite() && self.amplitude.is_finite()) {
            return Err(MimicError::InvalidParameter(format!("non-finite pulse {self:?}")));
        }
        if self.start >= self.end {
            return Err(MimicError::InvalidParameter(format!(
                "pulse window [{}, {}) is empty",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Injected current as a function of simulation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StimulusProtocol {
    /// No injected current
    Silent,
    /// Same current for the whole run
    Constant { amplitude: Current },
    /// One active window
    Step { start: Time, end: Time, amplitude: Current },
    /// Several disjoint windows, sorted by start
    Pulses { pulses: Vec<Pulse> },
}

impl Default for StimulusProtocol {
    fn default() -> Self {
        Self::Silent
    }
}

impl StimulusProtocol {
    pub fn step(start: Time, end: Time, amplitude: Current) -> Result<Self> {
        let protocol = Self::Step { start, end, amplitude };
        protocol.validate()?;
        Ok(protocol)
    }

    /// Multi-pulse protocol; windows are sorted and must not overlap.
    pub fn pulses(mut pulses: Vec<Pulse>) -> Result<Self> {
        pulses.sort_by(|a, b| a.start.total_cmp(&b.start));
        let protocol = Self::Pulses { pulses };
        protocol.validate()?;
        Ok(protocol)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Silent => Ok(()),
            Self::Constant { amplitude } => {
                if amplitude.is_finite() {
                    Ok(())
                } else {
                    Err(MimicError::InvalidParameter("non-finite amplitude".into()))
                }
            }
            Self::Step { start, end, amplitude } => Pulse::new(*start, *end, *amplitude).validate(),
            Self::Pulses { pulses } => {
                for pulse in pulses {
                    pulse.validate()?;
                }
                for pair in pulses.windows(2) {
                    if pair[1].start < pair[0].end {
                        return Err(MimicError::InvalidParameter(format!(
                            "pulse windows [{}, {}) and [{}, {}) overlap",
                            pair[0].start, pair[0].end, pair[1].start, pair[1].end
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Injected current at time `t` (ms)
    pub fn current_at(&self, t: Time) -> Current {
        match self {
            Self::Silent => 0.0,
            Self::Constant { amplitude } => *amplitude,
            Self::Step { start, end, amplitude } => {
                if t >= *start && t < *end {
                    *amplitude
                } else {
                    0.0
                }
            }
            Self::Pulses { pulses } => pulses
                .iter()
                .find(|p| p.contains(t))
                .map_or(0.0, |p| p.amplitude),
        }
    }
}

// =============================================================================
// INTEGRATION
// =============================================================================

/// Stateful driving loop: owns the current state and simulated time.
#[derive(Debug, Clone)]
pub struct Integrator {
    initial: NeuronState,
    state: NeuronState,
    params: Conductances,
    stimulus: StimulusProtocol,
    dt: Timestep,
    steps: u64,
}

impl Integrator {
    pub fn new(
        initial: NeuronState,
        params: Conductances,
        stimulus: StimulusProtocol,
        dt: Timestep,
    ) -> Result<Self> {
        stimulus.validate()?;
        if !initial.is_finite() {
            return Err(MimicError::InvalidParameter(format!(
                "non-finite initial state {initial:?}"
            )));
        }
        Ok(Self {
            initial,
            state: initial,
            params,
            stimulus,
            dt,
            steps: 0,
        })
    }

    /// Current simulated time (ms)
    pub fn time(&self) -> Time {
        self.steps as f64 * self.dt.get()
    }

    pub fn state(&self) -> NeuronState {
        self.state
    }

    pub fn params(&self) -> &Conductances {
        &self.params
    }

    pub fn stimulus(&self) -> &StimulusProtocol {
        &self.stimulus
    }

    pub fn dt(&self) -> Timestep {
        self.dt
    }

    /// Take one step. A non-finite result is reported and the state is
    /// left untouched.
    pub fn advance(&mut self) -> Result<NeuronState> {
        let t = self.time();
        let i = self.stimulus.current_at(t);
        let next = step(self.state, &self.params, i, self.dt);
        if !next.is_finite() {
            return Err(MimicError::NumericalDegeneracy(format!(
                "state became non-finite at t={t} ms (I={i}, from {:?})",
                self.state
            )));
        }
        self.state = next;
        self.steps += 1;
        Ok(next)
    }

    /// Step until simulated time reaches `target`. Returns the number of steps taken.
    pub fn run_until(&mut self, target: Time) -> Result<u64> {
        let eps = self.dt.get() * 1e-6;
        let mut taken = 0;
        while self.time() < target - eps {
            self.advance()?;
            taken += 1;
        }
        Ok(taken)
    }

    /// Step until `target`, appending every `record_every`-th state to `out`.
    pub fn record_until(&mut self, target: Time, record_every: u64, out: &mut Trajectory) -> Result<()> {
        let record_every = record_every.max(1);
        let eps = self.dt.get() * 1e-6;
        while self.time() < target - eps {
            self.advance()?;
            if self.steps % record_every == 0 {
                out.push(self.time(), self.state.v)?;
            }
        }
        Ok(())
    }

    /// Back to the initial condition at t = 0
    pub fn reset(&mut self) {
        self.state = self.initial;
        self.steps = 0;
    }
}

/// Sub-sampling of an integration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationOptions {
    /// Keep one sample every `record_every` steps
    pub record_every: u64,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self { record_every: 1 }
    }
}

/// Integrate from `initial` for `total_duration` ms, recording every step.
///
/// The first sample is the initial state at t = 0.
pub fn integrate(
    initial: NeuronState,
    params: &Conductances,
    stimulus: &StimulusProtocol,
    total_duration: Time,
    dt: Timestep,
) -> Result<Trajectory> {
    integrate_with(initial, params, stimulus, total_duration, dt, IntegrationOptions::default())
}

/// [`integrate`] with sub-sampling. The final state is always recorded.
pub fn integrate_with(
    initial: NeuronState,
    params: &Conductances,
    stimulus: &StimulusProtocol,
    total_duration: Time,
    dt: Timestep,
    options: IntegrationOptions,
) -> Result<Trajectory> {
    if !total_duration.is_finite() || total_duration < 0.0 {
        return Err(MimicError::InvalidParameter(format!(
            "duration {total_duration} ms must be finite and non-negative"
        )));
    }

    let steps = dt.steps_for(total_duration);
    let record_every = options.record_every.max(1);
    debug!(steps, dt = dt.get(), record_every, "integrating");

    let mut integrator = Integrator::new(initial, *params, stimulus.clone(), dt)?;
    let mut trajectory = Trajectory::with_capacity((steps / record_every) as usize + 2);
    trajectory.push(0.0, initial.v)?;
    integrator.record_until(total_duration, record_every, &mut trajectory)?;

    if let Some((last_t, _)) = trajectory.last() {
        if integrator.time() > last_t {
            trajectory.push(integrator.time(), integrator.state().v)?;
        }
    }

    Ok(trajectory)
}

// =============================================================================
// SPIKES
// =============================================================================

/// Default spike detection threshold (mV)
pub const SPIKE_THRESHOLD: Voltage = 0.0;

/// Times at which the voltage crosses `threshold` upward, interpolated
/// between the two samples that bracket the crossing.
pub fn detect_spikes(trajectory: &Trajectory, threshold: Voltage) -> Vec<Time> {
    trajectory
        .times
        .windows(2)
        .zip(trajectory.voltages.windows(2))
        .filter(|(_, v)| v[0] < threshold && v[1] >= threshold)
        .map(|(t, v)| t[0] + (threshold - v[0]) / (v[1] - v[0]) * (t[1] - t[0]))
        .collect()
}

/// Multi-unit raster dataset: trajectory `k` becomes neuron `k`.
pub fn spike_raster(trajectories: &[Trajectory], threshold: Voltage) -> Dataset {
    let mut spikes: Vec<SpikeEvent> = trajectories
        .iter()
        .enumerate()
        .flat_map(|(neuron, tr)| {
            detect_spikes(tr, threshold)
                .into_iter()
                .map(move |time| SpikeEvent::new(time, neuron))
        })
        .collect();
    spikes.sort_by(|a, b| a.time.total_cmp(&b.time));

    let duration = trajectories
        .iter()
        .filter_map(|tr| tr.last().map(|(t, _)| t))
        .fold(0.0, f64::max);

    Dataset::from_spikes(
        spikes,
        Some(trajectories.len().max(1)),
        (duration > 0.0).then_some(duration),
    )
}

/// Integrate several independent cells in parallel.
pub fn simulate_population(
    cells: &[(Conductances, StimulusProtocol)],
    total_duration: Time,
    dt: Timestep,
    options: IntegrationOptions,
) -> Result<Vec<Trajectory>> {
    cells
        .par_iter()
        .map(|(params, stimulus)| {
            integrate_with(NeuronState::RESTING, params, stimulus, total_duration, dt, options)
        })
        .collect()
}

// =============================================================================
// PROFILES
// =============================================================================

/// Preset cells driving the animated voltage panels
pub mod profiles {
    use super::*;
    use std::fmt;
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum CellProfile {
        /// Standard squid-axon cell under a 10 uA/cm^2 step
        WildType,
        /// Raised sodium conductance under a strong step
        Hyperexcitable,
        /// Raised potassium conductance, two pulses
        SlowPotassium,
        /// Extreme sodium conductance under a long step
        SodiumGainOfFunction,
    }

    impl CellProfile {
        pub fn all() -> &'static [Self] {
            &[
                Self::WildType,
                Self::Hyperexcitable,
                Self::SlowPotassium,
                Self::SodiumGainOfFunction,
            ]
        }

        pub fn name(&self) -> &'static str {
            match self {
                Self::WildType => "wild-type",
                Self::Hyperexcitable => "hyperexcitable",
                Self::SlowPotassium => "slow-potassium",
                Self::SodiumGainOfFunction => "sodium-gain-of-function",
            }
        }

        pub fn description(&self) -> &'static str {
            match self {
                Self::WildType => "gNa 120, gK 36, 10 uA/cm^2 on [10, 190) ms",
                Self::Hyperexcitable => "gNa 145, gK 36, 110 uA/cm^2 on [10, 190) ms",
                Self::SlowPotassium => "gNa 120, gK 52, 14 uA/cm^2 on [10, 90) and [110, 190) ms",
                Self::SodiumGainOfFunction => "gNa 400, gK 36, 15 uA/cm^2 on [20, 820) ms",
            }
        }

        pub fn conductances(&self) -> Conductances {
            let base = Conductances::default();
            match self {
                Self::WildType => base,
                Self::Hyperexcitable => base.with_sodium(145.0),
                Self::SlowPotassium => base.with_potassium(52.0),
                Self::SodiumGainOfFunction => base.with_sodium(400.0),
            }
        }

        pub fn stimulus(&self) -> StimulusProtocol {
            match self {
                Self::WildType => StimulusProtocol::Step { start: 10.0, end: 190.0, amplitude: 10.0 },
                Self::Hyperexcitable => StimulusProtocol::Step { start: 10.0, end: 190.0, amplitude: 110.0 },
                Self::SlowPotassium => StimulusProtocol::Pulses {
                    pulses: vec![Pulse::new(10.0, 90.0, 14.0), Pulse::new(110.0, 190.0, 14.0)],
                },
                Self::SodiumGainOfFunction => StimulusProtocol::Step { start: 20.0, end: 820.0, amplitude: 15.0 },
            }
        }

        /// Fresh integrator at the canonical resting state
        pub fn integrator(&self, dt: Timestep) -> Result<Integrator> {
            Integrator::new(NeuronState::RESTING, self.conductances(), self.stimulus(), dt)
        }
    }

    impl fmt::Display for CellProfile {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    impl FromStr for CellProfile {
        type Err = MimicError;

        fn from_str(s: &str) -> Result<Self> {
            let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
            Self::all()
                .iter()
                .copied()
                .find(|p| p.name() == wanted)
                .ok_or_else(|| MimicError::InvalidParameter(format!("unknown cell profile '{s}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::profiles::CellProfile;
    use super::*;

    #[test]
    fn test_rate_singularities_use_limits() {
        assert!((ALPHA_N.eval(-55.0) - 0.1).abs() < 1e-12);
        assert!((ALPHA_M.eval(-40.0) - 1.0).abs() < 1e-12);

        // continuous across the singular point
        assert!((ALPHA_N.eval(-55.0 + 1e-4) - 0.1).abs() < 1e-5);
        assert!((ALPHA_M.eval(-40.0 - 1e-4) - 1.0).abs() < 1e-4);

        let r = RateConstants::at(-65.0);
        for rate in [r.alpha_n, r.beta_n, r.alpha_m, r.beta_m, r.alpha_h, r.beta_h] {
            assert!(rate.is_finite() && rate > 0.0);
        }
    }

    #[test]
    fn test_canonical_gates_are_steady_state_at_minus_65() {
        let ss = NeuronState::steady_state(-65.0);
        assert!((ss.m - NeuronState::RESTING.m).abs() < 1e-3);
        assert!((ss.h - NeuronState::RESTING.h).abs() < 1e-3);
        assert!((ss.n - NeuronState::RESTING.n).abs() < 1e-3);
    }

    #[test]
    fn test_step_uses_pre_step_values() {
        let state = NeuronState::RESTING;
        let params = Conductances::default();
        let dt = Timestep::FINE;
        let next = step(state, &params, 5.0, dt);

        let r = RateConstants::at(state.v);
        let expected_m = state.m + 0.01 * (r.alpha_m * (1.0 - state.m) - r.beta_m * state.m);
        assert_eq!(next.m, expected_m);

        let expected_v = state.v + 0.01 * (5.0 - Currents::of(&state, &params).total());
        assert_eq!(next.v, expected_v);
    }

    #[test]
    fn test_step_is_pure() {
        let state = NeuronState::RESTING;
        let params = Conductances::default();
        let a = step(state, &params, 10.0, Timestep::COARSE);
        let b = step(state, &params, 10.0, Timestep::COARSE);
        assert_eq!(a, b);
        assert_eq!(state, NeuronState::RESTING);
    }

    #[test]
    fn test_step_at_singular_voltages_stays_finite() {
        let params = Conductances::default();
        for v in [-55.0, -40.0, -65.0] {
            let state = NeuronState { v, ..NeuronState::RESTING };
            assert!(step(state, &params, 0.0, Timestep::FINE).is_finite());
        }
    }

    #[test]
    fn test_timestep_bounds() {
        assert!(Timestep::new(0.01).is_ok());
        assert!(Timestep::new(0.05).is_ok());
        assert!(Timestep::new(0.051).is_err());
        assert!(Timestep::new(0.0).is_err());
        assert!(Timestep::new(-0.01).is_err());
        assert!(Timestep::new(f64::NAN).is_err());
        assert_eq!(Timestep::FINE.steps_for(200.0), 20_000);
        assert_eq!(Timestep::COARSE.steps_for(0.0), 0);
    }

    #[test]
    fn test_step_stimulus_window() {
        let s = StimulusProtocol::step(10.0, 190.0, 10.0).unwrap();
        assert_eq!(s.current_at(9.99), 0.0);
        assert_eq!(s.current_at(10.0), 10.0);
        assert_eq!(s.current_at(189.99), 10.0);
        assert_eq!(s.current_at(190.0), 0.0);
        assert!(StimulusProtocol::step(5.0, 5.0, 1.0).is_err());
    }

    #[test]
    fn test_pulses_sorted_and_disjoint() {
        let s = StimulusProtocol::pulses(vec![
            Pulse::new(110.0, 190.0, 14.0),
            Pulse::new(10.0, 90.0, 14.0),
        ])
        .unwrap();
        assert_eq!(s.current_at(50.0), 14.0);
        assert_eq!(s.current_at(100.0), 0.0);
        assert_eq!(s.current_at(150.0), 14.0);

        let overlapping = StimulusProtocol::pulses(vec![
            Pulse::new(10.0, 90.0, 1.0),
            Pulse::new(80.0, 120.0, 1.0),
        ]);
        assert!(matches!(overlapping, Err(MimicError::InvalidParameter(_))));
    }

    #[test]
    fn test_integrate_sample_layout() {
        let params = Conductances::default();
        let tr = integrate(NeuronState::RESTING, &params, &StimulusProtocol::Silent, 1.0, Timestep::FINE).unwrap();
        assert_eq!(tr.len(), 101);
        assert_eq!(tr.times[0], 0.0);
        assert_eq!(tr.voltages[0], -70.0);
        assert!((tr.times[100] - 1.0).abs() < 1e-9);
        assert!(tr.times.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_integrate_record_every_keeps_final_sample() {
        let params = Conductances::default();
        let tr = integrate_with(
            NeuronState::RESTING,
            &params,
            &StimulusProtocol::Silent,
            1.05,
            Timestep::FINE,
            IntegrationOptions { record_every: 10 },
        )
        .unwrap();
        // t = 0, 0.1 .. 1.0, then the tail at 1.05
        assert_eq!(tr.len(), 12);
        assert!((tr.times[11] - 1.05).abs() < 1e-9);
    }

    #[test]
    fn test_integrate_rejects_bad_duration() {
        let params = Conductances::default();
        let r = integrate(NeuronState::RESTING, &params, &StimulusProtocol::Silent, f64::INFINITY, Timestep::FINE);
        assert!(r.is_err());
    }

    #[test]
    fn test_integrator_reports_degeneracy() {
        let params = Conductances::default();
        let stim = StimulusProtocol::Constant { amplitude: 1e308 };
        let mut integrator = Integrator::new(NeuronState::RESTING, params, stim, Timestep::COARSE).unwrap();
        let result = integrator.run_until(10.0);
        assert!(matches!(result, Err(MimicError::NumericalDegeneracy(_))));
        assert!(integrator.state().is_finite());
    }

    #[test]
    fn test_integrator_reset() {
        let mut integrator = CellProfile::WildType.integrator(Timestep::FINE).unwrap();
        integrator.run_until(20.0).unwrap();
        assert!((integrator.time() - 20.0).abs() < 1e-9);
        integrator.reset();
        assert_eq!(integrator.time(), 0.0);
        assert_eq!(integrator.state(), NeuronState::RESTING);
    }

    #[test]
    fn test_detect_spikes_interpolates() {
        let tr = Trajectory {
            times: vec![0.0, 1.0, 2.0, 3.0, 4.0],
            voltages: vec![-65.0, -10.0, 30.0, -20.0, 10.0],
        };
        let spikes = detect_spikes(&tr, 0.0);
        assert_eq!(spikes.len(), 2);
        assert!((spikes[0] - 1.25).abs() < 1e-12);
        assert!((spikes[1] - 3.666_666_666_666_667).abs() < 1e-9);
    }

    #[test]
    fn test_spike_raster_from_population() {
        let cells: Vec<_> = [CellProfile::WildType, CellProfile::SlowPotassium]
            .iter()
            .map(|p| (p.conductances(), p.stimulus()))
            .collect();
        let trajectories =
            simulate_population(&cells, 200.0, Timestep::FINE, IntegrationOptions { record_every: 5 }).unwrap();
        let raster = spike_raster(&trajectories, SPIKE_THRESHOLD);

        assert_eq!(raster.neurons, Some(2));
        assert!((raster.duration.unwrap() - 200.0).abs() < 1e-6);
        let spikes = raster.spikes.unwrap();
        assert!(spikes.iter().any(|s| s.neuron == 0));
        assert!(spikes.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("wild-type".parse::<CellProfile>().unwrap(), CellProfile::WildType);
        assert_eq!("SLOW_POTASSIUM".parse::<CellProfile>().unwrap(), CellProfile::SlowPotassium);
        assert!("squid".parse::<CellProfile>().is_err());
        for profile in CellProfile::all() {
            assert!(profile.stimulus().validate().is_ok());
        }
    }
}
