//! Pixel mappings for traces and rasters.
//!
//! All times are in seconds; tick labels are milliseconds.

use mimic_core::{SpikeEvent, Time, Voltage};
use serde::{Deserialize, Serialize};

use crate::series::{RasterSeries, TraceSeries};

/// Fixed display window for voltages (mV)
pub const VOLTAGE_DOMAIN: (Voltage, Voltage) = (-90.0, 60.0);
/// Spacing of horizontal gridlines (mV)
pub const VOLTAGE_TICK_STEP: Voltage = 20.0;
/// Spacing of time ticks (s)
pub const TIME_TICK_STEP: Time = 0.2;
/// Most tick intervals on a time axis; longer spans use a multiple of the step
pub const MAX_TIME_TICKS: usize = 100;
/// Narrowest trace plot (px)
pub const MIN_TRACE_WIDTH: f64 = 200.0;
/// Smallest raster inner extent (px)
pub const MIN_RASTER_INNER: f64 = 10.0;
/// Half height of a raster spike mark (px)
pub const SPIKE_MARK_HALF: f64 = 3.0;

const MIN_SPAN: f64 = 1e-12;
const TICK_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

pub const TRACE_PADDING: Padding = Padding {
    left: 48.0,
    right: 12.0,
    top: 12.0,
    bottom: 44.0,
};

pub const RASTER_PADDING: Padding = Padding {
    left: 44.0,
    right: 10.0,
    top: 8.0,
    bottom: 44.0,
};

/// Axis tick with its label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Data value (s or mV)
    pub value: f64,
    /// Pixel position along the axis
    pub position: f64,
    /// Pixel position of the label, kept inside the plot for x ticks
    pub label_position: f64,
    pub label: i64,
}

fn time_ticks(
    start: Time,
    end: Time,
    x: impl Fn(Time) -> f64,
    label_min: f64,
    label_max: f64,
) -> Vec<Tick> {
    let intervals = (end - start) / TIME_TICK_STEP;
    let stride = if intervals.is_finite() && intervals > MAX_TIME_TICKS as f64 {
        (intervals / MAX_TIME_TICKS as f64).ceil()
    } else {
        1.0
    };
    let step = TIME_TICK_STEP * stride;

    let mut ticks = Vec::new();
    // indexed so the step does not accumulate rounding
    for k in 0..=MAX_TIME_TICKS {
        let t = start + k as f64 * step;
        if t > end + TICK_EPS {
            break;
        }
        let position = x(t);
        ticks.push(Tick {
            value: t,
            position,
            label_position: position.max(label_min).min(label_max),
            label: (t * 1000.0).round() as i64,
        });
    }
    ticks
}

/// Mapping for a voltage trace (optionally with a compare trace)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceMapping {
    pub width: f64,
    pub height: f64,
    pub t0: Time,
    pub t1: Time,
}

impl TraceMapping {
    pub fn new(width: f64, height: f64, t0: Time, t1: Time) -> Self {
        Self {
            width: width.max(MIN_TRACE_WIDTH),
            height,
            t0,
            t1,
        }
    }

    /// Time domain spanning every given series (first to last sample)
    pub fn for_series<'a>(
        width: f64,
        height: f64,
        series: impl IntoIterator<Item = &'a TraceSeries>,
    ) -> Self {
        let (t0, t1) = series
            .into_iter()
            .map(TraceSeries::span)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
                (lo.min(a), hi.max(b))
            });
        if t0 > t1 {
            return Self::new(width, height, 0.0, 0.0);
        }
        Self::new(width, height, t0, t1)
    }

    pub fn padding(&self) -> Padding {
        TRACE_PADDING
    }

    pub fn inner_width(&self) -> f64 {
        self.width - TRACE_PADDING.left - TRACE_PADDING.right
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - TRACE_PADDING.top - TRACE_PADDING.bottom).max(0.0)
    }

    pub fn x(&self, t: Time) -> f64 {
        TRACE_PADDING.left + (t - self.t0) / (self.t1 - self.t0).max(MIN_SPAN) * self.inner_width()
    }

    pub fn y(&self, v: Voltage) -> f64 {
        let (lo, hi) = VOLTAGE_DOMAIN;
        TRACE_PADDING.top + (1.0 - (v - lo) / (hi - lo)) * self.inner_height()
    }

    /// Pixel points of a trace
    pub fn points(&self, trace: &TraceSeries) -> Vec<(f64, f64)> {
        trace
            .times
            .iter()
            .zip(&trace.voltages)
            .map(|(&t, &v)| (self.x(t), self.y(v)))
            .collect()
    }

    /// Ticks every 200 ms from the multiple of 200 ms at or below `t0`
    /// (never negative) through `t1`. Long spans widen the step to a
    /// multiple of 200 ms.
    pub fn x_ticks(&self) -> Vec<Tick> {
        let start = ((self.t0 / TIME_TICK_STEP).floor() * TIME_TICK_STEP).max(0.0);
        time_ticks(
            start,
            self.t1,
            |t| self.x(t),
            TRACE_PADDING.left + 6.0,
            self.width - TRACE_PADDING.right - 6.0,
        )
    }

    /// Gridlines every 20 mV across the fixed voltage window
    pub fn y_ticks(&self) -> Vec<Tick> {
        let (lo, hi) = VOLTAGE_DOMAIN;
        let count = ((hi - lo) / VOLTAGE_TICK_STEP + 1e-4).floor() as usize;
        (0..=count)
            .map(|k| {
                let v = lo + k as f64 * VOLTAGE_TICK_STEP;
                let position = self.y(v);
                Tick {
                    value: v,
                    position,
                    label_position: position,
                    label: v.round() as i64,
                }
            })
            .collect()
    }
}

/// Horizontal guide behind one raster row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowGuide {
    pub neuron: usize,
    pub y: f64,
    /// Every fifth row is drawn stronger
    pub emphasized: bool,
}

/// Vertical segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x: f64,
    pub y0: f64,
    pub y1: f64,
}

/// Mapping for a spike raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterMapping {
    pub width: f64,
    pub height: f64,
    pub neurons: usize,
    pub duration: Time,
}

impl RasterMapping {
    pub fn new(width: f64, height: f64, neurons: usize, duration: Time) -> Self {
        Self {
            width,
            height,
            neurons: neurons.max(1),
            duration,
        }
    }

    /// Rows and duration covering every given raster
    pub fn for_series<'a>(
        width: f64,
        height: f64,
        series: impl IntoIterator<Item = &'a RasterSeries>,
    ) -> Self {
        let (neurons, duration) = series
            .into_iter()
            .fold((1, 0.0_f64), |(n, d), r| (n.max(r.neurons), d.max(r.duration)));
        Self::new(width, height, neurons, if duration > 0.0 { duration } else { 1.0 })
    }

    pub fn padding(&self) -> Padding {
        RASTER_PADDING
    }

    pub fn inner_width(&self) -> f64 {
        (self.width - RASTER_PADDING.left - RASTER_PADDING.right).max(MIN_RASTER_INNER)
    }

    pub fn inner_height(&self) -> f64 {
        (self.height - RASTER_PADDING.top - RASTER_PADDING.bottom).max(MIN_RASTER_INNER)
    }

    pub fn x(&self, t: Time) -> f64 {
        RASTER_PADDING.left + t / self.duration.max(MIN_SPAN) * self.inner_width()
    }

    pub fn y(&self, neuron: usize) -> f64 {
        let rows = self.neurons.saturating_sub(1).max(1) as f64;
        RASTER_PADDING.top + neuron as f64 / rows * self.inner_height()
    }

    /// Vertical mark for one spike
    pub fn mark(&self, spike: &SpikeEvent) -> Segment {
        let x = self.x(spike.time);
        let y = self.y(spike.neuron);
        Segment {
            x,
            y0: y - SPIKE_MARK_HALF,
            y1: y + SPIKE_MARK_HALF,
        }
    }

    pub fn marks(&self, raster: &RasterSeries) -> Vec<Segment> {
        raster.spikes.iter().map(|s| self.mark(s)).collect()
    }

    pub fn rows(&self) -> Vec<RowGuide> {
        (0..self.neurons)
            .map(|neuron| RowGuide {
                neuron,
                y: self.y(neuron),
                emphasized: neuron % 5 == 0,
            })
            .collect()
    }

    /// Ticks every 200 ms from 0 through the duration
    pub fn x_ticks(&self) -> Vec<Tick> {
        time_ticks(
            0.0,
            self.duration,
            |t| self.x(t),
            RASTER_PADDING.left + 6.0,
            self.width - RASTER_PADDING.right - 6.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(times: &[f64]) -> TraceSeries {
        TraceSeries::new(times, &vec![-65.0; times.len()]).unwrap()
    }

    #[test]
    fn test_trace_mapping_corners() {
        let m = TraceMapping::new(900.0, 260.0, 0.0, 1.0);
        assert_eq!(m.x(0.0), 48.0);
        assert_eq!(m.x(1.0), 888.0);
        assert_eq!(m.y(60.0), 12.0);
        assert_eq!(m.y(-90.0), 216.0);
    }

    #[test]
    fn test_trace_width_clamped() {
        let m = TraceMapping::new(50.0, 260.0, 0.0, 1.0);
        assert_eq!(m.width, 200.0);
        assert_eq!(m.inner_width(), 140.0);
    }

    #[test]
    fn test_degenerate_time_range_is_finite() {
        let m = TraceMapping::for_series(900.0, 260.0, [&trace(&[0.3])]);
        assert_eq!(m.t0, m.t1);
        assert!(m.x(0.3).is_finite());
        assert_eq!(m.x(0.3), 48.0);
    }

    #[test]
    fn test_domain_is_union() {
        let a = trace(&[0.1, 0.5]);
        let b = trace(&[0.0, 0.9]);
        let m = TraceMapping::for_series(900.0, 260.0, [&a, &b]);
        assert_eq!((m.t0, m.t1), (0.0, 0.9));
    }

    #[test]
    fn test_x_ticks_every_200ms() {
        let m = TraceMapping::new(900.0, 260.0, 0.05, 1.0);
        let labels: Vec<i64> = m.x_ticks().iter().map(|t| t.label).collect();
        assert_eq!(labels, vec![0, 200, 400, 600, 800, 1000]);

        let first = m.x_ticks()[0];
        assert!(first.position < 48.0);
        assert_eq!(first.label_position, 54.0);
    }

    #[test]
    fn test_x_ticks_never_negative() {
        let m = TraceMapping::new(900.0, 260.0, -0.5, 0.3);
        let ticks = m.x_ticks();
        assert_eq!(ticks[0].value, 0.0);
        assert_eq!(ticks.len(), 2);
    }

    #[test]
    fn test_long_span_widens_tick_step() {
        let m = TraceMapping::new(900.0, 260.0, 0.0, 1e7);
        let ticks = m.x_ticks();
        assert!(ticks.len() > 50 && ticks.len() <= MAX_TIME_TICKS + 1);
        assert_eq!(ticks[0].label, 0);
        assert_eq!(ticks[1].label % 200, 0);
        assert!(ticks.last().unwrap().value <= 1e7 + 1e-6);

        let r = RasterMapping::new(760.0, 360.0, 4, 1e9);
        assert!(r.x_ticks().len() <= MAX_TIME_TICKS + 1);
    }

    #[test]
    fn test_y_ticks_fixed() {
        let m = TraceMapping::new(900.0, 260.0, 0.0, 1.0);
        let labels: Vec<i64> = m.y_ticks().iter().map(|t| t.label).collect();
        assert_eq!(labels, vec![-90, -70, -50, -30, -10, 10, 30, 50]);
    }

    #[test]
    fn test_raster_mapping() {
        let m = RasterMapping::new(760.0, 360.0, 11, 2.0);
        assert_eq!(m.y(0), 8.0);
        assert_eq!(m.y(10), 8.0 + m.inner_height());
        assert_eq!(m.x(1.0), 44.0 + 353.0);

        let mark = m.mark(&SpikeEvent::new(1.0, 0));
        assert_eq!((mark.y0, mark.y1), (5.0, 11.0));

        let rows = m.rows();
        assert_eq!(rows.len(), 11);
        assert!(rows[0].emphasized && rows[5].emphasized && !rows[3].emphasized);
    }

    #[test]
    fn test_raster_single_row_and_tiny_size() {
        let m = RasterMapping::new(20.0, 20.0, 1, 1.0);
        assert_eq!(m.inner_width(), 10.0);
        assert_eq!(m.inner_height(), 10.0);
        assert_eq!(m.y(0), 8.0);
    }

    #[test]
    fn test_raster_ticks_from_zero() {
        let m = RasterMapping::new(760.0, 360.0, 4, 1.0);
        let labels: Vec<i64> = m.x_ticks().iter().map(|t| t.label).collect();
        assert_eq!(labels, vec![0, 200, 400, 600, 800, 1000]);
    }
}
