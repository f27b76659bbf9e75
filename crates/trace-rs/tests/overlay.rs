//! Unit normalization and overlay lifecycle of the trace plot

use std::time::Duration;

use mimic_core::{Dataset, SpikeEvent, TimeUnit};
use mimic_trace::*;

fn trace_dataset(times: Vec<f64>, v: f64) -> Dataset {
    let voltages = vec![v; times.len()];
    Dataset {
        times: Some(times),
        voltages: Some(voltages),
        ..Dataset::default()
    }
}

fn series(times: Vec<f64>, v: f64) -> Series {
    Series::from_dataset(&trace_dataset(times, v)).unwrap()
}

fn plot() -> TracePlot {
    TracePlot::new(PlotSize::default(), Palette::default())
}

fn base_voltage(plot: &TracePlot) -> f64 {
    plot.base().and_then(Series::as_trace).unwrap().voltages[0]
}

/// Frames of 16 ms until the mount countdown has run
fn mount(plot: &mut TracePlot) {
    plot.on_frame(Duration::from_millis(16));
    plot.on_frame(Duration::from_millis(16));
}

#[test]
fn milliseconds_and_seconds_map_identically() {
    let ms: Vec<f64> = (0..=100).map(|i| i as f64 * 10.0).collect();
    let s: Vec<f64> = ms.iter().map(|t| t / 1000.0).collect();

    let a = series(ms, -65.0);
    let b = series(s, -65.0);
    assert_eq!(a.unit(), TimeUnit::Milliseconds);
    assert_eq!(b.unit(), TimeUnit::Seconds);

    let mut pa = plot();
    pa.set_base(Some(a));
    let mut pb = plot();
    pb.set_base(Some(b));
    assert_eq!(pa.frame().unwrap().base, pb.frame().unwrap().base);
    assert_eq!(pa.frame().unwrap().x_ticks, pb.frame().unwrap().x_ticks);
}

#[test]
fn base_and_compare_normalized_independently() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1000.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    let frame = p.frame().unwrap();
    let last_x = |layer: &Layer| match &layer.geometry {
        Geometry::Path(line) => line.points.last().unwrap().0,
        Geometry::Marks(_) => unreachable!(),
    };
    assert_eq!(last_x(&frame.base), last_x(frame.overlay.as_ref().unwrap()));
}

#[test]
fn overlay_lifecycle() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    assert_eq!(p.phase(), OverlayPhase::Absent);

    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    assert_eq!(p.phase(), OverlayPhase::FadingIn);
    mount(&mut p);
    assert!(p.overlay_visible());
    p.on_transition_end();
    assert_eq!(p.phase(), OverlayPhase::Visible);

    p.set_compare(None);
    assert_eq!(p.phase(), OverlayPhase::FadingOut);
    assert!(!p.overlay_visible());
    assert!(p.overlay().is_some());

    p.on_frame(Duration::from_millis(259));
    assert_eq!(p.phase(), OverlayPhase::FadingOut);
    assert!(p.overlay().is_some());

    p.on_frame(Duration::from_millis(1));
    assert_eq!(p.phase(), OverlayPhase::Absent);
    assert!(p.overlay().is_none());
    assert_eq!(p.timers().pending(), 0);

    // removing again changes nothing
    p.set_compare(None);
    assert_eq!(p.phase(), OverlayPhase::Absent);
    assert_eq!(p.timers().pending(), 0);
}

#[test]
fn retrigger_restarts_grace_period() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    mount(&mut p);

    p.set_compare(None);
    p.on_frame(Duration::from_millis(200));
    p.set_show_compare(false);
    p.set_show_compare(true);
    assert_eq!(p.phase(), OverlayPhase::FadingOut);
    assert_eq!(p.timers().pending(), 1);

    p.on_frame(Duration::from_millis(200));
    assert_eq!(p.phase(), OverlayPhase::FadingOut);
    p.on_frame(Duration::from_millis(60));
    assert_eq!(p.phase(), OverlayPhase::Absent);
}

#[test]
fn compare_returning_during_fade_out_fades_back_in() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    mount(&mut p);
    p.set_compare(None);

    p.set_compare(Some(series(vec![0.0, 1.0], -50.0)));
    assert_eq!(p.phase(), OverlayPhase::FadingIn);
    assert_eq!(p.timers().pending(), 0);

    p.on_frame(Duration::from_millis(500));
    assert!(p.overlay().is_some());
}

#[test]
fn base_swap_waits_for_fade_out() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    mount(&mut p);
    p.set_compare(None);

    p.set_base(Some(series(vec![0.0, 1.0], -10.0)));
    assert_eq!(base_voltage(&p), -65.0);
    p.set_base(Some(series(vec![0.0, 1.0], -20.0)));
    assert_eq!(base_voltage(&p), -65.0);

    p.on_frame(Duration::from_millis(100));
    assert_eq!(base_voltage(&p), -65.0);

    p.on_frame(Duration::from_millis(160));
    assert_eq!(p.phase(), OverlayPhase::Absent);
    assert_eq!(base_voltage(&p), -20.0);
    assert!(p.pending_base().is_none());

    p.on_frame(Duration::from_millis(1000));
    assert_eq!(base_voltage(&p), -20.0);
}

#[test]
fn hiding_reference_defers_selection_swap() {
    // reference as base, selection as overlay; then the reference is hidden
    let mut p = plot();
    p.set_series(Some(series(vec![0.0, 1.0], -65.0)), Some(series(vec![0.0, 1.0], -30.0)));
    mount(&mut p);

    p.set_series(Some(series(vec![0.0, 1.0], -30.0)), None);
    assert_eq!(p.phase(), OverlayPhase::FadingOut);
    assert_eq!(base_voltage(&p), -65.0);

    p.on_frame(Duration::from_millis(260));
    assert_eq!(base_voltage(&p), -30.0);
}

#[test]
fn cleared_selection_during_fade_out_clears_base() {
    let mut p = plot();
    p.set_series(Some(series(vec![0.0, 1.0], -65.0)), Some(series(vec![0.0, 1.0], -40.0)));
    mount(&mut p);

    p.set_series(Some(series(vec![0.0, 1.0], -30.0)), None);
    p.set_series(None, None);
    assert_eq!(base_voltage(&p), -65.0);
    assert!(matches!(p.pending_base(), Some(None)));

    p.on_frame(Duration::from_millis(300));
    assert_eq!(p.phase(), OverlayPhase::Absent);
    assert!(p.base().is_none());
    assert!(p.pending_base().is_none());
    assert!(p.frame().is_none());
}

#[test]
fn deferred_clear_applies_when_compare_returns() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    mount(&mut p);
    p.set_compare(None);

    p.set_base(None);
    assert_eq!(base_voltage(&p), -65.0);

    p.set_compare(Some(series(vec![0.0, 1.0], -50.0)));
    assert_eq!(p.phase(), OverlayPhase::FadingIn);
    assert!(p.base().is_none());
    assert!(p.pending_base().is_none());
}

#[test]
fn base_swap_applies_immediately_with_compare_shown() {
    let mut p = plot();
    p.set_base(Some(series(vec![0.0, 1.0], -65.0)));
    p.set_compare(Some(series(vec![0.0, 1.0], -60.0)));
    p.set_base(Some(series(vec![0.0, 1.0], -40.0)));
    assert_eq!(base_voltage(&p), -40.0);
    assert_eq!(p.phase(), OverlayPhase::FadingIn);
}

#[test]
fn raster_overlay_uses_shared_rows() {
    let base = Dataset::from_spikes(vec![SpikeEvent::new(0.1, 0), SpikeEvent::new(0.5, 3)], None, None);
    let compare = Dataset::from_spikes(vec![SpikeEvent::new(0.8, 9)], None, None);

    let mut p = plot();
    p.set_base(Some(Series::from_dataset(&base).unwrap()));
    p.set_compare(Some(Series::from_dataset(&compare).unwrap()));
    mount(&mut p);

    let frame = p.frame().unwrap();
    assert_eq!(frame.kind, SeriesKind::Raster);
    assert_eq!(frame.rows.len(), 10);
    assert_eq!(frame.base.stroke.color, "#e6e6e6");
    assert!(frame.overlay_visible);
    match &frame.overlay.unwrap().geometry {
        Geometry::Marks(marks) => {
            assert_eq!(marks.len(), 1);
            // last row, end of the shared duration
            assert_eq!(marks[0].x, frame.plot_area.2);
            assert_eq!(marks[0].y0 + 3.0, frame.plot_area.3);
        }
        Geometry::Path(_) => panic!("raster overlay drawn as path"),
    }
}

#[test]
fn malformed_dataset_produces_no_series() {
    let ds = Dataset {
        times: Some(vec![0.0, 1.0]),
        voltages: Some(vec![-65.0]),
        ..Dataset::default()
    };
    assert!(Series::from_dataset(&ds).is_err());
}

mod props {
    use super::*;
    use proptest::prelude::*;

    fn trace_frame(times: Vec<f64>, voltages: Vec<f64>) -> RenderFrame {
        let dataset = Dataset {
            times: Some(times),
            voltages: Some(voltages),
            ..Dataset::default()
        };
        let mut p = plot();
        p.set_base(Some(Series::from_dataset(&dataset).unwrap()));
        p.frame().unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_seconds_input_matches_milliseconds(
            samples in prop::collection::vec((0.0f64..50_000.0, -90.0f64..60.0), 1..40),
            peak in 50.5f64..=50_000.0,
        ) {
            let mut samples = samples;
            samples.push((peak, -65.0));
            samples.sort_by(|a, b| a.0.total_cmp(&b.0));
            let (ms, voltages): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
            let s: Vec<f64> = ms.iter().map(|t| t / 1000.0).collect();

            let in_ms = Series::from_dataset(&trace_dataset(ms.clone(), -65.0)).unwrap();
            let in_s = Series::from_dataset(&trace_dataset(s.clone(), -65.0)).unwrap();
            prop_assert_eq!(in_ms.unit(), TimeUnit::Milliseconds);
            prop_assert_eq!(in_s.unit(), TimeUnit::Seconds);

            let a = trace_frame(ms, voltages.clone());
            let b = trace_frame(s, voltages);
            prop_assert_eq!(&a.base, &b.base);
            prop_assert_eq!(&a.x_ticks, &b.x_ticks);
        }
    }
}
