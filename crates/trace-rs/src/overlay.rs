//! Base/compare plot with an animated overlay lifecycle.
//!
//! ```text
//!   Absent ──compare shown──▶ FadingIn ──transition end──▶ Visible
//!     ▲                          │                            │
//!     │                          └──────compare hidden────────┤
//!     │                                                       ▼
//!     └──────────────grace period elapsed─────────────── FadingOut
//! ```
//!
//! The overlay becomes visible two frames after its geometry appears, so a
//! drawing surface can animate from zero opacity. On exit the geometry is
//! kept for [`GRACE_PERIOD`] and a base swap requested meanwhile waits for
//! the geometry to clear.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::mapping::{RasterMapping, TraceMapping, RASTER_PADDING, TRACE_PADDING};
use crate::render::{Geometry, Layer, Palette, Polyline, RenderFrame, Role};
use crate::series::{Series, SeriesKind};
use crate::timers::{FrameTimers, TimerId, TimerService};

/// How long overlay geometry outlives its removal
pub const GRACE_PERIOD: Duration = Duration::from_millis(260);

/// Frames between overlay mount and the visibility flag flipping on
pub const MOUNT_FRAMES: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayPhase {
    Absent,
    FadingIn,
    Visible,
    FadingOut,
}

impl OverlayPhase {
    /// Overlay geometry exists in this phase
    pub fn has_geometry(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Plot geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PlotSize {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 260.0,
        }
    }
}

/// A base series with an optional compare overlay.
#[derive(Debug, Clone)]
pub struct TracePlot<T: TimerService = FrameTimers> {
    size: PlotSize,
    palette: Palette,
    base: Option<Series>,
    /// `Some(None)` is a deferred clear
    pending_base: Option<Option<Series>>,
    compare: Option<Series>,
    show_compare: bool,
    overlay: Option<Series>,
    phase: OverlayPhase,
    overlay_visible: bool,
    mount_frames: u8,
    fade_timer: Option<TimerId>,
    timers: T,
}

impl TracePlot<FrameTimers> {
    pub fn new(size: PlotSize, palette: Palette) -> Self {
        Self::with_timers(size, palette, FrameTimers::new())
    }

    /// Per-frame hook: mount countdown, then timers due after `elapsed`.
    pub fn on_frame(&mut self, elapsed: Duration) {
        self.tick_frame();
        for id in self.timers.advance(elapsed) {
            self.on_timer(id);
        }
    }
}

impl<T: TimerService> TracePlot<T> {
    pub fn with_timers(size: PlotSize, palette: Palette, timers: T) -> Self {
        Self {
            size,
            palette,
            base: None,
            pending_base: None,
            compare: None,
            show_compare: true,
            overlay: None,
            phase: OverlayPhase::Absent,
            overlay_visible: false,
            mount_frames: 0,
            fade_timer: None,
            timers,
        }
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    /// Series currently drawn as the base
    pub fn base(&self) -> Option<&Series> {
        self.base.as_ref()
    }

    /// Series whose overlay geometry is held, including during the exit fade
    pub fn overlay(&self) -> Option<&Series> {
        self.overlay.as_ref()
    }

    /// Base requested while the overlay was fading out. `Some(None)` means
    /// the base is cleared once the overlay is gone.
    pub fn pending_base(&self) -> Option<Option<&Series>> {
        self.pending_base.as_ref().map(Option::as_ref)
    }

    pub fn show_compare(&self) -> bool {
        self.show_compare
    }

    pub fn size(&self) -> PlotSize {
        self.size
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn resize(&mut self, size: PlotSize) {
        self.size = size;
    }

    /// Replace the base series. While the overlay is fading out the swap
    /// waits for the grace period to end.
    pub fn set_base(&mut self, series: Option<Series>) {
        if self.defers_base() {
            debug!(clear = series.is_none(), "base swap deferred until overlay clears");
            self.pending_base = Some(series);
            return;
        }
        self.pending_base = None;
        self.base = series;
        self.sync_overlay();
    }

    pub fn set_compare(&mut self, series: Option<Series>) {
        self.compare = series;
        self.sync_overlay();
    }

    pub fn set_show_compare(&mut self, show: bool) {
        if self.show_compare != show {
            self.show_compare = show;
            self.sync_overlay();
        }
    }

    /// Replace base and compare together, as a selection change does.
    pub fn set_series(&mut self, base: Option<Series>, compare: Option<Series>) {
        self.compare = compare;
        if self.defers_base() {
            debug!(clear = base.is_none(), "base swap deferred until overlay clears");
            self.pending_base = Some(base);
        } else {
            self.pending_base = None;
            self.base = base;
        }
        self.sync_overlay();
    }

    /// Overlay geometry is on screen but about to leave
    fn defers_base(&self) -> bool {
        self.overlay.is_some() && !self.compare_active()
    }

    /// Compare series that should be overlaid right now
    fn effective_compare(&self) -> Option<&Series> {
        if !self.show_compare {
            return None;
        }
        let compare = self.compare.as_ref()?;
        match &self.base {
            Some(base) if base.kind() != compare.kind() => None,
            _ => Some(compare),
        }
    }

    fn compare_active(&self) -> bool {
        self.effective_compare().is_some()
    }

    fn sync_overlay(&mut self) {
        // a retrigger always restarts the grace period
        if let Some(id) = self.fade_timer.take() {
            self.timers.cancel(id);
        }

        if let (Some(base), Some(compare)) = (&self.base, &self.compare) {
            if self.show_compare && base.kind() != compare.kind() {
                warn!(
                    base = ?base.kind(),
                    compare = ?compare.kind(),
                    "compare series kind differs from base, not overlaid"
                );
            }
        }

        if let Some(compare) = self.effective_compare().cloned() {
            self.overlay = Some(compare);
            if let Some(base) = self.pending_base.take() {
                self.base = base;
            }
            if matches!(self.phase, OverlayPhase::Absent | OverlayPhase::FadingOut) {
                debug!(from = ?self.phase, "overlay fading in");
                self.phase = OverlayPhase::FadingIn;
                self.overlay_visible = false;
                self.mount_frames = MOUNT_FRAMES;
            }
        } else if self.overlay.is_some() {
            debug!(from = ?self.phase, "overlay fading out");
            self.phase = OverlayPhase::FadingOut;
            self.overlay_visible = false;
            self.mount_frames = 0;
            self.fade_timer = Some(self.timers.schedule(GRACE_PERIOD));
        }
    }

    /// Count down the mount frames of an entering overlay.
    pub fn tick_frame(&mut self) {
        if self.phase == OverlayPhase::FadingIn && self.mount_frames > 0 {
            self.mount_frames -= 1;
            if self.mount_frames == 0 {
                self.overlay_visible = true;
            }
        }
    }

    /// The drawing surface finished the fade-in animation.
    pub fn on_transition_end(&mut self) {
        if self.phase == OverlayPhase::FadingIn && self.overlay_visible {
            self.phase = OverlayPhase::Visible;
        }
    }

    /// A scheduled timer fired. Returns `false` for timers this plot does
    /// not own (cancelled or superseded).
    pub fn on_timer(&mut self, id: TimerId) -> bool {
        if self.fade_timer != Some(id) {
            return false;
        }
        self.fade_timer = None;
        self.overlay = None;
        self.phase = OverlayPhase::Absent;
        debug!("overlay cleared");
        if let Some(base) = self.pending_base.take() {
            debug!(clear = base.is_none(), "applying deferred base");
            self.base = base;
        }
        true
    }

    /// Base is drawn de-emphasized
    fn overlay_active(&self) -> bool {
        self.overlay.is_some() || self.compare_active()
    }

    /// Paint-ready geometry, or `None` without a base series.
    pub fn frame(&self) -> Option<RenderFrame> {
        let base = self.base.as_ref()?;
        let active = self.overlay_active();
        let overlay = self.overlay.as_ref().filter(|o| o.kind() == base.kind());

        let frame = match base {
            Series::Trace(trace) => {
                let overlay_trace = overlay.and_then(Series::as_trace);
                let mapping = TraceMapping::for_series(
                    self.size.width,
                    self.size.height,
                    std::iter::once(trace).chain(overlay_trace),
                );
                let layer = |role, points| Layer {
                    role,
                    stroke: self.palette.stroke(role, SeriesKind::Trace, active),
                    geometry: Geometry::Path(Polyline::new(points)),
                };
                RenderFrame {
                    kind: SeriesKind::Trace,
                    width: mapping.width,
                    height: mapping.height,
                    plot_area: (
                        TRACE_PADDING.left,
                        TRACE_PADDING.top,
                        mapping.width - TRACE_PADDING.right,
                        mapping.height - TRACE_PADDING.bottom,
                    ),
                    x_ticks: mapping.x_ticks(),
                    y_ticks: mapping.y_ticks(),
                    rows: Vec::new(),
                    base: layer(Role::Base, mapping.points(trace)),
                    overlay: overlay_trace.map(|o| layer(Role::Overlay, mapping.points(o))),
                    overlay_visible: self.overlay_visible,
                    x_title: "Time (ms)".into(),
                    y_title: "Voltage (mV)".into(),
                }
            }
            Series::Raster(raster) => {
                let overlay_raster = overlay.and_then(Series::as_raster);
                let mapping = RasterMapping::for_series(
                    self.size.width,
                    self.size.height,
                    std::iter::once(raster).chain(overlay_raster),
                );
                let layer = |role, marks| Layer {
                    role,
                    stroke: self.palette.stroke(role, SeriesKind::Raster, active),
                    geometry: Geometry::Marks(marks),
                };
                RenderFrame {
                    kind: SeriesKind::Raster,
                    width: mapping.width,
                    height: mapping.height,
                    plot_area: (
                        RASTER_PADDING.left,
                        RASTER_PADDING.top,
                        RASTER_PADDING.left + mapping.inner_width(),
                        RASTER_PADDING.top + mapping.inner_height(),
                    ),
                    x_ticks: mapping.x_ticks(),
                    y_ticks: Vec::new(),
                    rows: mapping.rows(),
                    base: layer(Role::Base, mapping.marks(raster)),
                    overlay: overlay_raster.map(|o| layer(Role::Overlay, mapping.marks(o))),
                    overlay_visible: self.overlay_visible,
                    x_title: "Time (ms)".into(),
                    y_title: "Neuron".into(),
                }
            }
        };
        Some(frame)
    }
}
