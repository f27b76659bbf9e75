//! Paint-ready output of a plot.
//!
//! A [`RenderFrame`] carries pixel geometry, ticks, colors, and the overlay
//! visibility flag, so a drawing surface never recomputes a mapping.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::mapping::{RowGuide, Segment, Tick};
use crate::series::SeriesKind;

pub const ACCENT: &str = "#ff3b3b";
pub const MUTED: &str = "#e6e6e6";

/// Emphasis and de-emphasis colors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub accent: String,
    pub muted: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            accent: ACCENT.to_string(),
            muted: MUTED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: impl Into<String>, width: f32) -> Self {
        Self {
            color: color.into(),
            width,
        }
    }
}

/// Which series a layer draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Base,
    Overlay,
}

impl Palette {
    /// Stroke for a layer. The emphasized series is always in the accent
    /// color: the overlay when one is shown or pending, else the base.
    pub fn stroke(&self, role: Role, kind: SeriesKind, overlay_active: bool) -> Stroke {
        match (role, kind) {
            (Role::Overlay, SeriesKind::Trace) => Stroke::new(&self.accent, 1.8),
            (Role::Overlay, SeriesKind::Raster) => Stroke::new(&self.accent, 1.2),
            (Role::Base, SeriesKind::Trace) if overlay_active => Stroke::new(&self.muted, 1.2),
            (Role::Base, SeriesKind::Trace) => Stroke::new(&self.accent, 1.8),
            (Role::Base, SeriesKind::Raster) if overlay_active => Stroke::new(&self.muted, 1.0),
            (Role::Base, SeriesKind::Raster) => Stroke::new(&self.accent, 1.0),
        }
    }
}

/// Connected pixel points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<(f64, f64)>,
}

impl Polyline {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// `M x y L x y ...` with two decimals
    pub fn to_svg_path(&self) -> String {
        let mut d = String::with_capacity(self.points.len() * 16);
        for (i, (x, y)) in self.points.iter().enumerate() {
            if i > 0 {
                d.push(' ');
            }
            let cmd = if i == 0 { 'M' } else { 'L' };
            let _ = write!(d, "{cmd} {x:.2} {y:.2}");
        }
        d
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Path(Polyline),
    Marks(Vec<Segment>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub role: Role,
    pub stroke: Stroke,
    pub geometry: Geometry,
}

/// Everything needed to paint one plot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub kind: SeriesKind,
    pub width: f64,
    pub height: f64,
    /// Plot area as (left, top, right, bottom)
    pub plot_area: (f64, f64, f64, f64),
    pub x_ticks: Vec<Tick>,
    /// Voltage gridlines (traces only)
    pub y_ticks: Vec<Tick>,
    /// Row guides (rasters only)
    pub rows: Vec<RowGuide>,
    pub base: Layer,
    /// Overlay geometry, kept through the exit fade
    pub overlay: Option<Layer>,
    /// Overlay should be drawn at full opacity
    pub overlay_visible: bool,
    pub x_title: String,
    pub y_title: String,
}
