//! # Trace-RS
//!
//! Voltage trace and spike raster rendering for Mimic datasets.
//!
//! ## Pipeline
//!
//! ```text
//! Dataset ──▶ Series (Trace | Raster) ──▶ TracePlot ──▶ RenderFrame ──▶ SVG / egui
//!                                            ▲
//!                              compare series + TimerService
//! ```
//!
//! - [`series`]: one-time classification and ms/s normalization
//! - [`mapping`]: time/voltage and time/neuron pixel mappings with ticks
//! - [`overlay`]: base/compare plot and the overlay fade lifecycle
//! - [`timers`]: cancellable one-shot timers behind a trait
//! - [`render`], [`svg`]: paint-ready output
//! - [`loader`], [`compare`], [`preview`]: dataset catalog, selection roles,
//!   CSV splitting and downsampling

pub mod compare;
pub mod loader;
pub mod mapping;
pub mod overlay;
pub mod preview;
pub mod render;
pub mod series;
pub mod svg;
pub mod timers;

pub use compare::{is_reference, ComparisonSelection, PlotRoles};
pub use loader::{Catalog, DatasetSource, DirectorySource, LoadState, LoadTicket, LoadTracker, Loaded, PreviewEntry};
pub use mapping::{RasterMapping, TraceMapping};
pub use overlay::{OverlayPhase, PlotSize, TracePlot, GRACE_PERIOD};
pub use preview::{downsample_dataset, minmax_downsample, split_csv, split_csv_file};
pub use render::{Geometry, Layer, Palette, Polyline, RenderFrame, Role, Stroke};
pub use series::{RasterSeries, Series, SeriesKind, TraceSeries};
pub use svg::render_svg;
pub use timers::{FrameTimers, TimerId, TimerService};
