//! # Mimic GUI
//!
//! Graphical interface for membrane-potential previews.
//!
//! Features:
//! - Live sweeping voltage traces of the preset cells, integrated per frame
//! - Dataset directory browser with wild-type comparison overlay
//! - Trajectory export to JSON or CSV

mod paint;

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use egui_plot::{Line, Plot, PlotPoints, VLine};
use mimic_core::{Dataset, Metadata, Trajectory};
use mimic_hh::profiles::CellProfile;
use mimic_hh::sweep::{SweepConfig, SweepDriver};
use mimic_hh::Timestep;
use mimic_trace::{
    split_csv_file, Catalog, ComparisonSelection, DatasetSource, DirectorySource, LoadState, LoadTicket, LoadTracker,
    OverlayPhase, Palette, PlotSize, TracePlot, GRACE_PERIOD,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const PLOT_HEIGHT: f64 = 260.0;
const MIN_PLOT_WIDTH: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum View {
    #[default]
    Sweep,
    Datasets,
}

/// Which tracker a background load belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Reference,
    Selected,
}

struct LoadMsg {
    slot: Slot,
    ticket: LoadTicket,
    result: mimic_core::Result<Dataset>,
}

/// Application state
struct MimicApp {
    // UI state
    view: View,
    dark_mode: bool,
    show_log: bool,
    started: Instant,
    output_log: String,
    status_message: String,

    // Live sweep
    driver: SweepDriver,
    running: bool,
    export_lane: usize,

    // Datasets
    directory: Option<PathBuf>,
    catalog: Catalog,
    selection: ComparisonSelection,
    reference_load: LoadTracker,
    selected_load: LoadTracker,
    tx: Sender<LoadMsg>,
    rx: Receiver<LoadMsg>,
    plot: TracePlot,
}

impl MimicApp {
    fn new(cc: &eframe::CreationContext<'_>) -> anyhow::Result<Self> {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        cc.egui_ctx.set_style(style);

        let driver = SweepDriver::with_profiles(SweepConfig::default(), CellProfile::all(), Timestep::FINE)?;
        let (tx, rx) = mpsc::channel();

        Ok(Self {
            view: View::default(),
            dark_mode: true,
            show_log: true,
            started: Instant::now(),
            output_log: String::new(),
            status_message: "Ready".into(),
            driver,
            running: true,
            export_lane: 0,
            directory: None,
            catalog: Catalog::default(),
            selection: ComparisonSelection::new(None),
            reference_load: LoadTracker::new(),
            selected_load: LoadTracker::new(),
            tx,
            rx,
            plot: TracePlot::new(
                PlotSize {
                    width: 900.0,
                    height: PLOT_HEIGHT,
                },
                Palette::default(),
            ),
        })
    }

    fn log(&mut self, message: &str) {
        use std::fmt::Write;
        let timestamp = format!("[{:.1}s] ", self.started.elapsed().as_secs_f64());
        writeln!(self.output_log, "{}{}", timestamp, message).ok();
    }

    fn report(&mut self, status: String) {
        self.log(&status);
        self.status_message = status;
    }

    // ---------------------------------------------------------------------
    // Datasets
    // ---------------------------------------------------------------------

    fn pick_directory(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
            self.open_directory(dir);
        }
    }

    fn open_directory(&mut self, dir: PathBuf) {
        match Catalog::scan(&DirectorySource::new(&dir)) {
            Ok(catalog) => {
                info!(dir = %dir.display(), datasets = catalog.len(), "catalog opened");
                let reference = catalog.reference().map(|e| e.id.clone());
                self.report(format!("Opened {} ({} datasets)", dir.display(), catalog.len()));
                if let Some(id) = &reference {
                    self.log(&format!("Reference: {id}"));
                }
                self.catalog = catalog;
                self.directory = Some(dir);
                self.selection = ComparisonSelection::new(reference);
                self.reference_load.clear();
                self.selected_load.clear();
                self.view = View::Datasets;
                self.request_loads();
            }
            Err(e) => self.report(format!("Error: {e}")),
        }
    }

    fn split_csv(&mut self) {
        let Some(dir) = self.directory.clone() else {
            self.report("Open a dataset directory first".into());
            return;
        };
        let Some(path) = rfd::FileDialog::new().add_filter("CSV", &["csv"]).pick_file() else {
            return;
        };
        match split_csv_file(&path, &dir) {
            Ok(written) => {
                self.report(format!("Split {} into {} datasets", path.display(), written.len()));
                self.open_directory(dir);
            }
            Err(e) => self.report(format!("Split error: {e}")),
        }
    }

    fn tracker(&mut self, slot: Slot) -> &mut LoadTracker {
        match slot {
            Slot::Reference => &mut self.reference_load,
            Slot::Selected => &mut self.selected_load,
        }
    }

    /// Fetch `id` on a worker thread unless it is already shown.
    fn request(&mut self, slot: Slot, id: Option<String>) {
        let Some(dir) = self.directory.clone() else {
            return;
        };
        let tx = self.tx.clone();
        let tracker = self.tracker(slot);
        let Some(id) = id else {
            tracker.clear();
            return;
        };
        if tracker.loaded().is_some_and(|l| l.id == id) {
            return;
        }

        let ticket = tracker.begin(id.clone());
        thread::spawn(move || {
            let result = DirectorySource::new(dir).fetch(&id);
            // receiver gone means the app is closing
            let _ = tx.send(LoadMsg { slot, ticket, result });
        });
    }

    fn request_loads(&mut self) {
        let reference = self.selection.reference().map(str::to_string);
        let selected = self.selection.selected().map(str::to_string);
        self.request(Slot::Reference, reference);
        self.request(Slot::Selected, selected);
        self.refresh_plot();
    }

    fn select(&mut self, id: String) {
        if self.selection.selected() == Some(id.as_str()) {
            return;
        }
        self.log(&format!("Selected {id}"));
        self.selection.select(Some(id));
        self.request_loads();
    }

    fn poll_loads(&mut self) {
        let mut changed = false;
        while let Ok(msg) = self.rx.try_recv() {
            if self.tracker(msg.slot).resolve(msg.ticket, msg.result) {
                changed = true;
                if let LoadState::Failed { id, reason } = self.tracker(msg.slot).state().clone() {
                    self.report(format!("Failed to load {id}: {reason}"));
                }
            }
        }
        if changed {
            self.refresh_plot();
        }
    }

    /// Push the loaded series into the plot once nothing is in flight.
    fn refresh_plot(&mut self) {
        if self.reference_load.is_loading() || self.selected_load.is_loading() {
            return;
        }
        let reference = self.reference_load.series().cloned();
        let selected = self.selected_load.series().cloned();
        let (base, overlay) = self.selection.assign(reference, selected);
        self.plot.set_series(base, overlay);
    }

    // ---------------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------------

    fn export_dialog(&mut self, name: &str, trajectory: &Trajectory) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .add_filter("CSV", &["csv"])
            .set_file_name(format!("{name}.json"))
            .save_file()
        else {
            return;
        };
        match export_trajectory(&path, name, trajectory) {
            Ok(()) => self.report(format!("Exported {name} to {}", path.display())),
            Err(e) => self.report(format!("Export error: {e:#}")),
        }
    }

    fn export_current_lane(&mut self) {
        let Some(lane) = self.driver.lanes().get(self.export_lane) else {
            return;
        };
        let (name, trajectory) = (lane.label.clone(), lane.buffer().clone());
        self.export_dialog(&name, &trajectory);
    }

    fn export_selected(&mut self) {
        let Some(loaded) = self.selected_load.loaded() else {
            self.report("Nothing loaded to export".into());
            return;
        };
        let (Some(times), Some(voltages)) = (&loaded.dataset.times, &loaded.dataset.voltages) else {
            self.report(format!("{} has no voltage trace", loaded.id));
            return;
        };
        let trajectory = Trajectory {
            times: times.clone(),
            voltages: voltages.clone(),
        };
        let name = loaded.id.clone();
        self.export_dialog(&name, &trajectory);
    }

    // ---------------------------------------------------------------------
    // Frame
    // ---------------------------------------------------------------------

    fn step_sweep(&mut self) {
        match self.driver.advance_frame() {
            Ok(outcome) if outcome.wrapped => {
                let sweeps = self.driver.sweeps();
                self.log(&format!("Sweep {sweeps} started"));
            }
            Ok(_) => {}
            Err(e) => {
                self.running = false;
                self.report(format!("Sweep stopped: {e}"));
            }
        }
    }

    fn sweep_view(&mut self, ui: &mut egui::Ui) {
        let window = self.driver.config().window_ms;
        let lanes = self.driver.lanes().len().max(1);
        let height = ((ui.available_height() - 8.0 * lanes as f32) / lanes as f32).max(80.0);
        let accent = paint::parse_hex(&Palette::default().accent).unwrap_or(egui::Color32::RED);
        let cursor = self.driver.time();

        for (idx, lane) in self.driver.lanes().iter().enumerate() {
            ui.label(egui::RichText::new(&lane.label).strong());
            let points: PlotPoints = lane.buffer().iter().map(|(t, v)| [t, v]).collect();
            Plot::new(("lane", idx))
                .height(height)
                .include_x(0.0)
                .include_x(window)
                .include_y(-90.0)
                .include_y(60.0)
                .allow_drag(false)
                .allow_zoom(false)
                .allow_scroll(false)
                .y_axis_label("mV")
                .show(ui, |plot_ui| {
                    for label in self.driver.labels() {
                        plot_ui.vline(VLine::new(label.ms as f64).color(egui::Color32::from_gray(50)));
                    }
                    plot_ui.vline(VLine::new(cursor).color(egui::Color32::from_gray(120)));
                    plot_ui.line(Line::new(points).name(&lane.label).color(accent).width(1.8));
                });
        }
    }

    fn catalog_table(&mut self, ui: &mut egui::Ui) {
        let mut clicked = None;
        let selected = self.selection.selected().map(str::to_string);

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto().at_least(120.0))
            .column(Column::auto())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Dataset");
                });
                header.col(|ui| {
                    ui.strong("Kind");
                });
                header.col(|ui| {
                    ui.strong("Summary");
                });
            })
            .body(|mut body| {
                for entry in &self.catalog.entries {
                    body.row(20.0, |mut row| {
                        row.col(|ui| {
                            let text = if entry.is_reference() {
                                format!("{} (WT)", entry.name)
                            } else {
                                entry.name.clone()
                            };
                            let is_selected = selected.as_deref() == Some(entry.id.as_str());
                            if ui.selectable_label(is_selected, text).clicked() {
                                clicked = Some(entry.id.clone());
                            }
                        });
                        row.col(|ui| {
                            ui.label(if entry.has_trace { "trace" } else if entry.has_spikes { "raster" } else { "-" });
                        });
                        row.col(|ui| {
                            ui.label(egui::RichText::new(&entry.summary).small().weak());
                        });
                    });
                }
            });

        if let Some(id) = clicked {
            self.select(id);
        }
    }

    fn dataset_view(&mut self, ui: &mut egui::Ui) {
        let Some(dir) = self.directory.clone() else {
            ui.vertical_centered(|ui| {
                ui.add_space(40.0);
                if ui.button("📂 Open dataset directory...").clicked() {
                    self.pick_directory();
                }
            });
            return;
        };

        ui.horizontal(|ui| {
            ui.label(format!("📁 {}", dir.display()));
            let mut show = self.selection.show_reference();
            let toggle = ui.add_enabled(
                self.selection.is_comparing(),
                egui::Checkbox::new(&mut show, "Show reference"),
            );
            if toggle.changed() {
                self.selection.set_show_reference(show);
                self.refresh_plot();
            }
            if self.reference_load.is_loading() || self.selected_load.is_loading() {
                ui.spinner();
            }
        });
        ui.separator();

        let width = f64::from(ui.available_width()).max(MIN_PLOT_WIDTH);
        if (self.plot.size().width - width).abs() > 0.5 {
            self.plot.resize(PlotSize {
                width,
                height: PLOT_HEIGHT,
            });
        }
        let (rect, _) = ui.allocate_exact_size(egui::vec2(width as f32, PLOT_HEIGHT as f32), egui::Sense::hover());

        match self.plot.frame() {
            Some(frame) => {
                let fade = GRACE_PERIOD.as_secs_f32() * 0.9;
                let opacity = ui
                    .ctx()
                    .animate_bool_with_time(egui::Id::new("overlay_fade"), frame.overlay_visible, fade);
                paint::paint_frame(&ui.painter_at(rect), rect.min, &frame, opacity);
                if frame.overlay_visible && opacity >= 1.0 {
                    self.plot.on_transition_end();
                }
            }
            None => {
                let message = match self.selected_load.state() {
                    LoadState::Failed { reason, .. } => format!("Could not load dataset: {reason}"),
                    LoadState::Loading { id, .. } => format!("Loading {id}..."),
                    _ => "Select a dataset".to_string(),
                };
                ui.painter_at(rect).text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    message,
                    egui::FontId::proportional(14.0),
                    egui::Color32::GRAY,
                );
            }
        }

        ui.separator();
        egui::ScrollArea::vertical().id_salt("catalog").show(ui, |ui| self.catalog_table(ui));
    }

    fn animating(&self) -> bool {
        self.plot.timers().pending() > 0
            || matches!(self.plot.phase(), OverlayPhase::FadingIn | OverlayPhase::FadingOut)
            || self.reference_load.is_loading()
            || self.selected_load.is_loading()
    }
}

fn export_trajectory(path: &Path, name: &str, trajectory: &Trajectory) -> anyhow::Result<()> {
    let is_csv = path.extension().and_then(|e| e.to_str()) == Some("csv");
    if is_csv {
        let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
        writer.write_record(["time_ms", "voltage_mv"])?;
        for (t, v) in trajectory.iter() {
            writer.write_record([format!("{t:.4}"), format!("{v:.4}")])?;
        }
        writer.flush()?;
    } else {
        let dataset = Dataset::from_trajectory(trajectory, Metadata::named(name));
        std::fs::write(path, dataset.to_json_string()?).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

impl eframe::App for MimicApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loads();

        let elapsed = Duration::from_secs_f32(ctx.input(|i| i.stable_dt).max(0.0));
        self.plot.on_frame(elapsed);

        if self.running && self.view == View::Sweep {
            self.step_sweep();
            ctx.request_repaint();
        }
        if self.animating() {
            ctx.request_repaint();
        }

        if self.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        // Top menu bar
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("📂 Open Directory...").clicked() {
                        self.pick_directory();
                        ui.close_menu();
                    }
                    if ui.button("✂ Split CSV...").clicked() {
                        self.split_csv();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("📊 Export Lane...").clicked() {
                        self.export_current_lane();
                        ui.close_menu();
                    }
                    if ui.button("📊 Export Selection...").clicked() {
                        self.export_selected();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("🚪 Exit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Sweep", |ui| {
                    let label = if self.running { "⏸ Pause" } else { "▶ Run" };
                    if ui.button(label).clicked() {
                        self.running = !self.running;
                        ui.close_menu();
                    }
                    if ui.button("⟲ Restart").clicked() {
                        self.driver.restart();
                        self.log("Sweep restarted");
                        ui.close_menu();
                    }
                });

                ui.menu_button("View", |ui| {
                    ui.radio_value(&mut self.view, View::Sweep, "Live Sweep");
                    ui.radio_value(&mut self.view, View::Datasets, "Datasets");
                    ui.separator();
                    ui.checkbox(&mut self.show_log, "Output Log");
                    ui.checkbox(&mut self.dark_mode, "Dark Mode");
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(&self.status_message);
                });
            });
        });

        // Status bar
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("⏱ t={:.1}ms", self.driver.time()));
                ui.separator();
                ui.label(format!("🔁 sweep {}", self.driver.sweeps() + 1));
                ui.separator();
                ui.label(format!("📊 {} datasets", self.catalog.len()));
                ui.separator();
                ui.label(format!("overlay: {:?}", self.plot.phase()));
            });
        });

        // Lane controls (left)
        egui::SidePanel::left("lane_panel").default_width(220.0).show(ctx, |ui| {
            ui.heading("🧠 Cells");
            ui.separator();
            for (idx, profile) in CellProfile::all().iter().enumerate() {
                let selected = self.export_lane == idx;
                if ui.selectable_label(selected, profile.name()).clicked() {
                    self.export_lane = idx;
                }
                if selected {
                    ui.indent(profile.name(), |ui| {
                        ui.label(egui::RichText::new(profile.description()).small().weak());
                        if let Some(lane) = self.driver.lanes().get(idx) {
                            ui.label(egui::RichText::new(format!("V = {:.1} mV", lane.voltage())).small());
                        }
                    });
                }
            }
            ui.separator();
            ui.horizontal(|ui| {
                let label = if self.running { "⏸ Pause" } else { "▶ Run" };
                if ui.button(label).clicked() {
                    self.running = !self.running;
                }
                if ui.button("⟲ Restart").clicked() {
                    self.driver.restart();
                    self.log("Sweep restarted");
                }
            });
        });

        // Output log (bottom)
        if self.show_log {
            egui::TopBottomPanel::bottom("log_panel")
                .resizable(true)
                .default_height(120.0)
                .show(ctx, |ui| {
                    ui.label("📋 Output Log");
                    egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut self.output_log.as_str())
                                .font(egui::TextStyle::Monospace)
                                .desired_width(f32::INFINITY),
                        );
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.view, View::Sweep, "📈 Live Sweep");
                ui.selectable_value(&mut self.view, View::Datasets, "🗂 Datasets");
            });
            ui.separator();
            match self.view {
                View::Sweep => self.sweep_view(ui),
                View::Datasets => self.dataset_view(ui),
            }
        });
    }
}

fn main() -> eframe::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1000.0, 700.0])
            .with_title("Mimic - Membrane Potential Previews"),
        ..Default::default()
    };

    eframe::run_native(
        "Mimic",
        native_options,
        Box::new(|cc| Ok(Box::new(MimicApp::new(cc)?))),
    )
}
