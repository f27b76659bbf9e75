//! Subcommand implementations

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use console::Term;
use dialoguer::{theme::ColorfulTheme, FuzzySelect};
use indicatif::{ProgressBar, ProgressStyle};
use mimic_core::{Dataset, Metadata, Time, Trajectory};
use mimic_hh::profiles::CellProfile;
use mimic_hh::{
    detect_spikes, simulate_population, spike_raster, Conductances, IntegrationOptions, Integrator,
    NeuronState, StimulusProtocol, SPIKE_THRESHOLD,
};
use mimic_trace::overlay::MOUNT_FRAMES;
use mimic_trace::{
    downsample_dataset, render_svg, split_csv_file, Catalog, DirectorySource, PlotSize, Series, TracePlot,
};
use tracing::{debug, info};

use crate::config::{MimicConfig, SimulationConfig};

fn read_dataset(path: &Path) -> Result<Dataset> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Dataset::from_json_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    fs::write(path, dataset.to_json_string()?).with_context(|| format!("Failed to write {}", path.display()))
}

/// Interactive profile choice; needs a terminal.
pub fn pick_profile() -> Result<CellProfile> {
    if !Term::stdout().is_term() {
        bail!("--pick needs an interactive terminal");
    }
    let items: Vec<String> = CellProfile::all()
        .iter()
        .map(|p| format!("{:<24} {}", p.name(), p.description()))
        .collect();
    let idx = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Cell profile")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(CellProfile::all()[idx])
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ms")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Same samples as `integrate_with`, advanced one millisecond at a time.
fn record_with_progress(
    integrator: &mut Integrator,
    duration: Time,
    record_every: u64,
    pb: &ProgressBar,
) -> Result<Trajectory> {
    let mut trajectory = Trajectory::new();
    trajectory.push(0.0, integrator.state().v)?;

    let chunks = duration.ceil().max(1.0) as u64;
    for k in 1..=chunks {
        integrator.record_until((k as f64).min(duration), record_every, &mut trajectory)?;
        pb.set_position(k);
    }

    if let Some((last_t, _)) = trajectory.last() {
        if integrator.time() > last_t {
            trajectory.push(integrator.time(), integrator.state().v)?;
        }
    }
    Ok(trajectory)
}

fn write_csv(path: &Path, trajectory: &Trajectory) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["time_ms", "voltage_mv"])?;
    for (t, v) in trajectory.iter() {
        writer.write_record([t.to_string(), v.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn cell_metadata(label: &str, params: &Conductances, stimulus: &StimulusProtocol, sim: &SimulationConfig) -> Metadata {
    Metadata {
        name: Some(label.to_string()),
        summary: Some(format!("Hodgkin-Huxley cell, {} ms at dt {} ms", sim.duration, sim.dt)),
        parameters: Some(serde_json::json!({
            "conductances": params,
            "stimulus": stimulus,
            "dt": sim.dt,
            "record_every": sim.record_every,
        })),
        ..Metadata::default()
    }
}

pub fn simulate(
    config: &MimicConfig,
    sim: &SimulationConfig,
    profile: Option<CellProfile>,
    output: Option<&Path>,
) -> Result<()> {
    let (label, params, stimulus) = match profile {
        Some(p) => (p.name().to_string(), p.conductances(), p.stimulus()),
        None => ("configured".to_string(), config.neuron, config.stimulus.clone()),
    };
    println!("{} {}", "Simulating:".green().bold(), label.cyan());

    let mut integrator = Integrator::new(NeuronState::RESTING, params, stimulus.clone(), sim.timestep()?)?;
    let pb = progress_bar(sim.duration.ceil() as u64)?;
    let trajectory = record_with_progress(&mut integrator, sim.duration, sim.record_every, &pb)?;
    pb.finish_and_clear();

    let spikes = detect_spikes(&trajectory, SPIKE_THRESHOLD);
    println!("  Samples: {}", trajectory.len());
    if let Some(peak) = trajectory.peak() {
        println!("  Peak:    {peak:.2} mV");
    }
    println!("  Spikes:  {}", spikes.len().to_string().cyan());
    if let (Some(first), Some(last)) = (spikes.first(), spikes.last()) {
        println!("           {first:.2} .. {last:.2} ms");
    }

    let Some(path) = output else {
        return Ok(());
    };
    let is_csv = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        write_csv(path, &trajectory)?;
    } else {
        let metadata = cell_metadata(&label, &params, &stimulus, sim);
        write_dataset(path, &Dataset::from_trajectory(&trajectory, metadata))?;
    }
    info!(path = %path.display(), samples = trajectory.len(), "trace written");
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(())
}

pub fn raster(
    config: &MimicConfig,
    profiles: &[CellProfile],
    copies: usize,
    duration: Time,
    threshold: f64,
    output: &Path,
) -> Result<()> {
    if copies == 0 {
        bail!("--copies must be at least 1");
    }
    let cells: Vec<_> = profiles
        .iter()
        .flat_map(|p| std::iter::repeat((p.conductances(), p.stimulus())).take(copies))
        .collect();
    println!(
        "{} {} neurons for {} ms",
        "Simulating raster:".green().bold(),
        cells.len(),
        duration
    );

    let options = IntegrationOptions {
        record_every: config.simulation.record_every,
    };
    let pb = spinner("integrating");
    let trajectories = simulate_population(&cells, duration, config.simulation.timestep()?, options)?;
    pb.finish_and_clear();

    let mut dataset = spike_raster(&trajectories, threshold);
    let names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
    dataset.metadata = Metadata {
        name: Some("raster".to_string()),
        summary: Some(format!("{} x {copies} preset cells", names.join(", "))),
        parameters: Some(serde_json::json!({ "profiles": names, "copies": copies, "threshold": threshold })),
        ..Metadata::default()
    };

    let count = dataset.spikes.as_ref().map_or(0, Vec::len);
    write_dataset(output, &dataset)?;
    println!("  Spikes: {}", count.to_string().cyan());
    println!("{} {}", "Wrote".green().bold(), output.display());
    Ok(())
}

/// Final frame of a plot, with any overlay fully faded in.
pub fn render_frame_svg(config: &MimicConfig, size: PlotSize, base: &Dataset, compare: Option<&Dataset>) -> Result<String> {
    let base = Series::from_dataset(base)?;
    let compare = compare.map(Series::from_dataset).transpose()?;
    let has_compare = compare.is_some();

    let mut plot = TracePlot::new(size, config.plot.palette());
    plot.set_series(Some(base), compare);
    if has_compare {
        for _ in 0..MOUNT_FRAMES {
            plot.tick_frame();
        }
        plot.on_transition_end();
    }
    debug!(phase = ?plot.phase(), "rendering");

    let frame = plot.frame().context("no base series to render")?;
    Ok(render_svg(&frame))
}

pub fn render(config: &MimicConfig, size: PlotSize, base: &Path, compare: Option<&Path>, output: &Path) -> Result<()> {
    let base = read_dataset(base)?;
    let compare = compare.map(read_dataset).transpose()?;
    let svg = render_frame_svg(config, size, &base, compare.as_ref())?;
    fs::write(output, svg).with_context(|| format!("Failed to write {}", output.display()))?;
    println!("{} {}", "Rendered".green().bold(), output.display());
    Ok(())
}

pub fn catalog(dir: &Path) -> Result<()> {
    let catalog = Catalog::scan(&DirectorySource::new(dir))?;
    println!("{} {}", "Datasets in".green().bold(), dir.display());
    println!();
    for entry in &catalog.entries {
        let kind = match (entry.has_trace, entry.has_spikes) {
            (true, _) => "trace",
            (false, true) => "raster",
            (false, false) => "-",
        };
        let marker = if entry.is_reference() { "*" } else { " " };
        println!(
            "  {marker} {} {:<8} {} {}",
            format!("{:<24}", entry.id).cyan(),
            kind,
            entry.name,
            entry.summary.dimmed()
        );
    }
    if catalog.is_empty() {
        println!("  {}", "no readable datasets".yellow());
    }
    Ok(())
}

pub fn split(input: &Path, out_dir: Option<&Path>) -> Result<()> {
    let out_dir = out_dir.or_else(|| input.parent()).unwrap_or(Path::new("."));
    let written = split_csv_file(input, out_dir).with_context(|| format!("Failed to split {}", input.display()))?;
    println!("{} {} datasets", "Wrote".green().bold(), written.len());
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}

pub fn preview(input: &Path, max_points: usize, output: &Path) -> Result<()> {
    let dataset = read_dataset(input)?;
    if !dataset.has_trace() {
        bail!("{} has no voltage trace", input.display());
    }
    let thin = downsample_dataset(&dataset, max_points);
    let before = dataset.times.as_ref().map_or(0, Vec::len);
    let after = thin.times.as_ref().map_or(0, Vec::len);
    write_dataset(output, &thin)?;
    println!("{} {before} -> {after} samples", "Preview:".green().bold());
    Ok(())
}
