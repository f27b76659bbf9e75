//! Directory-backed catalog, loading, and CSV preview splitting

use std::fs;

use mimic_core::MimicError;
use mimic_trace::*;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) {
    fs::write(dir.path().join(name), body).unwrap();
}

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "sim_WT.json",
        r#"{"metadata": {"name": "WT", "summary": "control"}, "summary": "baseline", "times": [0, 500, 1000], "voltages": [-65, 30, -70]}"#,
    );
    write(
        &dir,
        "e999k.json",
        r#"{"metadata": {"name": "E999K", "gene": "SCN1A"}, "times": [0, 500, 1000], "voltages": [-65, -65, -65]}"#,
    );
    write(&dir, "network.json", r#"{"spikes": [{"time": 120, "neuron": 2}], "neurons": 8}"#);
    write(&dir, "notes.txt", "not a dataset");
    write(&dir, "corrupt.json", "{");
    dir
}

#[test]
fn catalog_lists_json_previews() {
    let dir = data_dir();
    let source = DirectorySource::new(dir.path());
    assert_eq!(source.list().unwrap(), vec!["corrupt", "e999k", "network", "sim_WT"]);

    let catalog = Catalog::scan(&source).unwrap();
    assert_eq!(catalog.len(), 3);

    let wt = catalog.reference().unwrap();
    assert_eq!(wt.id, "sim_WT");
    // metadata summary wins over the top-level one
    assert_eq!(wt.summary, "control");
    assert!(wt.has_trace && !wt.has_spikes);

    let mutant = catalog.get("e999k").unwrap();
    assert_eq!(mutant.metadata.extra["gene"], "SCN1A");
    assert!(!mutant.is_reference());
}

#[test]
fn missing_directory_is_a_fetch_error() {
    let dir = TempDir::new().unwrap();
    let source = DirectorySource::new(dir.path().join("absent"));
    assert!(matches!(source.list(), Err(MimicError::Fetch { .. })));
    assert!(matches!(source.fetch("x"), Err(MimicError::Fetch { .. })));
}

#[test]
fn tracker_loads_from_directory() {
    let dir = data_dir();
    let source = DirectorySource::new(dir.path());
    let mut tracker = LoadTracker::new();

    tracker.load(&source, "network");
    let raster = tracker.series().and_then(Series::as_raster).unwrap();
    assert_eq!(raster.neurons, 8);
    assert!((raster.duration - 0.12).abs() < 1e-12);

    tracker.load(&source, "corrupt");
    assert!(matches!(tracker.state(), LoadState::Failed { .. }));
}

#[test]
fn selection_drives_plot_roles() {
    let dir = data_dir();
    let source = DirectorySource::new(dir.path());
    let catalog = Catalog::scan(&source).unwrap();

    let mut selection = ComparisonSelection::new(catalog.reference().map(|e| e.id.clone()));
    selection.select(Some("e999k".into()));
    let roles = selection.roles();

    let load = |id: Option<&str>| id.and_then(|id| Series::from_dataset(&source.fetch(id).ok()?).ok());
    let (base, overlay) = selection.assign(load(roles.base), load(roles.overlay));

    let mut plot = TracePlot::new(PlotSize::default(), Palette::default());
    plot.set_series(base, overlay);
    assert_eq!(plot.phase(), OverlayPhase::FadingIn);
    let frame = plot.frame().unwrap();
    assert_eq!(frame.base.stroke.color, "#e6e6e6");
}

#[test]
fn split_writes_one_file_per_series() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("traces.csv");
    fs::write(&csv, "time,0,0.001,0.002\nWT,-65,-64,-30\nE999K mutant,-65,-65,-65\n").unwrap();

    let written = split_csv_file(&csv, dir.path()).unwrap();
    let names: Vec<_> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["traces_WT.json", "traces_E999K_mutant.json"]);

    let source = DirectorySource::new(dir.path());
    let wt = source.fetch("traces_WT").unwrap();
    assert_eq!(wt.name(), Some("WT"));
    assert_eq!(wt.voltages, Some(vec![-65.0, -64.0, -30.0]));

    let catalog = Catalog::scan(&source).unwrap();
    assert_eq!(catalog.reference().unwrap().id, "traces_WT");
}

#[test]
fn downsampled_preview_still_renders() {
    let times: Vec<f64> = (0..10_000).map(|i| i as f64 * 0.1).collect();
    let voltages: Vec<f64> = (0..10_000).map(|i| if i % 997 == 0 { 40.0 } else { -65.0 }).collect();
    let dataset = mimic_core::Dataset {
        times: Some(times),
        voltages: Some(voltages),
        ..Default::default()
    };

    let thin = downsample_dataset(&dataset, 2000);
    assert_eq!(thin.times.as_ref().unwrap().len(), 4000);
    let peaks = thin.voltages.as_ref().unwrap().iter().filter(|&&v| v == 40.0).count();
    assert_eq!(peaks, 11);
    assert!(Series::from_dataset(&thin).is_ok());
}
