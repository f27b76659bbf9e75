//! # Mimic CLI
//!
//! Command-line interface for simulating membrane potentials and preparing
//! trace/raster previews.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use mimic_hh::profiles::CellProfile;
use mimic_hh::SPIKE_THRESHOLD;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::MimicConfig;

#[derive(Parser)]
#[command(name = "mimic")]
#[command(author = "Mimic Neuroscience")]
#[command(version = "0.1.0")]
#[command(about = "Membrane potential simulation and preview toolkit", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = "mimic.toml")]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate one cell and write its voltage trace
    Simulate {
        /// Preset cell instead of the configured one
        #[arg(short, long)]
        profile: Option<CellProfile>,
        /// Choose the preset interactively
        #[arg(long, conflicts_with = "profile")]
        pick: bool,
        /// Run length (ms)
        #[arg(short, long)]
        duration: Option<f64>,
        /// Step size (ms)
        #[arg(long)]
        dt: Option<f64>,
        /// Keep every n-th step
        #[arg(long)]
        record_every: Option<u64>,
        /// Output file (.json or .csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Simulate preset cells in parallel and write their spike raster
    Raster {
        /// Profiles, one neuron each (default: all)
        #[arg(short, long, value_delimiter = ',')]
        profiles: Vec<CellProfile>,
        /// Neurons per profile
        #[arg(long, default_value_t = 1)]
        copies: usize,
        /// Run length (ms)
        #[arg(short, long)]
        duration: Option<f64>,
        /// Spike threshold (mV)
        #[arg(long, default_value_t = SPIKE_THRESHOLD)]
        threshold: f64,
        /// Output dataset
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a dataset to SVG, optionally overlaid with a second one
    Render {
        /// Base dataset
        base: PathBuf,
        /// Dataset drawn on top of the base
        #[arg(short = 'C', long)]
        compare: Option<PathBuf>,
        /// Output SVG
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        width: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
    },

    /// List the previews in a dataset directory
    Catalog {
        /// Directory of JSON datasets
        dir: PathBuf,
    },

    /// Split a multi-trace CSV into one JSON dataset per series
    Split {
        /// CSV file
        input: PathBuf,
        /// Output directory (default: next to the input)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },

    /// Thin a long trace dataset for preview
    Preview {
        /// Trace dataset
        input: PathBuf,
        /// Target sample count
        #[arg(short, long, default_value_t = 2000)]
        max_points: usize,
        /// Output dataset
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List preset cell profiles
    Profiles,

    /// Print the effective configuration
    Config,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MimicConfig::load(&cli.config)?;
    init_logging(if cli.verbose { "debug" } else { &config.log_level });

    match cli.command {
        Commands::Simulate {
            profile,
            pick,
            duration,
            dt,
            record_every,
            output,
        } => {
            let profile = if pick { Some(commands::pick_profile()?) } else { profile };
            let mut sim = config.simulation.clone();
            sim.duration = duration.unwrap_or(sim.duration);
            sim.dt = dt.unwrap_or(sim.dt);
            sim.record_every = record_every.unwrap_or(sim.record_every);
            sim.validate()?;
            commands::simulate(&config, &sim, profile, output.as_deref())?;
        }

        Commands::Raster {
            profiles,
            copies,
            duration,
            threshold,
            output,
        } => {
            let profiles = if profiles.is_empty() { CellProfile::all().to_vec() } else { profiles };
            let duration = duration.unwrap_or(config.simulation.duration);
            commands::raster(&config, &profiles, copies, duration, threshold, &output)?;
        }

        Commands::Render {
            base,
            compare,
            output,
            width,
            height,
        } => {
            let mut size = config.plot.size();
            size.width = width.unwrap_or(size.width);
            size.height = height.unwrap_or(size.height);
            commands::render(&config, size, &base, compare.as_deref(), &output)?;
        }

        Commands::Catalog { dir } => commands::catalog(&dir)?,

        Commands::Split { input, out_dir } => commands::split(&input, out_dir.as_deref())?,

        Commands::Preview {
            input,
            max_points,
            output,
        } => commands::preview(&input, max_points, &output)?,

        Commands::Profiles => {
            println!("{}", "Preset Cell Profiles:".green().bold());
            println!();
            for profile in CellProfile::all() {
                println!("  {} {}", format!("{:<24}", profile.name()).cyan(), profile.description());
            }
        }

        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}
