//! Command line front end for disk and point-source photometry
//!
//! # Usage
//!
//! ```bash
//! # Synthetic frames plus a matching configuration
//! diskphot synth --out frames.bin --config obs.json --size 256 --seed 7
//!
//! # Radial Stokes images and azimuthal profiles, computed once
//! diskphot reduce --frames frames.bin --out derived.bin
//!
//! # Disk ring counts, optionally writing the overlay
//! diskphot disk --frames frames.bin --config obs.json --derived derived.bin \
//!     --inner 10 --middle 40 --outer 60 --overlay disk.png
//!
//! # Single-placement counts for every marked object
//! diskphot objects --frames frames.bin --config obs.json --inner 3 --outer 7
//!
//! # Perturbation-grid photometry of one object, or of the disk with --hole
//! diskphot photometry --frames frames.bin --config obs.json --target "Companion A" \
//!     --inner 3 --outer 7
//! diskphot photometry --frames frames.bin --config obs.json --derived derived.bin \
//!     --target disk --hole 10 --inner 40 --outer 60
//!
//! # Q_phi azimuthal profile
//! diskphot profile --derived derived.bin --band r
//! ```
//!
//! Unmeasurable values are printed as `no data`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use diskphot::image_proc::overlay::save_overlay_png;
use diskphot::persist::{load_derived, load_frames, save_frames};
use diskphot::test_util::synthetic_observation;
use diskphot::{Band, Measurement, Observation, ObservationConfig, PerturbationGrid};

/// Largest displacement or scale range accepted on the command line.
const MAX_GRID_RANGE: usize = 5;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BandArg {
    I,
    R,
}

impl From<BandArg> for Band {
    fn from(arg: BandArg) -> Self {
        match arg {
            BandArg::I => Band::I,
            BandArg::R => Band::R,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic observation frame bundle
    Synth {
        #[arg(short, long)]
        out: PathBuf,

        /// Also write the matching observation config here
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Frame edge length in pixels
        #[arg(long, default_value = "256")]
        size: usize,

        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Compute and save radial Stokes images and azimuthal profiles
    Reduce {
        #[arg(short, long)]
        frames: PathBuf,

        #[arg(short, long)]
        out: PathBuf,
    },

    /// Counts of the disk ring inner <= d < middle on Q_phi
    Disk {
        #[arg(short, long)]
        frames: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        derived: PathBuf,

        #[arg(long)]
        inner: f64,

        #[arg(long)]
        middle: f64,

        #[arg(long)]
        outer: f64,

        /// Write the aperture overlay as PNG
        #[arg(long)]
        overlay: Option<PathBuf>,
    },

    /// Counts of every configured object
    Objects {
        #[arg(short, long)]
        frames: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        #[arg(long)]
        inner: f64,

        #[arg(long)]
        outer: f64,

        #[arg(long)]
        overlay: Option<PathBuf>,
    },

    /// Photometry over a grid of aperture perturbations
    Photometry {
        #[arg(short, long)]
        frames: PathBuf,

        #[arg(short, long)]
        config: PathBuf,

        /// Needed for disk photometry
        #[arg(short, long)]
        derived: Option<PathBuf>,

        /// Object name, or the disk target's name together with --hole
        #[arg(short, long)]
        target: String,

        /// Hole radius; switches to disk photometry on Q_phi
        #[arg(long)]
        hole: Option<f64>,

        #[arg(long)]
        inner: f64,

        #[arg(long)]
        outer: f64,

        /// Center displacement range (config default if omitted)
        #[arg(long)]
        displacement: Option<usize>,

        /// Radius jitter range (config default if omitted)
        #[arg(long)]
        scale: Option<usize>,
    },

    /// Print the Q_phi azimuthal profile of one band
    Profile {
        #[arg(short, long)]
        derived: PathBuf,

        #[arg(short, long, value_enum, default_value = "i")]
        band: BandArg,
    },
}

fn fmt_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.4}")
    } else {
        "no data".to_string()
    }
}

fn load_observation(frames: &Path, config: &Path) -> Result<(Observation, ObservationConfig)> {
    let bundle = load_frames(frames)
        .with_context(|| format!("reading frames from {}", frames.display()))?;
    let mut observation = Observation::from_bundle(bundle)?;
    let config = ObservationConfig::load_from_file(config)
        .with_context(|| format!("reading config from {}", config.display()))?;
    config.apply(&mut observation);
    Ok((observation, config))
}

fn checked_grid(
    config: &ObservationConfig,
    displacement: Option<usize>,
    scale: Option<usize>,
) -> Result<PerturbationGrid> {
    let defaults = config.grid();
    let grid = PerturbationGrid::new(
        displacement.unwrap_or(defaults.displacement_range),
        scale.unwrap_or(defaults.scale_range),
    );
    if grid.displacement_range > MAX_GRID_RANGE || grid.scale_range > MAX_GRID_RANGE {
        bail!(
            "grid ranges ({}, {}) exceed the limit of {MAX_GRID_RANGE}",
            grid.displacement_range,
            grid.scale_range
        );
    }
    Ok(grid)
}

fn print_measurement(labels: &[&str], measurement: &Measurement) {
    println!("{} grid cells", measurement.cells);
    for (index, label) in labels.iter().enumerate() {
        println!(
            "  {label:<16} {} ± {}",
            fmt_value(measurement.mean[index]),
            fmt_value(measurement.std[index])
        );
    }
    if let Some(background) = &measurement.background {
        for (label, value) in labels.iter().zip(background) {
            println!("  {label:<16} background {}", fmt_value(*value));
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            out,
            config,
            size,
            seed,
        } => {
            if size < 32 {
                bail!("synthetic frames need at least 32 pixels, got {size}");
            }
            let observation = synthetic_observation(size, seed);
            save_frames(&observation.to_bundle(), &out)?;
            if let Some(path) = config {
                ObservationConfig::from_observation(&observation).save_to_file(&path)?;
                log::info!("wrote config to {}", path.display());
            }
            println!("{}", observation.describe_objects());
        }

        Commands::Reduce { frames, out } => {
            let mut observation = Observation::from_bundle(load_frames(&frames)?)?;
            observation.reduce();
            observation.save_derived(&out)?;
        }

        Commands::Disk {
            frames,
            config,
            derived,
            inner,
            middle,
            outer,
            overlay,
        } => {
            let (mut observation, config) = load_observation(&frames, &config)?;
            observation.load_derived(&derived)?;

            let result = observation.measure_disk(inner, middle, outer, config.overlay_alpha)?;
            println!("disk ring {inner} <= r < {middle}, background {middle} <= r < {outer}");
            println!("{} pixels", result.aperture_pixels);
            for band in Band::ALL {
                let i = band.index();
                println!(
                    "  {band}: total {}  background-subtracted {}  background median {}",
                    fmt_value(result.total_counts[i]),
                    fmt_value(result.background_subtracted[i]),
                    fmt_value(result.background_medians[i]),
                );
            }
            println!(
                "  ratio I/R {}  magnitude {}",
                fmt_value(result.background_subtracted[0] / result.background_subtracted[1]),
                fmt_value(result.color_magnitude())
            );

            if let Some(path) = overlay {
                save_overlay_png(&result.overlay, &path)?;
                log::info!("wrote overlay to {}", path.display());
            }
        }

        Commands::Objects {
            frames,
            config,
            inner,
            outer,
            overlay,
        } => {
            let (observation, config) = load_observation(&frames, &config)?;
            println!("{}", observation.describe_objects());

            let result = observation.measure_objects(inner, outer, config.overlay_alpha)?;
            for counts in &result.objects {
                println!("{}", counts.name);
                for band in Band::ALL {
                    let i = band.index();
                    println!(
                        "  {band}: total {}  background-subtracted {}  background median {}",
                        fmt_value(counts.total_counts[i]),
                        fmt_value(counts.background_subtracted[i]),
                        fmt_value(counts.background_medians[i]),
                    );
                }
            }

            if let Some(path) = overlay {
                save_overlay_png(&result.overlay, &path)?;
                log::info!("wrote overlay to {}", path.display());
            }
        }

        Commands::Photometry {
            frames,
            config,
            derived,
            target,
            hole,
            inner,
            outer,
            displacement,
            scale,
        } => {
            let (mut observation, config) = load_observation(&frames, &config)?;
            let grid = checked_grid(&config, displacement, scale)?;

            match hole {
                Some(hole) => {
                    let Some(path) = derived else {
                        bail!("disk photometry needs --derived");
                    };
                    if observation.disk().map(|d| d.name.as_str()) != Some(target.as_str()) {
                        bail!("{target:?} is not the disk target of {}", observation.name());
                    }
                    observation.load_derived(&path)?;
                    let result =
                        observation.disk_photometry(hole, inner, outer, grid, false, true)?;
                    print_measurement(&["I' Q_phi", "R' Q_phi"], &result);
                }
                None => {
                    let result = observation.object_photometry(
                        &target,
                        inner,
                        outer,
                        grid,
                        false,
                        config.photometry.clip_sigma,
                    )?;
                    print_measurement(&["I' plane 0", "I' plane 2", "R' plane 0", "R' plane 2"], &result);
                }
            }
        }

        Commands::Profile { derived, band } => {
            let products = load_derived(&derived)?;
            let band = Band::from(band);
            let profile = &products.azimuthal_qphi[band.index()];

            println!("{band} Q_phi azimuthal profile");
            for ((radius, mean), std) in profile.radius.iter().zip(&profile.mean).zip(&profile.std) {
                println!("{radius:>5} {:>14} {:>14}", fmt_value(*mean), fmt_value(*std));
            }
        }
    }

    Ok(())
}
