// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Generate traffic profiles and measure the latency of the switch model.
//!
//! For example:
//!   cargo run --bin xbar-bench -- traffic uniform -r 4 -n 100 -l 64 -u 1514
//!   cargo run --bin xbar-bench -- latency iq_voq -r 4 --progress

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use xbar_bench::config::{DEFAULT_CONF_FILE, LatencyConfig};
use xbar_bench::latency::LatencyBench;
use xbar_bench::profile::{PROFILES_DIR, TrafficProfile, TrafficType, select_profile};
use xbar_bench::report::report_path;
use xbar_engine::engine::Engine;
use xbar_track::Tracker;
use xbar_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Traffic generation and latency benchmarking for the XBAR switch model")]
struct Cli {
    /// Enable logging to the console.
    #[arg(long, global = true, default_value = "false")]
    stdout: bool,

    /// Level of log message to display.
    #[arg(long, global = true, default_value = "Info")]
    stdout_level: log::Level,

    /// Set a regular expression for which entities should have logging level set
    /// to `--stdout-level`. Others will have level set to `Error`.
    #[arg(long, global = true, default_value = "")]
    stdout_filter_regex: String,

    /// Write log messages to this file.
    #[arg(long, global = true)]
    log_file: Option<String>,

    /// Level of log message to write to `--log-file`.
    #[arg(long, global = true, default_value = "Debug")]
    log_file_level: log::Level,

    /// Set a regular expression for which entities should have log file level
    /// set to `--log-file-level`. Others will have level set to `Error`.
    #[arg(long, global = true, default_value = "")]
    log_file_filter_regex: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a traffic profile.
    Traffic(TrafficArgs),

    /// Replay a traffic profile and report the latency of every frame.
    Latency(LatencyArgs),
}

#[derive(Args)]
struct TrafficArgs {
    /// Lengths of the frames: `custom` frames are all `-l` bytes, `min` are
    /// 64 bytes, `max` are 1514 bytes and `uniform` are distinct lengths taken
    /// from [`-l`, `-u`].
    #[arg(value_enum)]
    test: TrafficType,

    /// Radix of the switch
    #[arg(short = 'r', default_value = "4")]
    radix: usize,

    /// Number of frames to send per port
    #[arg(short = 'n', default_value = "100")]
    frames: usize,

    /// Lower (exact) size limit of the payload in bytes
    #[arg(short = 'l', default_value = "64")]
    lower: usize,

    /// Upper size limit of the payload in bytes
    #[arg(short = 'u', default_value = "1514")]
    upper: usize,

    /// Directory the profile is written to
    #[arg(long, default_value = PROFILES_DIR)]
    profiles_dir: PathBuf,

    /// Seed for the random number generator
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct LatencyArgs {
    #[command(flatten)]
    config: LatencyConfig,

    /// Show a progress bar for the delivered frame count (updated at the rate
    /// defined by `progress_ticks`).
    #[arg(long)]
    progress: bool,

    /// Number of ticks between updates to the progress bar. Only used when
    /// `progress` is enabled.
    #[arg(long, default_value = "1000")]
    progress_ticks: u64,
}

fn setup_all_trackers(args: &Cli) -> Result<Tracker> {
    let config = TrackersConfig {
        stdout: TrackerConfig {
            enable: args.stdout,
            level: args.stdout_level,
            filter_regex: &args.stdout_filter_regex,
            file: None,
        },
        log_file: TrackerConfig {
            enable: args.log_file.is_some(),
            level: args.log_file_level,
            filter_regex: &args.log_file_filter_regex,
            file: args.log_file.as_deref(),
        },
    };
    Ok(setup_trackers(&config)?)
}

fn traffic(args: &TrafficArgs) -> Result<()> {
    println!("Starting creating traffic profile.");
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let profile = TrafficProfile::generate(
        &mut rng,
        args.test,
        args.radix,
        args.frames,
        args.lower,
        args.upper,
    )?;
    let path = profile.save(&args.profiles_dir)?;
    println!("Wrote traffic profile {} (seed {seed}).", path.display());
    Ok(())
}

fn latency(args: LatencyArgs, tracker: &Tracker) -> Result<()> {
    let config = LatencyConfig::resolve(args.config, Path::new(DEFAULT_CONF_FILE))?;
    let settings = config.settings()?;
    let switch_config = settings.switch.clone();

    let profile_path = select_profile(&settings.profiles_dir, &settings.profile)?;
    let profile = TrafficProfile::from_file(&profile_path)?;
    profile.check_radix(switch_config.radix, &profile_path)?;

    let results_path = report_path(
        &settings.results_dir,
        switch_config.architecture,
        switch_config.bus_width_bits,
        &profile_path,
    )?;
    if results_path.exists() {
        return Err(anyhow!(
            "Results already exist: {}",
            results_path.display()
        ));
    }

    println!("Selected traffic profile: {}", profile_path.display());
    println!("Starting latency benchmark.");

    let engine = Engine::with_clock_mhz(tracker, switch_config.clock_mhz);
    engine.set_stall_limit_ticks(settings.stall_limit_ticks);
    let bench = LatencyBench::new(engine, switch_config, &profile)?;
    bench.set_idle_pattern(&settings.idle_pattern)?;
    bench.set_backpressure_pattern(&settings.backpressure_pattern)?;

    let progress_bar = args.progress.then(|| {
        let progress_bar = ProgressBar::new(bench.num_frames() as u64);
        bench.attach_progress(progress_bar.clone(), args.progress_ticks);
        progress_bar
    });

    let results = bench.run()?;

    if let Some(progress_bar) = progress_bar {
        progress_bar.set_position(bench.switch().num_frames_delivered() as u64);
        progress_bar.finish();
    }

    let written = results.save(&profile_path, &settings.results_dir)?;
    println!("Finished latency benchmark.");
    println!("{}", results.summary());
    println!("Wrote latency report {}", written.display());
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let tracker = setup_all_trackers(&args)?;

    match args.command {
        Command::Traffic(ref traffic_args) => traffic(traffic_args),
        Command::Latency(latency_args) => latency(latency_args, &tracker),
    }
}
