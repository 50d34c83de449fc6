use anyhow::Result;
use audio_track_optimizer::config::Config;
use audio_track_optimizer::profile::Profile;
use audio_track_optimizer::{OptimizeOptions, SystemRunner, optimize_folder};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// input directory, default to `system.input_dir` from the config file
    input: Option<PathBuf>,

    /// output directory, default to `system.output_dir` from the config file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// config file, default to ./config.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// profile for the measured render: high-fidelity or speech
    #[arg(long)]
    profile: Option<Profile>,

    /// profile for the chained smoothing render: high-fidelity or speech
    #[arg(long)]
    secondary_profile: Option<Profile>,

    /// minimum ffprobe probe_score to accept a file
    #[arg(long)]
    min_score: Option<u32>,

    /// keep first-pass renders after the second pass succeeded
    #[arg(long)]
    keep_intermediate: bool,

    /// ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<String>,

    /// ffprobe binary
    #[arg(long)]
    ffprobe: Option<String>,

    /// disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

fn main() -> Result<()> {
    _ = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .parse_default_env()
        .try_init();

    let cli = Cli::parse();

    // --- Configuration: CLI > config file > defaults ---
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    let system = &mut config.system;
    if let Some(input) = cli.input {
        system.input_dir = input;
    }
    if let Some(output) = cli.output {
        system.output_dir = output;
    }
    if let Some(profile) = cli.profile {
        system.primary_profile = profile;
    }
    if let Some(profile) = cli.secondary_profile {
        system.secondary_profile = profile;
    }
    if let Some(score) = cli.min_score {
        system.min_probe_score = score;
    }
    if let Some(ffmpeg) = cli.ffmpeg {
        system.ffmpeg = ffmpeg;
    }
    if let Some(ffprobe) = cli.ffprobe {
        system.ffprobe = ffprobe;
    }
    system.keep_intermediate |= cli.keep_intermediate;

    let mut options = OptimizeOptions::from_config(&config);
    options.show_progress = !cli.no_progress;

    info!("Starting audio optimization with options:");
    info!("  Input Directory: {:?}", options.input_dir);
    info!("  Output Directory: {:?}", options.output_dir);
    info!(
        "  Primary Profile: {} ({} Hz, {} ch, {})",
        config.system.primary_profile,
        options.primary.sample_rate,
        options.primary.channels,
        options.primary.codec
    );
    info!(
        "  Target Loudness: {:.1} LUFS / {:.1} LU / {:.1} dBTP",
        options.primary.targets.integrated,
        options.primary.targets.range,
        options.primary.targets.true_peak
    );
    info!(
        "  Secondary Profile: {} ({} Hz, {} ch, {})",
        config.system.secondary_profile,
        options.secondary.sample_rate,
        options.secondary.channels,
        options.secondary.codec
    );
    info!("  Minimum Probe Score: {}", options.min_probe_score);
    info!("  Keep Intermediate Files: {}", options.keep_intermediate);
    info!("---");

    match optimize_folder(&options, &SystemRunner) {
        Ok(report) => {
            info!(
                "Optimization finished: {} converted, {} rejected.",
                report.succeeded.len(),
                report.failed.len()
            );
            Ok(())
        }
        Err(e) => {
            error!("Optimization failed: {}", e);
            Err(e)?
        }
    }
}
