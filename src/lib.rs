/// Module for configuration loading
pub mod config;
/// Module for error handling
pub mod error;
/// Module for loudness normalization passes
pub mod normalize;
/// Module for render profiles
pub mod profile;
/// Module for running external tools
pub mod tool;
/// Module for input verification
pub mod verify;
/// Module for checking rendered WAV files
pub mod wav;

use crate::config::Config;
use crate::error::{Error, ProcessingError};
use crate::normalize::{LoudnessMeasurement, Normalizer};
use crate::profile::ProfileSettings;
use crate::tool::ToolRunner;
use crate::verify::Verifier;
use indicatif::{ProgressBar, ProgressIterator, ProgressStyle};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use crate::tool::SystemRunner;

/// Suffix appended to the input stem for the first (measured) render
pub const FIRST_PASS_SUFFIX: &str = "_audio-optimized-norm-high-equal-16khz-h_after-norm.wav";
/// Suffix appended to the input stem for the chained smoothing render
pub const SECOND_PASS_SUFFIX: &str = "_audio-optimized-norm-high-equal-16khz-h_after-norm2.wav";

/// Options for one batch run
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Input directory, searched recursively
    pub input_dir: PathBuf,
    /// Output directory; sub-directories of the input are mirrored here
    pub output_dir: PathBuf,
    /// File name prefixes/suffixes to skip
    pub exclusions: Vec<String>,
    /// Files with a lower ffprobe score are rejected
    pub min_probe_score: u32,
    /// Profile for the measured two-pass render
    pub primary: ProfileSettings,
    /// Profile for the chained single-pass render
    pub secondary: ProfileSettings,
    /// Keep first-pass renders after the second pass succeeded
    pub keep_intermediate: bool,
    /// Draw a progress bar
    pub show_progress: bool,
    /// ffmpeg binary, a name on PATH or a full path
    pub ffmpeg: String,
    /// ffprobe binary, a name on PATH or a full path
    pub ffprobe: String,
}

impl OptimizeOptions {
    pub fn from_config(config: &Config) -> Self {
        let system = &config.system;
        OptimizeOptions {
            input_dir: system.input_dir.clone(),
            output_dir: system.output_dir.clone(),
            exclusions: system.exclusions.clone(),
            min_probe_score: system.min_probe_score,
            primary: system.primary_profile.settings().with_targets(&system.targets),
            secondary: system.secondary_profile.settings(),
            keep_intermediate: system.keep_intermediate,
            show_progress: true,
            ffmpeg: system.ffmpeg.clone(),
            ffprobe: system.ffprobe.clone(),
        }
    }
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// A file that made it through the first render
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub measurement: LoudnessMeasurement,
    pub output: PathBuf,
    /// Second-pass render, `None` if that pass failed
    pub smoothed_output: Option<PathBuf>,
}

/// A file that was rejected or failed to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub input: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Success(ProcessedFile),
    Failure(FailedFile),
}

/// Result of a batch run, in traversal order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub succeeded: Vec<ProcessedFile>,
    pub failed: Vec<FailedFile>,
    /// First-pass renders deleted during cleanup
    pub removed_intermediates: Vec<PathBuf>,
}

impl BatchReport {
    fn record(&mut self, outcome: ProcessingOutcome) {
        match outcome {
            ProcessingOutcome::Success(s) => self.succeeded.push(s),
            ProcessingOutcome::Failure(f) => self.failed.push(f),
        }
    }

    /// Logs the loudness summary of converted files and the list of rejected ones
    pub fn log_summary(&self) {
        info!("======> Summary of loudness values for converted files:");
        for file in &self.succeeded {
            info!("Input File: {}", file.input.display());
            info!("  Loudness Values: {}", file.measurement);
            info!("  Output: {}", file.output.display());
            if let Some(smoothed) = &file.smoothed_output {
                info!("  Smoothed Output: {}", smoothed.display());
            }
        }

        info!("======> List of files that have not met the conditions:");
        for file in &self.failed {
            warn!(
                "Input File: {} - Reason: {}",
                file.input.display(),
                file.reason
            );
        }

        info!(
            "Processing complete. {} files succeeded, {} files failed.",
            self.succeeded.len(),
            self.failed.len()
        );
    }
}

/// Whether a file name starts or ends with any exclusion token
pub fn is_excluded(file_name: &str, exclusions: &[impl AsRef<str>]) -> bool {
    exclusions.iter().any(|token| {
        let token = token.as_ref();
        file_name.starts_with(token) || file_name.ends_with(token)
    })
}

/// Output file names for both passes, derived from the input stem
pub fn output_file_names(input: &Path) -> (String, String) {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    (
        format!("{stem}{FIRST_PASS_SUFFIX}"),
        format!("{stem}{SECOND_PASS_SUFFIX}"),
    )
}

/// Verify, normalize and smooth every media file under `options.input_dir`
///
/// Per-file problems land in the returned report. Only invalid options and
/// file-system failures while walking or preparing the output root abort the run.
pub fn optimize_folder<R: ToolRunner>(
    options: &OptimizeOptions,
    runner: &R,
) -> Result<BatchReport, Error> {
    // 1. Validate options
    validate_options(options)?;

    // 2. Discover files
    info!("Discovering media files in {:?}...", options.input_dir);
    let files = find_media_files(&options.input_dir, &options.exclusions)?;
    info!("Found {} candidate files.", files.len());

    let verifier = Verifier::new(runner, &options.ffmpeg, &options.ffprobe);
    let normalizer = Normalizer::new(runner, &options.ffmpeg);

    // 3. Process sequentially
    let pb = if options.show_progress {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}").expect("Internal Error: Failed to set progress bar style")
        .progress_chars("#>-"));
    pb.set_message("Processing files");

    let mut report = BatchReport::default();
    let mut intermediates = Vec::new();
    for path in files.iter().progress_with(pb.clone()) {
        let outcome = process_single_file(path, options, &verifier, &normalizer);
        if let ProcessingOutcome::Success(ProcessedFile {
            output,
            smoothed_output: Some(_),
            ..
        }) = &outcome
        {
            intermediates.push(output.clone());
        }
        report.record(outcome);
    }
    pb.finish_with_message("Processing done");

    // 4. Report and clean up
    report.log_summary();
    if options.keep_intermediate {
        debug!("Keeping {} intermediate files", intermediates.len());
    } else {
        report.removed_intermediates = remove_intermediates(&intermediates);
    }

    Ok(report)
}

/// Runs one file through the verification gates and both render passes
pub fn process_single_file<R: ToolRunner>(
    input_path: &Path,
    options: &OptimizeOptions,
    verifier: &Verifier<'_, R>,
    normalizer: &Normalizer<'_, R>,
) -> ProcessingOutcome {
    match try_process_file(input_path, options, verifier, normalizer) {
        Ok(processed) => ProcessingOutcome::Success(processed),
        Err(e) => {
            debug!("Rejected {:?}: {}", input_path, e);
            ProcessingOutcome::Failure(FailedFile {
                input: input_path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    }
}

fn try_process_file<R: ToolRunner>(
    input_path: &Path,
    options: &OptimizeOptions,
    verifier: &Verifier<'_, R>,
    normalizer: &Normalizer<'_, R>,
) -> Result<ProcessedFile, ProcessingError> {
    let media = verifier.inspect(input_path)?;
    debug!("Checks for {:?}: {:?}", input_path, media);
    let score = media.gate(options.min_probe_score)?;
    info!(
        "======> This input file is valid and will be processed by FFmpeg: {}, Probe-Score: {}",
        media.path.display(),
        score
    );

    let out_dir = output_dir_for(input_path, &options.input_dir, &options.output_dir);
    fs::create_dir_all(&out_dir).map_err(|e| ProcessingError::OutputDir {
        path: out_dir.clone(),
        source: e,
    })?;
    let (first_name, second_name) = output_file_names(input_path);
    let output = out_dir.join(first_name);

    let (status, measurement) = normalizer.normalize(input_path, &output, &options.primary)?;
    debug!("{}", status);

    let smoothed = out_dir.join(second_name);
    let smoothed_output = match normalizer.simple_normalize(&output, &smoothed, &options.secondary)
    {
        Ok(_) => Some(smoothed),
        Err(e) => {
            warn!("Second pass failed for {:?}: {}", output, e);
            None
        }
    };

    Ok(ProcessedFile {
        input: input_path.to_path_buf(),
        measurement,
        output,
        smoothed_output,
    })
}

/// Mirrors the input file's directory below `output_base_dir`
fn output_dir_for(input_path: &Path, input_base_dir: &Path, output_base_dir: &Path) -> PathBuf {
    let parent = input_path.parent().unwrap_or(input_base_dir);
    match pathdiff::diff_paths(parent, input_base_dir) {
        Some(rel) if !rel.starts_with("..") => output_base_dir.join(rel),
        _ => output_base_dir.to_path_buf(),
    }
}

/// Deletes every listed intermediate that still exists, returning the ones removed
fn remove_intermediates(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in paths {
        if !path.exists() {
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Deleted intermediary file: {}", path.display());
                removed.push(path.clone());
            }
            Err(e) => error!("Failed to delete intermediary file {:?}: {}", path, e),
        }
    }
    removed
}

/// Validates options for correctness
///
/// # Arguments
/// * `options` - Reference to OptimizeOptions struct
fn validate_options(options: &OptimizeOptions) -> Result<(), Error> {
    if !options.input_dir.is_dir() {
        return Err(Error::InvalidOptions(format!(
            "Input path is not a valid directory: {:?}",
            options.input_dir
        )));
    }
    let output_dir = &options.output_dir;
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|e| Error::Io {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        info!("Created output directory: {:?}", output_dir);
    } else if !output_dir.is_dir() {
        return Err(Error::InvalidOptions(format!(
            "Output path exists but is not a directory: {:?}",
            output_dir
        )));
    }
    if options.min_probe_score > 100 {
        warn!(
            "Minimum probe score {} is above ffprobe's maximum of 100. Every file will be rejected.",
            options.min_probe_score
        );
    }
    Ok(())
}

/// Finds all regular files under `input_dir` whose names are not excluded
///
/// Entries are sorted by file name within each directory. The list is fully
/// collected before processing so renders written below the input root are
/// never picked up.
fn find_media_files(input_dir: &Path, exclusions: &[String]) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Walk {
            path: input_dir.to_path_buf(),
            source: e,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_excluded(&name, exclusions) {
            debug!("Skipping excluded file: {:?}", entry.path());
            continue;
        }
        files.push(entry.path().to_path_buf());
    }
    Ok(files)
}
