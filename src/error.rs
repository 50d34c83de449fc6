use std::path::PathBuf;

/// Failure to run an external tool or a non-zero exit from it
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {}: {message}", exit_label(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        message: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "signal".to_string(),
    }
}

/// Reasons an input file is rejected before normalization
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("No audio track")]
    NoAudioTrack,
    #[error("Conversion failed or packet corrupt")]
    StructuralValidationFailed,
    #[error("Contains INVALID AV DATA according to FFprobe")]
    ContentInvalid,
    #[error("Unable to determine the FFprobe score")]
    ScoreUnparseable,
    #[error("Low FFprobe score")]
    ScoreBelowThreshold { score: u32, threshold: u32 },
}

#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("Tool invocation failed: {0}")]
    ToolInvocationFailed(#[from] ToolError),
    #[error("No JSON output in FFmpeg response")]
    NoJsonOutput,
    #[error("Failed to parse JSON output from loudness measurement: {0}")]
    OutputUnparseable(#[from] serde_json::Error),
    #[error("Rendered file does not match the profile: {0}")]
    OutputMismatch(#[from] WavCheckError),
}

#[derive(thiserror::Error, Debug)]
pub enum WavCheckError {
    #[error("Reading wav error: {0}")]
    Wav(#[from] hound::Error),
    #[error("expected {expected_rate} Hz / {expected_channels} ch / {expected_bits} bit, found {rate} Hz / {channels} ch / {bits} bit")]
    SpecMismatch {
        expected_rate: u32,
        expected_channels: u16,
        expected_bits: u16,
        rate: u32,
        channels: u16,
        bits: u16,
    },
}

/// Per-file failure recorded in the batch report
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    #[error(transparent)]
    Rejected(#[from] VerificationError),
    #[error("Verification tool failed: {0}")]
    Verifier(#[from] ToolError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("I/O error during processing of {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
