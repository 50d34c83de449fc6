//! Configuration loading.
//!
//! The file is TOML with a single `[system]` table. Each key present in the
//! file replaces the built-in default of the same name; keys the file leaves
//! out keep their defaults.

use crate::error::ConfigError;
use crate::profile::{Profile, TargetOverrides};
use log::{debug, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// File names starting or ending with any of these are skipped
pub const DEFAULT_EXCLUSIONS: &[&str] = &[".DS_Store", "backup", "_test_", "_", "_test", "."];

/// Minimum ffprobe `probe_score` accepted for processing
pub const DEFAULT_MIN_PROBE_SCORE: u32 = 25;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub min_probe_score: u32,
    pub exclusions: Vec<String>,
    pub primary_profile: Profile,
    pub secondary_profile: Profile,
    pub targets: TargetOverrides,
    pub keep_intermediate: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        SystemConfig {
            input_dir: PathBuf::from("_input"),
            output_dir: PathBuf::from("_output"),
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            min_probe_score: DEFAULT_MIN_PROBE_SCORE,
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            primary_profile: Profile::HighFidelity,
            secondary_profile: Profile::Speech,
            targets: TargetOverrides::default(),
            keep_intermediate: false,
        }
    }
}

/// Immutable application configuration, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
}

impl Config {
    /// Reads and merges the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_toml(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!("Loaded configuration from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Loads `path` when given, otherwise `./config.toml` if it exists, otherwise defaults.
    ///
    /// An explicitly requested file that cannot be read is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::load(default_path)
                } else {
                    warn!(
                        "No {} found in the working directory, using built-in defaults",
                        DEFAULT_CONFIG_FILE
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
