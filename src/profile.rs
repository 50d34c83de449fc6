//! Render profiles: output PCM format plus the filter policy applied around `loudnorm`.

use serde::Deserialize;
use std::str::FromStr;
use strum_macros::Display;

/// Supported render profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Profile {
    /// 24-bit / 48 kHz / stereo
    HighFidelity,
    /// 16-bit / 16 kHz / mono, tuned for speech recognition
    Speech,
}

#[derive(thiserror::Error, Debug)]
#[error("Unknown profile '{0}', expected one of: high-fidelity, speech")]
pub struct UnknownProfile(String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "high-fidelity" | "hifi" => Ok(Self::HighFidelity),
            "speech" | "asr" => Ok(Self::Speech),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

/// Loudness targets handed to `loudnorm`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTargets {
    /// Integrated loudness in LUFS
    pub integrated: f64,
    /// Loudness range in LU
    pub range: f64,
    /// True peak in dBTP
    pub true_peak: f64,
}

/// One `equalizer` stage with a Q-type width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqBand {
    pub frequency: u32,
    pub width_q: f64,
    pub gain_db: f64,
}

/// Everything needed to build the render command for a profile
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSettings {
    pub codec: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// `(highpass, lowpass)` cut-offs in Hz
    pub band_pass: Option<(u32, u32)>,
    pub equalizer: Vec<EqBand>,
    pub targets: LoudnessTargets,
    pub no_stdin: bool,
    pub threads: Option<u32>,
}

impl Profile {
    pub fn settings(self) -> ProfileSettings {
        match self {
            Profile::HighFidelity => ProfileSettings {
                codec: "pcm_s24le",
                sample_rate: 48_000,
                channels: 2,
                bits_per_sample: 24,
                band_pass: Some((80, 6000)),
                equalizer: vec![
                    EqBand {
                        frequency: 1000,
                        width_q: 1.5,
                        gain_db: 6.0,
                    },
                    EqBand {
                        frequency: 3000,
                        width_q: 2.0,
                        gain_db: 4.0,
                    },
                ],
                targets: LoudnessTargets {
                    integrated: -12.0,
                    range: 6.0,
                    true_peak: -2.0,
                },
                no_stdin: false,
                threads: None,
            },
            Profile::Speech => ProfileSettings {
                codec: "pcm_s16le",
                sample_rate: 16_000,
                channels: 1,
                bits_per_sample: 16,
                band_pass: Some((100, 7500)),
                equalizer: vec![EqBand {
                    frequency: 2500,
                    width_q: 1.0,
                    gain_db: 3.0,
                }],
                targets: LoudnessTargets {
                    integrated: -16.0,
                    range: 7.0,
                    true_peak: -2.0,
                },
                no_stdin: true,
                threads: Some(0),
            },
        }
    }
}

impl ProfileSettings {
    /// Replaces the built-in targets with any configured overrides
    pub fn with_targets(mut self, overrides: &TargetOverrides) -> Self {
        if let Some(i) = overrides.integrated {
            self.targets.integrated = i;
        }
        if let Some(lra) = overrides.range {
            self.targets.range = lra;
        }
        if let Some(tp) = overrides.true_peak {
            self.targets.true_peak = tp;
        }
        self
    }

    /// The band-pass and EQ stages, in the order they run before `loudnorm`
    pub fn pre_filters(&self) -> Vec<String> {
        let mut stages = Vec::new();
        if let Some((high, low)) = self.band_pass {
            stages.push(format!("highpass=f={high}"));
            stages.push(format!("lowpass=f={low}"));
        }
        stages.extend(self.equalizer.iter().map(|b| {
            format!(
                "equalizer=f={}:t=q:w={}:g={}",
                b.frequency, b.width_q, b.gain_db
            )
        }));
        stages
    }
}

/// Optional per-target overrides from the configuration file
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetOverrides {
    pub integrated: Option<f64>,
    pub range: Option<f64>,
    pub true_peak: Option<f64>,
}
