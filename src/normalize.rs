//! Two-pass `loudnorm` normalization and the single-pass smoothing variant.
//!
//! Pass one runs `loudnorm` in analysis mode with `print_format=json` and
//! scrapes the statistics block from the tool log. Pass two feeds those
//! measurements back into `loudnorm` (linear mode) behind the profile's
//! band-pass and EQ stages, and encodes to PCM WAV.

use crate::error::NormalizeError;
use crate::profile::ProfileSettings;
use crate::tool::{Invocation, ToolRunner};
use crate::wav::check_render;
use log::{debug, info};
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Loudness statistics reported by the measurement pass
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoudnessMeasurement {
    #[serde(deserialize_with = "number_or_string")]
    pub input_i: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub input_tp: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub input_lra: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub input_thresh: f64,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub target_offset: Option<f64>,
    #[serde(default)]
    pub normalization_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("not a number: {s:?}"))),
        }
    }
}

// loudnorm prints every value as a JSON string, e.g. "-27.61" or "-inf"
fn number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    NumberOrString::deserialize(d)?.into_f64()
}

fn optional_number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Option::<NumberOrString>::deserialize(d)?
        .map(NumberOrString::into_f64)
        .transpose()
}

impl std::fmt::Display for LoudnessMeasurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "input_i: {:.2} LUFS, input_tp: {:.2} dBTP, input_lra: {:.2} LU, input_thresh: {:.2} LUFS",
            self.input_i, self.input_tp, self.input_lra, self.input_thresh
        )?;
        if let Some(offset) = self.target_offset {
            write!(f, ", target_offset: {:.2} LU", offset)?;
        }
        if let Some(kind) = &self.normalization_type {
            write!(f, ", normalization_type: {}", kind)?;
        }
        Ok(())
    }
}

/// Tag ffmpeg puts in front of the loudnorm statistics block
const LOUDNORM_LOG_TAG: &str = "[Parsed_loudnorm";

/// Finds the JSON object embedded in a tool log: first `{` to last `}`
///
/// The scan starts at the last loudnorm log tag when there is one, so braces
/// in the `Input #0 ... from '<path>'` header are skipped.
pub fn extract_json_block(log: &str) -> Option<&str> {
    let log = log.rfind(LOUDNORM_LOG_TAG).map_or(log, |tag| &log[tag..]);
    let start = log.find('{')?;
    let end = log.rfind('}')?;
    (start < end).then(|| &log[start..=end])
}

/// Parses the loudnorm statistics block out of a measurement log
pub fn parse_measurement(log: &str) -> Result<LoudnessMeasurement, NormalizeError> {
    let json = extract_json_block(log).ok_or(NormalizeError::NoJsonOutput)?;
    Ok(serde_json::from_str(json)?)
}

fn loudnorm_targets(settings: &ProfileSettings) -> String {
    let t = &settings.targets;
    format!("I={}:LRA={}:TP={}", t.integrated, t.range, t.true_peak)
}

/// Full filter chain for the second pass
pub fn render_filter_chain(settings: &ProfileSettings, m: &LoudnessMeasurement) -> String {
    let mut stages = settings.pre_filters();
    let mut loudnorm = format!(
        "loudnorm=measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}",
        m.input_i, m.input_tp, m.input_lra, m.input_thresh
    );
    if let Some(offset) = m.target_offset {
        loudnorm.push_str(&format!(":offset={offset}"));
    }
    loudnorm.push_str(":linear=true:");
    loudnorm.push_str(&loudnorm_targets(settings));
    stages.push(loudnorm);
    stages.join(",")
}

pub struct Normalizer<'a, R: ToolRunner> {
    runner: &'a R,
    ffmpeg: &'a str,
}

impl<'a, R: ToolRunner> Normalizer<'a, R> {
    pub fn new(runner: &'a R, ffmpeg: &'a str) -> Self {
        Self { runner, ffmpeg }
    }

    fn base_invocation(&self, settings: &ProfileSettings, input: &Path) -> Invocation {
        let mut inv = Invocation::new(self.ffmpeg).args(["-hide_banner", "-nostats"]);
        if settings.no_stdin {
            inv = inv.arg("-nostdin");
        }
        if let Some(threads) = settings.threads {
            inv = inv.arg("-threads").arg(threads.to_string());
        }
        inv.arg("-i").arg(input)
    }

    fn encode_args(settings: &ProfileSettings, inv: Invocation, output: &Path) -> Invocation {
        inv.args(["-c:a", settings.codec])
            .arg("-ar")
            .arg(settings.sample_rate.to_string())
            .arg("-ac")
            .arg(settings.channels.to_string())
            .arg("-y")
            .arg(output)
    }

    /// Measurement pass: analysis only, output discarded
    pub fn measure(
        &self,
        input: &Path,
        settings: &ProfileSettings,
    ) -> Result<LoudnessMeasurement, NormalizeError> {
        let filter = format!("loudnorm={}:print_format=json", loudnorm_targets(settings));
        let inv = self
            .base_invocation(settings, input)
            .args(["-filter_complex", &filter, "-f", "null", "-"]);
        let out = self.runner.run(&inv)?;
        let log = out.combined();
        out.check(self.ffmpeg)?;
        let measurement = parse_measurement(&log)?;
        debug!("Measured {:?}: {}", input, measurement);
        Ok(measurement)
    }

    /// Two-pass loudness normalization of `input` into `output`
    ///
    /// # Returns
    /// A status message and the measurement taken in the first pass
    pub fn normalize(
        &self,
        input: &Path,
        output: &Path,
        settings: &ProfileSettings,
    ) -> Result<(String, LoudnessMeasurement), NormalizeError> {
        let measurement = self.measure(input, settings)?;

        let chain = render_filter_chain(settings, &measurement);
        let inv = self
            .base_invocation(settings, input)
            .args(["-filter_complex", &chain]);
        let inv = Self::encode_args(settings, inv, output);
        self.runner.run(&inv)?.check(self.ffmpeg)?;
        check_render(output, settings)?;

        info!("Normalized {:?} -> {:?}", input, output);
        Ok((
            "Loudness normalization and conversion to WAV completed.".to_string(),
            measurement,
        ))
    }

    /// Single-pass normalization with fixed targets, no measurement and no EQ
    pub fn simple_normalize(
        &self,
        input: &Path,
        output: &Path,
        settings: &ProfileSettings,
    ) -> Result<String, NormalizeError> {
        let filter = format!("loudnorm={}", loudnorm_targets(settings));
        let inv = self
            .base_invocation(settings, input)
            .args(["-filter_complex", &filter]);
        let inv = Self::encode_args(settings, inv, output);
        self.runner.run(&inv)?.check(self.ffmpeg)?;
        check_render(output, settings)?;

        info!("Smoothed {:?} -> {:?}", input, output);
        Ok("Single-pass loudness normalization completed.".to_string())
    }
}
