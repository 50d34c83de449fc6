//! Input verification through ffprobe / ffmpeg.
//!
//! Each check is a separate tool run. [`Verifier::inspect`] runs them in order
//! and stops probing once a check fails; [`MediaFile::gate`] turns the
//! collected results into an accept/reject decision.

use crate::error::{ToolError, VerificationError};
use crate::tool::{Invocation, ToolOutput, ToolRunner};
use log::debug;
use std::path::{Path, PathBuf};

/// Markers in the decode-check log that mean the container is broken
const STRUCTURAL_FAILURE_MARKERS: &[&str] = &["Conversion failed", "Packet corrupt"];
/// Marker in ffprobe's diagnostics for invalid AV data
const INVALID_CONTENT_MARKER: &str = "Invalid";
const PROBE_SCORE_KEY: &str = "probe_score=";

/// Check results for one input file.
///
/// Checks run in field order. Once one fails, the later ones are not run
/// and stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub has_audio_track: bool,
    pub is_structurally_valid: Option<bool>,
    pub is_content_valid: Option<bool>,
    /// `None` when not probed or when the score could not be parsed
    pub probe_score: Option<u32>,
}

impl MediaFile {
    fn unchecked(path: &Path) -> Self {
        MediaFile {
            path: path.to_path_buf(),
            has_audio_track: false,
            is_structurally_valid: None,
            is_content_valid: None,
            probe_score: None,
        }
    }

    /// First failed gate, or the accepted probe score
    pub fn gate(&self, min_probe_score: u32) -> Result<u32, VerificationError> {
        if !self.has_audio_track {
            return Err(VerificationError::NoAudioTrack);
        }
        if self.is_structurally_valid != Some(true) {
            return Err(VerificationError::StructuralValidationFailed);
        }
        if self.is_content_valid != Some(true) {
            return Err(VerificationError::ContentInvalid);
        }
        let score = self.probe_score.ok_or(VerificationError::ScoreUnparseable)?;
        if score < min_probe_score {
            return Err(VerificationError::ScoreBelowThreshold {
                score,
                threshold: min_probe_score,
            });
        }
        Ok(score)
    }
}

/// Outcome of decoding a file to a null sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeCheck {
    pub log: String,
    pub exited_cleanly: bool,
}

impl DecodeCheck {
    /// Clean exit and no corruption markers in the log
    pub fn is_valid(&self) -> bool {
        self.exited_cleanly
            && !STRUCTURAL_FAILURE_MARKERS
                .iter()
                .any(|m| self.log.contains(m))
    }
}

pub struct Verifier<'a, R: ToolRunner> {
    runner: &'a R,
    ffmpeg: &'a str,
    ffprobe: &'a str,
}

impl<'a, R: ToolRunner> Verifier<'a, R> {
    pub fn new(runner: &'a R, ffmpeg: &'a str, ffprobe: &'a str) -> Self {
        Self {
            runner,
            ffmpeg,
            ffprobe,
        }
    }

    /// Runs audio track, decode, content and score checks, in that order
    pub fn inspect(&self, path: &Path) -> Result<MediaFile, ToolError> {
        let mut media = MediaFile::unchecked(path);

        media.has_audio_track = self.has_audio_track(path)?;
        if !media.has_audio_track {
            return Ok(media);
        }
        debug!("Input contains an audio track: {:?}", path);

        let structural = self.decode_check(path)?.is_valid();
        media.is_structurally_valid = Some(structural);
        if !structural {
            return Ok(media);
        }

        let content = content_is_valid(&self.probe(path)?);
        media.is_content_valid = Some(content);
        if !content {
            return Ok(media);
        }

        media.probe_score = parse_probe_score(&self.probe_score_text(path)?);
        Ok(media)
    }

    /// Whether ffprobe lists at least one audio stream
    pub fn has_audio_track(&self, path: &Path) -> Result<bool, ToolError> {
        let inv = Invocation::new(self.ffprobe)
            .args(["-v", "error", "-select_streams", "a"])
            .args(["-show_entries", "stream=codec_type", "-of", "csv=p=0"])
            .arg(path);
        let out = self.runner.run(&inv)?;
        Ok(out.success() && out.stdout.lines().any(|l| l.trim() == "audio"))
    }

    /// Decodes the whole file to a null sink.
    ///
    /// A non-zero exit is not an error here; it is reported in the result.
    pub fn decode_check(&self, path: &Path) -> Result<DecodeCheck, ToolError> {
        let inv = Invocation::new(self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-f", "null", "-"]);
        let out = self.runner.run(&inv)?;
        Ok(DecodeCheck {
            log: out.combined(),
            exited_cleanly: out.success(),
        })
    }

    pub fn probe(&self, path: &Path) -> Result<ToolOutput, ToolError> {
        let inv = Invocation::new(self.ffprobe)
            .args(["-v", "error", "-show_format", "-show_streams"])
            .arg(path);
        self.runner.run(&inv)
    }

    pub fn probe_score_text(&self, path: &Path) -> Result<String, ToolError> {
        let inv = Invocation::new(self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=probe_score"])
            .args(["-of", "default=noprint_wrappers=1"])
            .arg(path);
        Ok(self.runner.run(&inv)?.combined())
    }
}

/// Only ffprobe's diagnostics on stderr count; stdout carries the file name
/// and tag values, which may contain any text.
fn content_is_valid(probe: &ToolOutput) -> bool {
    probe.success() && !probe.stderr.contains(INVALID_CONTENT_MARKER)
}

/// Extracts the integer after `probe_score=`.
///
/// Everything up to the end of that line is taken, non-alphanumeric
/// characters are dropped, and the rest must be a plain integer.
pub fn parse_probe_score(text: &str) -> Option<u32> {
    let start = text.find(PROBE_SCORE_KEY)? + PROBE_SCORE_KEY.len();
    let value: String = text[start..]
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_score() {
        assert_eq!(parse_probe_score("probe_score=17"), Some(17));
        assert_eq!(parse_probe_score("probe_score=42\n"), Some(42));
        assert_eq!(parse_probe_score("junk\nprobe_score= 100\r\nmore"), Some(100));
    }

    struct Exits(i32);

    impl ToolRunner for Exits {
        fn run(&self, _: &Invocation) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                stdout: "audio\n".into(),
                stderr: String::new(),
                code: Some(self.0),
            })
        }
    }

    #[test]
    fn non_zero_decode_exit_is_structurally_invalid() {
        let runner = Exits(1);
        let verifier = Verifier::new(&runner, "ffmpeg", "ffprobe");
        let check = verifier.decode_check(Path::new("clip.mp4")).unwrap();
        assert!(!check.exited_cleanly);
        assert!(!check.is_valid());
    }

    #[test]
    fn corrupt_packet_marker_fails_clean_exit() {
        let check = DecodeCheck {
            log: "[aac @ 0x1] Packet corrupt (stream = 1)".into(),
            exited_cleanly: true,
        };
        assert!(!check.is_valid());
    }

    #[test]
    fn inspect_stops_at_missing_audio() {
        // the audio probe itself exits non-zero, so no track is reported
        let runner = Exits(1);
        let verifier = Verifier::new(&runner, "ffmpeg", "ffprobe");
        let media = verifier.inspect(Path::new("clip.mp4")).unwrap();
        assert!(!media.has_audio_track);
        assert_eq!(media.is_structurally_valid, None);
        assert_eq!(media.gate(25), Err(VerificationError::NoAudioTrack));
    }

    #[test]
    fn content_check_ignores_stdout_metadata() {
        let probe = ToolOutput {
            stdout: "filename=/in/Invalidenstrasse_tour.mp4\nTAG:title=Invalid Monsters\n".into(),
            stderr: String::new(),
            code: Some(0),
        };
        assert!(content_is_valid(&probe));
        let broken = ToolOutput {
            stderr: "clip.mp4: Invalid data found when processing input\n".into(),
            code: Some(1),
            ..Default::default()
        };
        assert!(!content_is_valid(&broken));
    }

    #[test]
    fn gate_order_and_threshold() {
        let mut media = MediaFile {
            path: PathBuf::from("clip.mp4"),
            has_audio_track: true,
            is_structurally_valid: Some(true),
            is_content_valid: Some(true),
            probe_score: Some(17),
        };
        assert_eq!(
            media.gate(25),
            Err(VerificationError::ScoreBelowThreshold {
                score: 17,
                threshold: 25
            })
        );
        media.probe_score = Some(42);
        assert_eq!(media.gate(25), Ok(42));
        media.probe_score = None;
        assert_eq!(media.gate(25), Err(VerificationError::ScoreUnparseable));
        media.is_content_valid = Some(false);
        assert_eq!(media.gate(25), Err(VerificationError::ContentInvalid));
    }

    #[test]
    fn unparseable_probe_score() {
        assert_eq!(parse_probe_score(""), None);
        assert_eq!(parse_probe_score("probe_score="), None);
        assert_eq!(parse_probe_score("probe_score=N/A"), None);
        assert_eq!(parse_probe_score("format=mov"), None);
    }
}
