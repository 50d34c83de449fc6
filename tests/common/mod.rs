//! Scripted stand-in for ffmpeg/ffprobe.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use audio_track_optimizer::error::ToolError;
use audio_track_optimizer::tool::{Invocation, ToolOutput, ToolRunner};

pub const LOUDNORM_JSON: &str = r#"[Parsed_loudnorm_0 @ 0x7f8c5a704a80]
{
	"input_i" : "-23.54",
	"input_tp" : "-7.72",
	"input_lra" : "9.10",
	"input_thresh" : "-34.11",
	"output_i" : "-12.02",
	"output_tp" : "-2.00",
	"output_lra" : "5.80",
	"output_thresh" : "-22.40",
	"normalization_type" : "dynamic",
	"target_offset" : "0.02"
}
"#;

/// How the fake toolchain answers for one input stem
#[derive(Debug, Clone)]
pub struct FakeMedia {
    pub has_audio: bool,
    pub decode_log: String,
    /// `-show_format -show_streams` report, printed on stdout
    pub probe_stdout: String,
    /// ffprobe diagnostics, printed on stderr
    pub probe_log: String,
    pub score_text: String,
    pub measure_log: String,
    pub measure_code: i32,
    pub render_ok: bool,
    pub smooth_ok: bool,
    /// Writes renders with this sample rate instead of the requested one
    pub wrong_rate: Option<u32>,
}

impl Default for FakeMedia {
    fn default() -> Self {
        FakeMedia {
            has_audio: true,
            decode_log: String::new(),
            probe_stdout: "[FORMAT]\nformat_name=mov,mp4\n[/FORMAT]\n".to_string(),
            probe_log: String::new(),
            score_text: "probe_score=100\n".to_string(),
            measure_log: LOUDNORM_JSON.to_string(),
            measure_code: 0,
            render_ok: true,
            smooth_ok: true,
            wrong_rate: None,
        }
    }
}

#[derive(Default)]
pub struct FakeToolchain {
    media: HashMap<String, FakeMedia>,
    pub calls: RefCell<Vec<Invocation>>,
}

fn ok(stdout: &str, stderr: &str) -> ToolOutput {
    ToolOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        code: Some(0),
    }
}

fn failed(stderr: &str) -> ToolOutput {
    ToolOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        code: Some(1),
    }
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stem: &str, media: FakeMedia) -> Self {
        self.media.insert(stem.to_string(), media);
        self
    }

    /// Every call whose arguments mention `needle`
    pub fn calls_mentioning(&self, needle: &str) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.args.iter().any(|a| a.to_string_lossy().contains(needle)))
            .cloned()
            .collect()
    }

    pub fn render_calls(&self) -> Vec<Invocation> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.has_arg("-y"))
            .cloned()
            .collect()
    }

    fn lookup(&self, input: &Path) -> (FakeMedia, bool) {
        let name = input.file_name().unwrap_or_default().to_string_lossy();
        let (stem, second_pass) = match name.split_once("_audio-optimized") {
            Some((stem, _)) => (stem.to_string(), true),
            None => (
                input.file_stem().unwrap_or_default().to_string_lossy().into_owned(),
                false,
            ),
        };
        (self.media.get(&stem).cloned().unwrap_or_default(), second_pass)
    }

    fn render(&self, inv: &Invocation, media: &FakeMedia) -> ToolOutput {
        let parse = |flag: &str| -> u32 {
            inv.value_of(flag)
                .and_then(|v| v.to_str())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };
        let bits = match inv.value_of("-c:a").and_then(OsStr::to_str) {
            Some("pcm_s24le") => 24,
            _ => 16,
        };
        let spec = hound::WavSpec {
            channels: parse("-ac") as u16,
            sample_rate: media.wrong_rate.unwrap_or_else(|| parse("-ar")),
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        };
        let output = PathBuf::from(inv.last_arg().unwrap_or_default());
        let mut writer = hound::WavWriter::create(&output, spec).unwrap();
        for _ in 0..(spec.sample_rate / 100) * spec.channels as u32 {
            writer.write_sample(0i32).unwrap();
        }
        writer.finalize().unwrap();
        ok("", "")
    }
}

impl ToolRunner for FakeToolchain {
    fn run(&self, inv: &Invocation) -> Result<ToolOutput, ToolError> {
        self.calls.borrow_mut().push(inv.clone());

        let input = match inv.value_of("-i") {
            Some(i) => PathBuf::from(i),
            None => PathBuf::from(inv.last_arg().unwrap_or_default()),
        };
        let (media, second_pass) = self.lookup(&input);

        let out = if inv.program == "ffprobe" {
            if inv.has_arg("-select_streams") {
                ok(if media.has_audio { "audio\n" } else { "" }, "")
            } else if inv.has_arg("format=probe_score") {
                ok(&media.score_text, "")
            } else {
                ok(&media.probe_stdout, &media.probe_log)
            }
        } else if inv.has_arg("-v") {
            ok("", &media.decode_log)
        } else if inv
            .value_of("-filter_complex")
            .is_some_and(|f| f.to_string_lossy().contains("print_format=json"))
        {
            ToolOutput {
                stdout: String::new(),
                stderr: media.measure_log.clone(),
                code: Some(media.measure_code),
            }
        } else if (second_pass && !media.smooth_ok) || (!second_pass && !media.render_ok) {
            failed("Error while filtering: Invalid argument")
        } else {
            self.render(inv, &media)
        };
        Ok(out)
    }
}
