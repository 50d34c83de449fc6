use crate::error::WavCheckError;
use crate::profile::ProfileSettings;
use std::path::Path;

/// Reads the header of a rendered WAV file and checks it against the profile
///
/// # Arguments
/// * `path` - Rendered WAV file
/// * `profile` - Profile the file was rendered with
///
/// # Returns
/// The WAV spec found in the file, or a WavCheckError on mismatch
pub fn check_render(
    path: &Path,
    profile: &ProfileSettings,
) -> Result<hound::WavSpec, WavCheckError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != profile.sample_rate
        || spec.channels != profile.channels
        || spec.bits_per_sample != profile.bits_per_sample
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(WavCheckError::SpecMismatch {
            expected_rate: profile.sample_rate,
            expected_channels: profile.channels,
            expected_bits: profile.bits_per_sample,
            rate: spec.sample_rate,
            channels: spec.channels,
            bits: spec.bits_per_sample,
        });
    }
    Ok(spec)
}
