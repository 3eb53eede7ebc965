use std::fmt;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use serde::Serialize;

use crate::audio::{convert_audio_bytes_to_samples, downmix_to_mono};
use crate::error::PipelineError;
use crate::whisper::resampler::resample_to_16khz;

pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Whisper needs at least one second of audio.
const MIN_SAMPLES: usize = TARGET_SAMPLE_RATE as usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    M4a,
    Flac,
    Ogg,
    /// Raw little-endian PCM from a live recording.
    Pcm,
}

impl AudioFormat {
    pub const UPLOAD_EXTENSIONS: [&'static str; 5] = ["mp3", "wav", "m4a", "flac", "ogg"];

    pub fn from_file_name(file_name: &str) -> Result<Self, PipelineError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                PipelineError::UnsupportedFormat(format!("'{file_name}' has no file extension"))
            })?;

        match extension.as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "m4a" => Ok(AudioFormat::M4a),
            "flac" => Ok(AudioFormat::Flac),
            "ogg" => Ok(AudioFormat::Ogg),
            "pcm" => Ok(AudioFormat::Pcm),
            other => Err(PipelineError::UnsupportedFormat(format!(
                ".{other} (supported: MP3, WAV, M4A, FLAC, OGG)"
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::M4a => "m4a",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Pcm => "pcm",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Accepted raw PCM sample rates. Resampling cost grows with `16000 / rate`.
pub const PCM_SAMPLE_RATES: RangeInclusive<u32> = 8_000..=192_000;
pub const PCM_CHANNELS: RangeInclusive<usize> = 1..=8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub channels: usize,
    pub bit_depth: u8,
}

impl Default for PcmSpec {
    fn default() -> Self {
        Self {
            sample_rate: TARGET_SAMPLE_RATE,
            channels: 1,
            bit_depth: 16,
        }
    }
}

impl PcmSpec {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(PipelineError::BadRequest(format!(
                "Bit depth must be 16, 24, or 32 (got {})",
                self.bit_depth
            )));
        }
        if !PCM_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(PipelineError::BadRequest(format!(
                "Sample rate must be between {} and {} Hz (got {})",
                PCM_SAMPLE_RATES.start(),
                PCM_SAMPLE_RATES.end(),
                self.sample_rate
            )));
        }
        if !PCM_CHANNELS.contains(&self.channels) {
            return Err(PipelineError::BadRequest(format!(
                "Channel count must be between {} and {} (got {})",
                PCM_CHANNELS.start(),
                PCM_CHANNELS.end(),
                self.channels
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct AudioPayload {
    pub file_name: String,
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
    pub pcm: PcmSpec,
}

impl AudioPayload {
    /// Detects the format from the file name. Nothing is decoded here, so an
    /// unsupported upload never reaches the recognizer.
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        pcm: Option<PcmSpec>,
    ) -> Result<Self, PipelineError> {
        let file_name = file_name.into();
        let format = AudioFormat::from_file_name(&file_name)?;
        if bytes.is_empty() {
            return Err(PipelineError::BadRequest(format!(
                "Uploaded file '{file_name}' is empty"
            )));
        }
        let pcm = pcm.unwrap_or_default();
        if format == AudioFormat::Pcm {
            pcm.validate()?;
        }
        Ok(Self {
            file_name,
            format,
            bytes,
            pcm,
        })
    }
}

/// Turns uploads into 16kHz mono samples. Container formats go through the
/// ffmpeg binary; raw PCM is converted in process.
#[derive(Clone, Debug)]
pub struct AudioDecoder {
    ffmpeg: PathBuf,
}

impl AudioDecoder {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }

    pub fn decode(&self, payload: &AudioPayload) -> Result<Vec<f32>, PipelineError> {
        let samples = match payload.format {
            AudioFormat::Pcm => decode_pcm(&payload.bytes, payload.pcm)?,
            format => self.decode_container(&payload.bytes, format)?,
        };

        if samples.len() < MIN_SAMPLES {
            warn!(
                "Rejecting '{}': {} samples is shorter than one second",
                payload.file_name,
                samples.len()
            );
            return Err(PipelineError::InvalidAudio(
                "Audio is too short (less than 1 second)".to_string(),
            ));
        }

        info!(
            "Decoded '{}' ({}): {:.1}s of audio",
            payload.file_name,
            payload.format,
            samples.len() as f32 / TARGET_SAMPLE_RATE as f32
        );
        Ok(samples)
    }

    fn decode_container(
        &self,
        bytes: &[u8],
        format: AudioFormat,
    ) -> Result<Vec<f32>, PipelineError> {
        // ffmpeg needs a seekable input for formats like m4a.
        let mut input = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()
            .map_err(|e| PipelineError::InvalidAudio(format!("Failed to buffer upload: {e}")))?;
        input
            .write_all(bytes)
            .and_then(|_| input.flush())
            .map_err(|e| PipelineError::InvalidAudio(format!("Failed to buffer upload: {e}")))?;

        debug!(
            "Running {} on {}",
            self.ffmpeg.display(),
            input.path().display()
        );

        let output = Command::new(&self.ffmpeg)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input.path())
            .args([
                "-f",
                "s16le",
                "-acodec",
                "pcm_s16le",
                "-ac",
                "1",
                "-ar",
            ])
            .arg(TARGET_SAMPLE_RATE.to_string())
            .arg("pipe:1")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                PipelineError::InvalidAudio(format!(
                    "Failed to run {}: {e}",
                    self.ffmpeg.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::InvalidAudio(format!(
                "ffmpeg could not decode the {format} file: {}",
                stderr.trim()
            )));
        }

        convert_audio_bytes_to_samples(&output.stdout, 16).map_err(PipelineError::InvalidAudio)
    }

    /// Runs `ffmpeg -version` and returns its first line.
    pub fn probe(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| anyhow::anyhow!("Failed to run {}: {}", self.ffmpeg.display(), e))?;
        if !output.status.success() {
            anyhow::bail!("{} -version exited with {}", self.ffmpeg.display(), output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string())
    }
}

fn decode_pcm(bytes: &[u8], spec: PcmSpec) -> Result<Vec<f32>, PipelineError> {
    let interleaved =
        convert_audio_bytes_to_samples(bytes, spec.bit_depth).map_err(PipelineError::InvalidAudio)?;
    let mono = downmix_to_mono(&interleaved, spec.channels);
    debug!(
        "PCM input: {} samples at {}Hz after downmixing {} channels",
        mono.len(),
        spec.sample_rate,
        spec.channels
    );
    resample_to_16khz(&mono, spec.sample_rate, 1)
        .map_err(|e| PipelineError::InvalidAudio(format!("Failed to resample audio: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_samples;

    #[test]
    fn detects_supported_extensions_case_insensitively() {
        assert_eq!(AudioFormat::from_file_name("talk.MP3").unwrap(), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_file_name("a.b.flac").unwrap(), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_file_name("memo.m4a").unwrap(), AudioFormat::M4a);
        assert_eq!(AudioFormat::from_file_name("recording.pcm").unwrap(), AudioFormat::Pcm);
    }

    #[test]
    fn rejects_unknown_or_missing_extensions() {
        assert!(matches!(
            AudioFormat::from_file_name("notes.txt"),
            Err(PipelineError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            AudioFormat::from_file_name("audio"),
            Err(PipelineError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn pcm_spec_bounds_rate_and_channels() {
        let spec = |sample_rate, channels| PcmSpec {
            sample_rate,
            channels,
            bit_depth: 16,
        };
        assert!(spec(8_000, 1).validate().is_ok());
        assert!(spec(192_000, 8).validate().is_ok());
        for bad in [spec(1, 1), spec(0, 1), spec(7_999, 1), spec(192_001, 2), spec(16_000, 0), spec(16_000, 9)] {
            assert!(matches!(bad.validate(), Err(PipelineError::BadRequest(_))), "{bad:?}");
        }
    }

    #[test]
    fn payload_rejects_out_of_range_pcm_before_decoding() {
        let pcm = PcmSpec {
            sample_rate: 1,
            ..PcmSpec::default()
        };
        assert!(matches!(
            AudioPayload::new("recording.pcm", vec![0; 8000], Some(pcm)),
            Err(PipelineError::BadRequest(_))
        ));
    }

    #[test]
    fn payload_rejects_empty_uploads() {
        assert!(matches!(
            AudioPayload::new("a.wav", Vec::new(), None),
            Err(PipelineError::BadRequest(_))
        ));
    }

    #[test]
    fn payload_validates_pcm_spec() {
        let spec = PcmSpec {
            bit_depth: 8,
            ..PcmSpec::default()
        };
        assert!(AudioPayload::new("recording.pcm", vec![0; 4], Some(spec)).is_err());
    }

    #[test]
    fn decodes_raw_pcm_without_ffmpeg() {
        let samples = vec![0.25_f32; 2 * TARGET_SAMPLE_RATE as usize];
        let bytes = encode_samples(&samples, 16).unwrap();
        let payload = AudioPayload::new("recording.pcm", bytes, None).unwrap();
        let decoder = AudioDecoder::new("/nonexistent/ffmpeg");
        let decoded = decoder.decode(&payload).unwrap();
        assert_eq!(decoded.len(), samples.len());
        assert!((decoded[100] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn downmixes_stereo_pcm() {
        let stereo: Vec<f32> = (0..2 * TARGET_SAMPLE_RATE)
            .flat_map(|_| [0.5, -0.5])
            .collect();
        let bytes = encode_samples(&stereo, 16).unwrap();
        let spec = PcmSpec {
            channels: 2,
            ..PcmSpec::default()
        };
        let payload = AudioPayload::new("recording.pcm", bytes, Some(spec)).unwrap();
        let decoded = AudioDecoder::new("ffmpeg").decode(&payload).unwrap();
        assert_eq!(decoded.len(), 2 * TARGET_SAMPLE_RATE as usize);
        assert!(decoded.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn short_clips_are_rejected() {
        let bytes = encode_samples(&[0.1; 800], 16).unwrap();
        let payload = AudioPayload::new("recording.pcm", bytes, None).unwrap();
        assert!(matches!(
            AudioDecoder::new("ffmpeg").decode(&payload),
            Err(PipelineError::InvalidAudio(_))
        ));
    }

    #[test]
    fn missing_ffmpeg_is_reported_as_invalid_audio() {
        let payload = AudioPayload::new("clip.wav", vec![1, 2, 3, 4], None).unwrap();
        let result = AudioDecoder::new("/nonexistent/ffmpeg").decode(&payload);
        assert!(matches!(result, Err(PipelineError::InvalidAudio(_))));
    }
}
