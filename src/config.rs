use std::path::PathBuf;

use crate::intake::PcmSpec;
use crate::pipeline::OutputMode;
use crate::whisper::tier::ModelTier;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Separate listener that only answers `/health`.
    pub health_port: Option<u16>,
    pub max_upload_bytes: usize,
    pub ffmpeg_path: PathBuf,
}

#[derive(Debug)]
pub struct ClientConfig {
    pub server_url: String,
    pub audio_file: Option<String>,
    pub model: ModelTier,
    pub mode: OutputMode,
    pub output_dir: PathBuf,
    pub sample_rate: u32,
    pub channels: usize,
    pub bit_depth: u8,
    pub record_mode: bool,
    pub record_duration: u32,
}

impl ClientConfig {
    pub fn new_file_mode(
        server_url: String,
        audio_file: String,
        model: ModelTier,
        mode: OutputMode,
        output_dir: PathBuf,
    ) -> Self {
        let pcm = PcmSpec::default();
        Self {
            server_url,
            audio_file: Some(audio_file),
            model,
            mode,
            output_dir,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
            bit_depth: pcm.bit_depth,
            record_mode: false,
            record_duration: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_record_mode(
        server_url: String,
        model: ModelTier,
        mode: OutputMode,
        output_dir: PathBuf,
        sample_rate: u32,
        channels: usize,
        bit_depth: u8,
        record_duration: u32,
    ) -> Self {
        Self {
            server_url,
            audio_file: None,
            model,
            mode,
            output_dir,
            sample_rate,
            channels,
            bit_depth,
            record_mode: true,
            record_duration,
        }
    }
}
