use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::whisper::tier::{ModelTier, parse_tier_list};

#[derive(Parser)]
#[command(
    name = "whisper-translate",
    about = "Whisper Translate - speech to Traditional Chinese subtitles",
    long_about = "Transcribes speech in any language with Whisper, translates it to Traditional Chinese and exports SRT subtitles, either through a web form or from the command line.",
    after_help = "EXAMPLES:\n    # Download a model and start the web form on port 7860\n    whisper-translate download base\n    whisper-translate serve\n\n    # Serve on 8080 with a separate health listener\n    whisper-translate serve --port 8080 --health-port 8081\n\n    # Generate bilingual subtitles for a file\n    whisper-translate file talk.mp3 --bilingual --model small\n\n    # Record 10 seconds from the microphone\n    whisper-translate record --duration 10\n\n    # Verify ffmpeg, translator and model before shipping an image\n    whisper-translate check"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web form and API.
    #[command(name = "serve")]
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "PORT", default_value = "7860")]
        port: u16,

        /// Extra listener answering only /health.
        #[arg(long, env = "HEALTH_PORT")]
        health_port: Option<u16>,

        #[arg(long, env = "WHISPER_MODELS_DIR")]
        models_dir: Option<PathBuf>,

        /// Default model tier.
        #[arg(long, env = "WHISPER_MODEL")]
        model: Option<ModelTier>,

        /// Additional tiers to load, comma separated.
        #[arg(long, env = "WHISPER_PRELOAD", value_parser = validate_tiers)]
        preload: Option<String>,

        #[arg(long, env = "MAX_UPLOAD_MB", default_value = "100")]
        max_upload_mb: usize,

        #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },
    /// Upload an audio file to a running server and save the subtitles.
    #[command(name = "file")]
    TranscribeFile {
        audio_file: String,

        #[arg(long, default_value = "http://localhost:7860")]
        server_url: String,

        #[arg(long, short = 'm', default_value = "base")]
        model: ModelTier,

        #[arg(long)]
        bilingual: bool,

        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,
    },
    /// Record from the microphone and process the recording.
    #[command(name = "record")]
    Record {
        #[arg(long, short = 'd', default_value = "5")]
        duration: u32,

        #[arg(long, default_value = "http://localhost:7860")]
        server_url: String,

        #[arg(long, short = 'm', default_value = "base")]
        model: ModelTier,

        #[arg(long)]
        bilingual: bool,

        #[arg(long, short = 'o', default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, default_value = "16000")]
        sample_rate: u32,

        #[arg(long, default_value = "1")]
        channels: usize,

        #[arg(long, default_value = "16", value_parser = validate_bit_depth)]
        bit_depth: u8,
    },
    /// Download a ggml model file.
    #[command(name = "download")]
    Download {
        #[arg(required_unless_present = "list")]
        model: Option<ModelTier>,

        #[arg(long, env = "WHISPER_MODELS_DIR", default_value = "models")]
        models_dir: PathBuf,

        /// List the available models and exit.
        #[arg(long)]
        list: bool,
    },
    /// Check that ffmpeg, the translator and the default model work.
    #[command(name = "check")]
    Check {
        /// Skip the translator check.
        #[arg(long)]
        offline: bool,

        #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
        ffmpeg: PathBuf,
    },
    /// Probe the health endpoint of a running server.
    #[command(name = "health")]
    Health {
        #[arg(long, default_value = "http://localhost:7860")]
        server_url: String,
    },
}

pub fn validate_bit_depth(s: &str) -> Result<u8, String> {
    match s.parse::<u8>() {
        Ok(depth @ (16 | 24 | 32)) => Ok(depth),
        Ok(_) => Err("Bit depth must be 16, 24, or 32".to_string()),
        Err(_) => Err("Invalid bit depth value".to_string()),
    }
}

/// Checks a comma separated tier list while keeping it as text.
fn validate_tiers(s: &str) -> Result<String, String> {
    parse_tier_list(s).map(|_| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bit_depth_validation() {
        assert_eq!(validate_bit_depth("24"), Ok(24));
        assert!(validate_bit_depth("8").is_err());
        assert!(validate_bit_depth("abc").is_err());
    }

    #[test]
    fn parses_file_command() {
        let cli = Cli::try_parse_from([
            "whisper-translate",
            "file",
            "talk.mp3",
            "--bilingual",
            "--model",
            "small",
        ])
        .unwrap();
        match cli.command {
            Commands::TranscribeFile {
                audio_file,
                model,
                bilingual,
                ..
            } => {
                assert_eq!(audio_file, "talk.mp3");
                assert_eq!(model, ModelTier::Small);
                assert!(bilingual);
            }
            _ => panic!("expected file command"),
        }
    }

    #[test]
    fn rejects_unknown_model() {
        assert!(Cli::try_parse_from(["whisper-translate", "file", "a.wav", "-m", "huge"]).is_err());
    }
}
