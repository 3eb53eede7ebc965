//! Dependency self-check, run while building the container image so a broken
//! image fails the build instead of the first request.

use anyhow::{Result, anyhow};
use log::{error, info};

use crate::intake::AudioDecoder;
use crate::translate::{GoogleTranslator, TranslateConfig, Translator};
use crate::whisper::config::WhisperConfig;
use crate::whisper::transcriber::WhisperRecognizer;

pub struct CheckOptions {
    pub decoder: AudioDecoder,
    pub whisper: WhisperConfig,
    pub translate: TranslateConfig,
    /// Skip checks that need network access.
    pub offline: bool,
}

pub async fn run_checks(options: CheckOptions) -> Result<()> {
    info!("🔍 Starting health check...");
    let mut failed = Vec::new();

    info!("📋 Checking ffmpeg...");
    match options.decoder.probe() {
        Ok(version) => info!("✅ {version}"),
        Err(e) => {
            error!("❌ ffmpeg unavailable: {e}");
            failed.push("ffmpeg");
        }
    }

    if options.offline {
        info!("⏭️  Skipping translator check (offline)");
    } else {
        info!("📋 Checking translator...");
        match check_translator(options.translate).await {
            Ok(result) => info!("✅ Translation test succeeded: {result}"),
            Err(e) => {
                error!("❌ Translator failed: {e}");
                failed.push("translator");
            }
        }
    }

    info!("📋 Checking Whisper model {}...", options.whisper.default_tier);
    let whisper = options.whisper;
    match tokio::task::spawn_blocking(move || WhisperRecognizer::load(whisper)).await {
        Ok(Ok(_)) => info!("✅ Whisper model loaded"),
        Ok(Err(e)) => {
            error!("❌ Whisper model failed: {e}");
            failed.push("whisper");
        }
        Err(e) => {
            error!("❌ Whisper model check panicked: {e}");
            failed.push("whisper");
        }
    }

    if failed.is_empty() {
        info!("🎉 All checks passed!");
        Ok(())
    } else {
        error!("💥 Checks failed: {}", failed.join(", "));
        Err(anyhow!("Health check failed: {}", failed.join(", ")))
    }
}

async fn check_translator(config: TranslateConfig) -> Result<String> {
    let translator = GoogleTranslator::new(config)?;
    Ok(translator.translate("Hello").await?)
}
