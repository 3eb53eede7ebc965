use anyhow::{Result, anyhow};
use std::path::PathBuf;

use crate::whisper::tier::{ModelTier, parse_tier_list};

#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct WhisperConfig {
    pub models_dir: PathBuf,
    pub default_tier: ModelTier,
    /// Extra tiers loaded at startup when their model file is present.
    pub preload: Vec<ModelTier>,
    pub use_gpu: bool,
    /// Decode language, or "auto" to let Whisper detect it.
    pub language: String,
    /// 0 uses the model's full audio context.
    pub audio_context: i32,
    pub no_speech_threshold: f32,
    pub num_threads: i32,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            default_tier: ModelTier::Base,
            preload: Vec::new(),
            use_gpu: false,
            language: "auto".to_string(),
            audio_context: 0,
            no_speech_threshold: 0.6,
            num_threads: 4,
        }
    }
}

impl WhisperConfig {
    /// Reads `WHISPER_*` variables, falling back to defaults for anything
    /// unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            models_dir: env_var("WHISPER_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            default_tier: match env_var("WHISPER_MODEL") {
                Some(value) => value.parse().map_err(|e: String| anyhow!(e))?,
                None => defaults.default_tier,
            },
            preload: match env_var("WHISPER_PRELOAD") {
                Some(value) => parse_tier_list(&value).map_err(|e| anyhow!(e))?,
                None => defaults.preload,
            },
            use_gpu: parse_env("WHISPER_USE_GPU")?.unwrap_or(defaults.use_gpu),
            language: env_var("WHISPER_LANGUAGE").unwrap_or(defaults.language),
            audio_context: parse_env("WHISPER_AUDIO_CONTEXT")?.unwrap_or(defaults.audio_context),
            no_speech_threshold: parse_env("WHISPER_NO_SPEECH_THRESHOLD")?
                .unwrap_or(defaults.no_speech_threshold),
            num_threads: parse_env("WHISPER_THREADS")?.unwrap_or(defaults.num_threads),
        })
    }

    /// Default tier first, then the preload list without duplicates.
    pub fn tiers_to_load(&self) -> Vec<ModelTier> {
        let mut tiers = vec![self.default_tier];
        for tier in &self.preload {
            if !tiers.contains(tier) {
                tiers.push(*tier);
            }
        }
        tiers
    }
}

pub(crate) fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|value| {
            value
                .parse()
                .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, value, e))
        })
        .transpose()
}
