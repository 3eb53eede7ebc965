use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Mutex;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::error::PipelineError;
use crate::pipeline::{Recognition, RecognizedSegment, Recognizer};
use crate::whisper::config::WhisperConfig;
use crate::whisper::tier::ModelTier;

/// Whisper models loaded once at startup and reused by every request.
pub struct WhisperRecognizer {
    models: BTreeMap<ModelTier, Mutex<WhisperContext>>,
    config: WhisperConfig,
}

impl WhisperRecognizer {
    /// Loads the default tier (required) and any preload tiers whose model
    /// file exists.
    pub fn load(config: WhisperConfig) -> Result<Self> {
        let mut models = BTreeMap::new();

        for tier in config.tiers_to_load() {
            let path = tier.model_path(&config.models_dir);
            if !path.exists() {
                if tier == config.default_tier {
                    return Err(anyhow!(
                        "Model file {} not found (run `whisper-translate download {}`)",
                        path.display(),
                        tier
                    ));
                }
                warn!(
                    "Skipping model {}: {} not found (run `whisper-translate download {}`)",
                    tier,
                    path.display(),
                    tier
                );
                continue;
            }

            info!("Loading Whisper model {} from {}", tier, path.display());
            let ctx = load_context(&path, config.use_gpu)
                .map_err(|e| anyhow!("Failed to load model {}: {}", tier, e))?;
            models.insert(tier, Mutex::new(ctx));
        }

        Ok(Self { models, config })
    }

    fn params(&self) -> FullParams<'_, '_> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(Some(self.config.language.as_str()));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        if self.config.audio_context > 0 {
            params.set_audio_ctx(self.config.audio_context);
        }
        params.set_no_speech_thold(self.config.no_speech_threshold);
        params.set_n_threads(self.config.num_threads);
        params
    }
}

fn load_context(path: &std::path::Path, use_gpu: bool) -> Result<WhisperContext> {
    let path = path
        .to_str()
        .ok_or_else(|| anyhow!("Model path {} is not valid UTF-8", path.display()))?;

    let mut ctx_params = WhisperContextParameters::default();
    ctx_params.use_gpu(use_gpu);

    WhisperContext::new_with_params(path, ctx_params).map_err(|e| anyhow!("{}", e))
}

impl Recognizer for WhisperRecognizer {
    fn recognize(&self, samples: &[f32], tier: ModelTier) -> Result<Recognition, PipelineError> {
        let model = self
            .models
            .get(&tier)
            .ok_or(PipelineError::ModelUnavailable(tier))?;

        let fail = |what: &str, e: whisper_rs::WhisperError| {
            PipelineError::Recognition(format!("{what}: {e}"))
        };

        // One inference per model at a time; the context itself is never
        // modified after loading.
        let ctx = model
            .lock()
            .map_err(|_| PipelineError::Recognition("Model lock poisoned".to_string()))?;

        let mut state = ctx
            .create_state()
            .map_err(|e| fail("Failed to create whisper state", e))?;

        debug!("Running {} on {} samples", tier, samples.len());
        state
            .full(self.params(), samples)
            .map_err(|e| fail("Failed to run transcription", e))?;

        let language = state
            .full_lang_id_from_state()
            .ok()
            .and_then(whisper_rs::get_lang_str)
            .unwrap_or(self.config.language.as_str())
            .to_string();

        let num_segments = state
            .full_n_segments()
            .map_err(|e| fail("Failed to get segment count", e))?;

        let mut raw = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| fail("Failed to get segment text", e))?;
            let t0 = state
                .full_get_segment_t0(i)
                .map_err(|e| fail("Failed to get segment start", e))?;
            let t1 = state
                .full_get_segment_t1(i)
                .map_err(|e| fail("Failed to get segment end", e))?;
            raw.push((t0, t1, text));
        }

        Ok(Recognition {
            language,
            segments: normalize_segments(raw),
        })
    }

    fn loaded_tiers(&self) -> Vec<ModelTier> {
        self.models.keys().copied().collect()
    }
}

/// Whisper reports times in centiseconds. Blank segments are dropped, end is
/// clamped to start, and the result is ordered by start time.
fn normalize_segments(raw: Vec<(i64, i64, String)>) -> Vec<RecognizedSegment> {
    let mut segments: Vec<RecognizedSegment> = raw
        .into_iter()
        .filter_map(|(t0, t1, text)| {
            let text = text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let start_ms = t0.max(0) as u64 * 10;
            let end_ms = (t1.max(0) as u64 * 10).max(start_ms);
            Some(RecognizedSegment {
                start_ms,
                end_ms,
                text,
            })
        })
        .collect();
    segments.sort_by_key(|s| s.start_ms);
    segments
}
