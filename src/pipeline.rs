use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::intake::{AudioDecoder, AudioPayload, PcmSpec};
use crate::subtitle::{SubtitleError, SubtitleMode, render_srt};
use crate::translate::Translator;
use crate::whisper::tier::ModelTier;

/// A time-bounded span of recognized speech together with its translation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub source_text: String,
    pub source_language: String,
    pub translated_text: String,
}

/// A segment as it comes out of the speech engine, before translation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognizedSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recognition {
    pub language: String,
    pub segments: Vec<RecognizedSegment>,
}

/// Speech-to-text engine. Receives 16kHz mono samples and blocks while it
/// works, so callers run it off the async executor.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, samples: &[f32], tier: ModelTier) -> Result<Recognition, PipelineError>;

    fn loaded_tiers(&self) -> Vec<ModelTier>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Translated subtitles only.
    #[default]
    Translation,
    /// Translated subtitles plus an original/translated subtitle file.
    Bilingual,
}

#[derive(Debug)]
pub struct Job {
    pub audio: AudioPayload,
    pub tier: ModelTier,
    pub mode: OutputMode,
}

impl Job {
    pub fn new(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        pcm: Option<PcmSpec>,
        tier: ModelTier,
        mode: OutputMode,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            audio: AudioPayload::new(file_name, bytes, pcm)?,
            tier,
            mode,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Transcript {
    pub language: String,
    pub tier: ModelTier,
    pub mode: OutputMode,
    pub segments: Vec<Segment>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subtitles {
    pub translated: String,
    pub bilingual: Option<String>,
}

impl Transcript {
    pub fn subtitles(&self) -> Result<Subtitles, SubtitleError> {
        let translated = render_srt(&self.segments, SubtitleMode::Translated)?;
        let bilingual = match self.mode {
            OutputMode::Bilingual => Some(render_srt(&self.segments, SubtitleMode::Bilingual)?),
            OutputMode::Translation => None,
        };
        Ok(Subtitles {
            translated,
            bilingual,
        })
    }

    pub fn source_texts(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.source_text.as_str())
    }

    pub fn translated_texts(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.translated_text.as_str())
    }
}

/// Decode, recognize, translate. Shared by every request.
#[derive(Clone)]
pub struct Pipeline {
    decoder: AudioDecoder,
    recognizer: Arc<dyn Recognizer>,
    translator: Arc<dyn Translator>,
}

impl Pipeline {
    pub fn new(
        decoder: AudioDecoder,
        recognizer: Arc<dyn Recognizer>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            decoder,
            recognizer,
            translator,
        }
    }

    pub fn loaded_tiers(&self) -> Vec<ModelTier> {
        self.recognizer.loaded_tiers()
    }

    pub async fn run(&self, job: Job) -> Result<Transcript, PipelineError> {
        let Job { audio, tier, mode } = job;
        info!(
            "Processing '{}' ({}, {} bytes) with model {}",
            audio.file_name,
            audio.format,
            audio.bytes.len(),
            tier
        );

        if !self.recognizer.loaded_tiers().contains(&tier) {
            warn!("Model {tier} requested but not loaded");
            return Err(PipelineError::ModelUnavailable(tier));
        }

        let decoder = self.decoder.clone();
        let recognizer = Arc::clone(&self.recognizer);
        let recognition = tokio::task::spawn_blocking(move || {
            let samples = decoder.decode(&audio)?;
            recognizer.recognize(&samples, tier)
        })
        .await
        .map_err(|e| PipelineError::Recognition(format!("Recognition task failed: {e}")))??;

        if recognition.segments.is_empty() {
            warn!("Recognition produced no segments");
            return Err(PipelineError::NoSpeech);
        }

        info!(
            "Recognized {} segments, detected language: {}",
            recognition.segments.len(),
            recognition.language
        );

        let total = recognition.segments.len();
        let mut segments = Vec::with_capacity(total);
        for (i, recognized) in recognition.segments.into_iter().enumerate() {
            let mut translated_text = self.translator.translate(&recognized.text).await?;
            if translated_text.trim().is_empty() {
                warn!(
                    "Translation of segment {} came back empty, keeping the original text",
                    i + 1
                );
                translated_text = recognized.text.clone();
            }
            debug!("Translated segment {}/{}", i + 1, total);

            segments.push(Segment {
                start_ms: recognized.start_ms,
                end_ms: recognized.end_ms,
                source_text: recognized.text,
                source_language: recognition.language.clone(),
                translated_text,
            });
        }

        info!("Translation completed for {total} segments");

        Ok(Transcript {
            language: recognition.language,
            tier,
            mode,
            segments,
        })
    }
}
