#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use whisper_translate::audio::encode_samples;
use whisper_translate::error::PipelineError;
use whisper_translate::intake::AudioDecoder;
use whisper_translate::pipeline::{Pipeline, Recognition, RecognizedSegment, Recognizer};
use whisper_translate::translate::Translator;
use whisper_translate::whisper::tier::ModelTier;

pub const BOUNDARY: &str = "----whisper-translate-test-boundary";

/// Returns a fixed recognition and counts how often it was asked.
pub struct FakeRecognizer {
    pub recognition: Recognition,
    pub loaded: Vec<ModelTier>,
    pub calls: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new(segments: &[(u64, u64, &str)]) -> Self {
        Self {
            recognition: Recognition {
                language: "en".to_string(),
                segments: segments
                    .iter()
                    .map(|&(start_ms, end_ms, text)| RecognizedSegment {
                        start_ms,
                        end_ms,
                        text: text.to_string(),
                    })
                    .collect(),
            },
            loaded: vec![ModelTier::Base, ModelTier::Tiny],
            calls: AtomicUsize::new(0),
        }
    }

    /// Two sentences spread over a five second clip.
    pub fn two_sentences() -> Self {
        Self::new(&[(0, 2400, "Hello there."), (2600, 4800, "How are you today?")])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for FakeRecognizer {
    fn recognize(&self, samples: &[f32], tier: ModelTier) -> Result<Recognition, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!samples.is_empty());
        if !self.loaded.contains(&tier) {
            return Err(PipelineError::ModelUnavailable(tier));
        }
        Ok(self.recognition.clone())
    }

    fn loaded_tiers(&self) -> Vec<ModelTier> {
        self.loaded.clone()
    }
}

pub enum FakeTranslator {
    Prefix(&'static str),
    Blank,
    Failing,
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str) -> Result<String, PipelineError> {
        match self {
            FakeTranslator::Prefix(prefix) => Ok(format!("{prefix}{text}")),
            FakeTranslator::Blank => Ok(String::new()),
            FakeTranslator::Failing => Err(PipelineError::Translation(
                "Service returned 403 Forbidden".to_string(),
            )),
        }
    }
}

pub fn pipeline(recognizer: Arc<FakeRecognizer>, translator: FakeTranslator) -> Pipeline {
    Pipeline::new(
        AudioDecoder::new("/nonexistent/ffmpeg"),
        recognizer,
        Arc::new(translator),
    )
}

/// Raw 16kHz mono 16-bit PCM, as sent by the recording client.
pub fn pcm_clip(seconds: usize) -> Vec<u8> {
    let samples: Vec<f32> = (0..seconds * 16000)
        .map(|i| (i as f32 * 0.05).sin() * 0.2)
        .collect();
    encode_samples(&samples, 16).unwrap()
}

pub enum Part<'a> {
    File(&'a str, &'a str, Vec<u8>),
    Text(&'a str, &'a str),
}

/// Builds a multipart/form-data body and its content type.
pub fn multipart(parts: Vec<Part<'_>>) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
            }
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
