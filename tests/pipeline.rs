mod common;

use std::sync::Arc;

use common::{FakeRecognizer, FakeTranslator, pcm_clip, pipeline};
use whisper_translate::error::PipelineError;
use whisper_translate::pipeline::{Job, OutputMode};
use whisper_translate::whisper::tier::ModelTier;

fn job(file_name: &str, bytes: Vec<u8>, mode: OutputMode) -> Job {
    Job::new(file_name, bytes, None, ModelTier::Base, mode).unwrap()
}

#[tokio::test]
async fn two_sentence_clip_yields_two_segments_and_entries() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer.clone(), FakeTranslator::Prefix("譯:"));

    let transcript = pipeline
        .run(job("recording.pcm", pcm_clip(5), OutputMode::Translation))
        .await
        .unwrap();

    assert_eq!(recognizer.calls(), 1);
    assert_eq!(transcript.language, "en");
    assert_eq!(transcript.segments.len(), 2);
    for segment in &transcript.segments {
        assert!(segment.start_ms < segment.end_ms);
        assert_eq!(segment.source_language, "en");
        assert_eq!(segment.translated_text, format!("譯:{}", segment.source_text));
    }

    let subtitles = transcript.subtitles().unwrap();
    assert_eq!(subtitles.translated.trim_end().split("\n\n").count(), 2);
    assert!(subtitles.bilingual.is_none());
    assert!(subtitles.translated.starts_with("1\n00:00:00,000 --> 00:00:02,400\n譯:Hello there.\n"));
}

#[tokio::test]
async fn bilingual_mode_renders_both_files() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer, FakeTranslator::Prefix("中:"));

    let transcript = pipeline
        .run(job("recording.pcm", pcm_clip(5), OutputMode::Bilingual))
        .await
        .unwrap();
    let subtitles = transcript.subtitles().unwrap();
    let bilingual = subtitles.bilingual.unwrap();

    let blocks: Vec<&str> = bilingual.trim_end().split("\n\n").collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(
        blocks[1],
        "2\n00:00:02,600 --> 00:00:04,800\nHow are you today?\n中:How are you today?"
    );
}

#[tokio::test]
async fn reruns_are_structurally_identical() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer, FakeTranslator::Prefix(""));

    let first = pipeline
        .run(job("recording.pcm", pcm_clip(3), OutputMode::Translation))
        .await
        .unwrap();
    let second = pipeline
        .run(job("recording.pcm", pcm_clip(3), OutputMode::Translation))
        .await
        .unwrap();

    let bounds = |t: &whisper_translate::pipeline::Transcript| {
        t.segments
            .iter()
            .map(|s| (s.start_ms, s.end_ms))
            .collect::<Vec<_>>()
    };
    assert_eq!(bounds(&first), bounds(&second));
}

#[tokio::test]
async fn empty_translation_falls_back_to_source_text() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer, FakeTranslator::Blank);

    let transcript = pipeline
        .run(job("recording.pcm", pcm_clip(5), OutputMode::Translation))
        .await
        .unwrap();
    assert_eq!(transcript.segments[0].translated_text, "Hello there.");
}

#[tokio::test]
async fn translation_failure_is_reported() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer, FakeTranslator::Failing);

    let result = pipeline
        .run(job("recording.pcm", pcm_clip(5), OutputMode::Translation))
        .await;
    assert!(matches!(result, Err(PipelineError::Translation(_))));
}

#[tokio::test]
async fn silence_without_segments_is_no_speech() {
    let recognizer = Arc::new(FakeRecognizer::new(&[]));
    let pipeline = pipeline(recognizer, FakeTranslator::Prefix(""));

    let result = pipeline
        .run(job("recording.pcm", pcm_clip(2), OutputMode::Translation))
        .await;
    assert!(matches!(result, Err(PipelineError::NoSpeech)));
}

#[tokio::test]
async fn short_clips_never_reach_the_recognizer() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer.clone(), FakeTranslator::Prefix(""));

    let short = pcm_clip(1)[..8000].to_vec();
    let result = pipeline
        .run(job("recording.pcm", short, OutputMode::Translation))
        .await;
    assert!(matches!(result, Err(PipelineError::InvalidAudio(_))));
    assert_eq!(recognizer.calls(), 0);
}

#[tokio::test]
async fn unloaded_tier_is_unavailable() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer, FakeTranslator::Prefix(""));

    let job = Job::new(
        "recording.pcm",
        pcm_clip(2),
        None,
        ModelTier::Medium,
        OutputMode::Translation,
    )
    .unwrap();
    assert!(matches!(
        pipeline.run(job).await,
        Err(PipelineError::ModelUnavailable(ModelTier::Medium))
    ));
}

#[tokio::test]
async fn unloaded_tier_is_rejected_before_decoding() {
    let recognizer = Arc::new(FakeRecognizer::two_sentences());
    let pipeline = pipeline(recognizer.clone(), FakeTranslator::Prefix(""));

    // The test decoder has no ffmpeg, so decoding this would fail as InvalidAudio.
    let job = Job::new(
        "talk.mp3",
        vec![0xFF; 4096],
        None,
        ModelTier::Small,
        OutputMode::Translation,
    )
    .unwrap();
    assert!(matches!(
        pipeline.run(job).await,
        Err(PipelineError::ModelUnavailable(ModelTier::Small))
    ));
    assert_eq!(recognizer.calls(), 0);
}

#[test]
fn unsupported_extensions_are_rejected_when_the_job_is_built() {
    let result = Job::new(
        "slides.pdf",
        vec![1, 2, 3],
        None,
        ModelTier::Base,
        OutputMode::Translation,
    );
    assert!(matches!(result, Err(PipelineError::UnsupportedFormat(_))));
}
