use serde::{Deserialize, Serialize};

use crate::pipeline::{Segment, Subtitles, Transcript};
use crate::subtitle::format_timecode;
use crate::whisper::tier::ModelTier;

/// Segments shown in the page preview before it is cut off.
const PREVIEW_SEGMENTS: usize = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessDto {
    pub success: bool,
    pub language: String,
    pub model: ModelTier,
    pub segments_count: usize,
    pub segments: Vec<SegmentDto>,
    pub original_text: String,
    pub translated_text: String,
    pub srt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bilingual_srt: Option<String>,
    pub srt_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bilingual_filename: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentDto {
    pub start_ms: u64,
    pub end_ms: u64,
    pub start: String,
    pub end: String,
    pub text: String,
    pub translated: String,
}

impl From<&Segment> for SegmentDto {
    fn from(segment: &Segment) -> Self {
        Self {
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            start: format_timecode(segment.start_ms),
            end: format_timecode(segment.end_ms),
            text: segment.source_text.clone(),
            translated: segment.translated_text.clone(),
        }
    }
}

impl ProcessDto {
    pub fn new(transcript: &Transcript, subtitles: Subtitles, upload_name: &str) -> Self {
        let stem = subtitle_stem(upload_name);
        let bilingual_filename = subtitles
            .bilingual
            .as_ref()
            .map(|_| format!("{stem}_bilingual_subtitle.srt"));

        Self {
            success: true,
            language: transcript.language.clone(),
            model: transcript.tier,
            segments_count: transcript.segments.len(),
            segments: transcript.segments.iter().map(SegmentDto::from).collect(),
            original_text: preview(transcript.source_texts()),
            translated_text: preview(transcript.translated_texts()),
            srt: subtitles.translated,
            bilingual_srt: subtitles.bilingual,
            srt_filename: format!("{stem}_chinese_subtitle.srt"),
            bilingual_filename,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub service: String,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsDto {
    pub default: ModelTier,
    pub loaded: Vec<ModelTier>,
    pub formats: Vec<String>,
}

fn preview<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    let texts: Vec<&str> = texts.collect();
    let mut out = texts
        .iter()
        .take(PREVIEW_SEGMENTS)
        .copied()
        .collect::<Vec<_>>()
        .join("\n");
    if texts.len() > PREVIEW_SEGMENTS {
        out.push_str("...");
    }
    out
}

/// Upload name without its extension, reduced to word characters, spaces and
/// dashes.
pub fn subtitle_stem(upload_name: &str) -> String {
    let base = upload_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(upload_name);
    let stem = base.rsplit_once('.').map_or(base, |(stem, _)| stem);
    let cleaned: String = stem
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "audio".to_string()
    } else {
        cleaned.to_string()
    }
}
