//! SRT rendering.
//!
//! Each entry is written as
//!
//! ```text
//! 1
//! 00:00:01,200 --> 00:00:03,450
//! <text line(s)>
//!
//! ```
//!
//! Text is collapsed to a single line per language, so a translated entry
//! always carries one text line and a bilingual entry exactly two.

use std::fmt::Write as _;

use thiserror::Error;

use crate::pipeline::Segment;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubtitleError {
    #[error("entry {index} ends before it starts ({start_ms}ms > {end_ms}ms)")]
    InvalidRange {
        index: usize,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("entry {index} starts at {start_ms}ms, before the previous entry at {previous_ms}ms")]
    OutOfOrder {
        index: usize,
        start_ms: u64,
        previous_ms: u64,
    },

    #[error("entry {index} has no text")]
    EmptyText { index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubtitleMode {
    /// Translated line only.
    Translated,
    /// Original line followed by the translated line.
    Bilingual,
}

/// Formats milliseconds as `HH:MM:SS,mmm`.
pub fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Collapses every run of whitespace (newlines included) into one space.
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn render_srt(segments: &[Segment], mode: SubtitleMode) -> Result<String, SubtitleError> {
    let mut out = String::new();
    let mut previous_ms = 0;

    for (i, segment) in segments.iter().enumerate() {
        let index = i + 1;
        if segment.end_ms < segment.start_ms {
            return Err(SubtitleError::InvalidRange {
                index,
                start_ms: segment.start_ms,
                end_ms: segment.end_ms,
            });
        }
        if segment.start_ms < previous_ms {
            return Err(SubtitleError::OutOfOrder {
                index,
                start_ms: segment.start_ms,
                previous_ms,
            });
        }
        previous_ms = segment.start_ms;

        let translated = single_line(&segment.translated_text);
        if translated.is_empty() {
            return Err(SubtitleError::EmptyText { index });
        }

        // Writing into a String cannot fail.
        let _ = writeln!(out, "{index}");
        let _ = writeln!(
            out,
            "{} --> {}",
            format_timecode(segment.start_ms),
            format_timecode(segment.end_ms)
        );
        if mode == SubtitleMode::Bilingual {
            let original = single_line(&segment.source_text);
            if original.is_empty() {
                return Err(SubtitleError::EmptyText { index });
            }
            let _ = writeln!(out, "{original}");
        }
        let _ = writeln!(out, "{translated}");
        out.push('\n');
    }

    Ok(out)
}
