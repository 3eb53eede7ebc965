use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::subtitle::SubtitleError;
use crate::whisper::tier::ModelTier;

/// Everything that can go wrong while turning an upload into subtitles.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Model '{0}' is not loaded on this server")]
    ModelUnavailable(ModelTier),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("No speech could be recognized in the audio")]
    NoSpeech,

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::BadRequest(_) | PipelineError::ModelUnavailable(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            PipelineError::InvalidAudio(_) | PipelineError::NoSpeech => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::Translation(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Recognition(_) | PipelineError::Subtitle(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}
