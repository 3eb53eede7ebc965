use actix_cors::Cors;
use actix_multipart::{Field, Multipart};
use actix_web::{
    App, HttpResponse, HttpServer, Responder, get, http::header, middleware::Logger, post, web,
};
use anyhow::{Result, anyhow};
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ServerConfig;
use crate::dto::{HealthDto, ModelsDto, ProcessDto, subtitle_stem};
use crate::error::PipelineError;
use crate::intake::{AudioDecoder, AudioFormat, PcmSpec};
use crate::pipeline::{Job, OutputMode, Pipeline, Recognizer, Transcript};
use crate::translate::{GoogleTranslator, TranslateConfig};
use crate::whisper::config::WhisperConfig;
use crate::whisper::tier::ModelTier;
use crate::whisper::transcriber::WhisperRecognizer;

const SERVICE_NAME: &str = "whisper-translate";
const INDEX_HTML: &str = include_str!("../static/index.html");

pub struct AppState {
    pub pipeline: Pipeline,
    pub default_tier: ModelTier,
    pub max_upload_bytes: usize,
}

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

pub async fn health_check() -> impl Responder {
    debug!("Health check endpoint called");
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    HttpResponse::Ok().json(HealthDto {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp,
    })
}

#[get("/api/v1/models")]
pub async fn list_models(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ModelsDto {
        default: data.default_tier,
        loaded: data.pipeline.loaded_tiers(),
        formats: AudioFormat::UPLOAD_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
    })
}

#[post("/api/v1/process")]
pub async fn process_upload(
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, PipelineError> {
    debug!("Process request received");
    let (transcript, upload_name) = run_job(&data, payload).await?;
    let subtitles = transcript.subtitles()?;
    Ok(HttpResponse::Ok().json(ProcessDto::new(&transcript, subtitles, &upload_name)))
}

#[post("/api/v1/subtitles")]
pub async fn subtitle_download(
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, PipelineError> {
    debug!("Subtitle download request received");
    let (transcript, upload_name) = run_job(&data, payload).await?;
    let subtitles = transcript.subtitles()?;

    let stem = ascii_only(&subtitle_stem(&upload_name));
    let (body, filename) = match subtitles.bilingual {
        Some(bilingual) => (bilingual, format!("{stem}_bilingual_subtitle.srt")),
        None => (
            subtitles.translated,
            format!("{stem}_chinese_subtitle.srt"),
        ),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ))
        .body(body))
}

/// Form fields accepted by the processing endpoints.
#[derive(Default)]
struct UploadForm {
    audio: Option<(String, Vec<u8>)>,
    model: Option<ModelTier>,
    mode: OutputMode,
    sample_rate: Option<u32>,
    channels: Option<usize>,
    bit_depth: Option<u8>,
}

impl UploadForm {
    fn pcm_spec(&self) -> Option<PcmSpec> {
        if self.sample_rate.is_none() && self.channels.is_none() && self.bit_depth.is_none() {
            return None;
        }
        let defaults = PcmSpec::default();
        Some(PcmSpec {
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            channels: self.channels.unwrap_or(defaults.channels),
            bit_depth: self.bit_depth.unwrap_or(defaults.bit_depth),
        })
    }
}

async fn run_job(
    data: &AppState,
    payload: Multipart,
) -> Result<(Transcript, String), PipelineError> {
    let form = read_form(payload, data.max_upload_bytes).await?;
    let pcm = form.pcm_spec();
    let tier = form.model.unwrap_or(data.default_tier);
    let mode = form.mode;

    let Some((file_name, bytes)) = form.audio else {
        warn!("No audio file provided in request");
        return Err(PipelineError::BadRequest("No audio file provided".to_string()));
    };

    let job = Job::new(file_name.clone(), bytes, pcm, tier, mode).inspect_err(|e| {
        warn!("Rejected upload '{file_name}': {e}");
    })?;

    let transcript = data.pipeline.run(job).await.inspect_err(|e| {
        warn!("Processing '{file_name}' failed: {e}");
    })?;

    Ok((transcript, file_name))
}

async fn read_form(mut payload: Multipart, limit: usize) -> Result<UploadForm, PipelineError> {
    let mut form = UploadForm::default();

    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| PipelineError::BadRequest(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .unwrap_or_default()
                    .to_string();
                let bytes = read_field_data(field, limit).await?;
                debug!("Audio data received: '{}', {} bytes", file_name, bytes.len());
                form.audio = Some((file_name, bytes));
            }
            "model" => {
                let text = read_text_field(field).await?;
                if !text.is_empty() {
                    form.model = Some(text.parse().map_err(PipelineError::BadRequest)?);
                }
            }
            "bilingual" => {
                let text = read_text_field(field).await?;
                if matches!(text.to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes") {
                    form.mode = OutputMode::Bilingual;
                }
            }
            "sample_rate" => form.sample_rate = Some(parse_number(field, "sample_rate").await?),
            "channels" => form.channels = Some(parse_number(field, "channels").await?),
            "bit_depth" => form.bit_depth = Some(parse_number(field, "bit_depth").await?),
            other => debug!("Ignoring form field '{other}'"),
        }
    }

    Ok(form)
}

async fn read_field_data(mut field: Field, limit: usize) -> Result<Vec<u8>, PipelineError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| PipelineError::BadRequest(format!("Failed to read form field: {e}")))?
    {
        if data.len() + chunk.len() > limit {
            return Err(PipelineError::BadRequest(format!(
                "Form field exceeds the {limit} byte limit"
            )));
        }
        data.extend_from_slice(&chunk);
    }
    debug!("Read field data: {} bytes", data.len());
    Ok(data)
}

async fn read_text_field(field: Field) -> Result<String, PipelineError> {
    // Text fields are tiny; anything over 1KB is not a form value.
    let bytes = read_field_data(field, 1024).await?;
    String::from_utf8(bytes)
        .map(|text| text.trim().to_string())
        .map_err(|_| PipelineError::BadRequest("Form field is not valid UTF-8".to_string()))
}

async fn parse_number<T: std::str::FromStr>(
    field: Field,
    name: &str,
) -> Result<T, PipelineError> {
    let text = read_text_field(field).await?;
    text.parse()
        .map_err(|_| PipelineError::BadRequest(format!("Invalid {name}: '{text}'")))
}

fn ascii_only(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') { c } else { '_' })
        .collect()
}

/// Routes of the main listener.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .route("/health", web::get().to(health_check))
        .route("/api/v1/health", web::get().to(health_check))
        .service(list_models)
        .service(process_upload)
        .service(subtitle_download);
}

pub async fn run_server(
    config: ServerConfig,
    whisper_config: WhisperConfig,
    translate_config: TranslateConfig,
) -> Result<()> {
    info!("Starting {SERVICE_NAME}");
    info!(
        "Using configuration: models_dir={:?}, default_model={}, use_gpu={}, language={}, num_threads={}",
        whisper_config.models_dir,
        whisper_config.default_tier,
        whisper_config.use_gpu,
        whisper_config.language,
        whisper_config.num_threads
    );

    let default_tier = whisper_config.default_tier;
    let recognizer = WhisperRecognizer::load(whisper_config)?;
    info!("Whisper models loaded: {:?}", recognizer.loaded_tiers());

    let translator = GoogleTranslator::new(translate_config)?;
    info!("Translating to {}", translator.target());

    let pipeline = Pipeline::new(
        AudioDecoder::new(config.ffmpeg_path.clone()),
        Arc::new(recognizer),
        Arc::new(translator),
    );

    let app_state = web::Data::new(AppState {
        pipeline,
        default_tier,
        max_upload_bytes: config.max_upload_bytes,
    });

    info!("Starting HTTP server on {}:{}", config.host, config.port);
    let main_server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))
    .map_err(|e| anyhow!("Failed to bind {}:{}: {}", config.host, config.port, e))?
    .run();

    match config.health_port {
        Some(health_port) => {
            info!("Starting health listener on {}:{}", config.host, health_port);
            let health_server = HttpServer::new(|| {
                App::new().route("/health", web::get().to(health_check))
            })
            .workers(1)
            .bind((config.host.as_str(), health_port))
            .map_err(|e| anyhow!("Failed to bind {}:{}: {}", config.host, health_port, e))?
            .run();

            futures_util::future::try_join(main_server, health_server).await?;
        }
        None => main_server.await?,
    }

    Ok(())
}
