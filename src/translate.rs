use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use crate::error::PipelineError;
use crate::whisper::config::{env_var, parse_env};

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, PipelineError>;
}

#[derive(Clone, Debug)]
pub struct TranslateConfig {
    pub endpoint: String,
    /// Target language code understood by the endpoint.
    pub target: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            target: "zh-TW".to_string(),
            timeout: Duration::from_secs(15),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl TranslateConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            endpoint: env_var("TRANSLATE_ENDPOINT").unwrap_or(defaults.endpoint),
            target: env_var("TRANSLATE_TARGET").unwrap_or(defaults.target),
            timeout: parse_env("TRANSLATE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: parse_env("TRANSLATE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_backoff: parse_env("TRANSLATE_RETRY_BACKOFF_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
        })
    }
}

enum Failure {
    /// Worth another attempt: connection problems, throttling, server errors.
    Transient(String),
    Fatal(String),
}

/// Client for the public Google Translate `translate_a/single` endpoint.
pub struct GoogleTranslator {
    client: reqwest::Client,
    config: TranslateConfig,
}

impl GoogleTranslator {
    pub fn new(config: TranslateConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self { client, config })
    }

    pub fn target(&self) -> &str {
        &self.config.target
    }

    async fn request(&self, text: &str) -> Result<String, Failure> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.config.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| Failure::Transient(format!("Failed to send request: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Failure::Transient(format!("Failed to read response: {e}")))?;

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Failure::Transient(format!("Service returned {status}")));
        }
        if !status.is_success() {
            return Err(Failure::Fatal(format!("Service returned {status}: {body}")));
        }

        parse_translation(&body).map_err(Failure::Fatal)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str) -> Result<String, PipelineError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut attempt = 0;
        loop {
            match self.request(text).await {
                Ok(translated) => {
                    debug!("Translated {} chars to {}", text.len(), self.config.target);
                    return Ok(translated);
                }
                Err(Failure::Transient(reason)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Translation attempt {attempt} failed: {reason}; retrying ({} left)",
                        self.config.max_retries + 1 - attempt
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(Failure::Transient(reason)) | Err(Failure::Fatal(reason)) => {
                    return Err(PipelineError::Translation(reason));
                }
            }
        }
    }
}

/// Extracts the translation from a `translate_a/single?dt=t` response:
/// `[[["你好","Hello",null,null,10], ...], null, "en", ...]`.
pub fn parse_translation(body: &str) -> Result<String, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    let chunks = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| "Response has no translation chunks".to_string())?;

    Ok(chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
        .collect())
}
