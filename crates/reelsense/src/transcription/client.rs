//! HTTP client for the Whisper transcription service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Transcriber, Transcript, TranscriptionError};
use crate::config::TranscriptionConfig;
use crate::sanitize::{redact_path, redact_url, truncate_for_log, MAX_LOG_TEXT};

#[derive(Debug, Serialize)]
struct TranscribeRequest<'a> {
    video_path: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    success: bool,
    #[serde(default)]
    transcription: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warning: Option<String>,
}

/// Client for a Whisper service exposing `POST /transcribe` and `GET /health`.
pub struct WhisperClient {
    http: Client,
    base_url: String,
}

impl WhisperClient {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.service_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// The service runs in its own process, so relative paths are resolved
/// against our working directory first.
fn absolute_path(path: &Path) -> Result<PathBuf, TranscriptionError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| TranscriptionError::InvalidPath {
            path: path.display().to_string(),
            source: e,
        })
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript, TranscriptionError> {
        let absolute = absolute_path(media_path)?;
        let video_path = absolute.to_string_lossy();
        let url = format!("{}/transcribe", self.base_url);

        debug!(
            file = %redact_path(media_path),
            service = %redact_url(&self.base_url),
            "Requesting transcription"
        );

        let response = self
            .http
            .post(&url)
            .json(&TranscribeRequest {
                video_path: &video_path,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, MAX_LOG_TEXT),
            });
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        if !body.success {
            return Err(TranscriptionError::Rejected(
                body.error
                    .unwrap_or_else(|| "service reported failure without a message".to_string()),
            ));
        }

        if let Some(warning) = body.warning.filter(|w| !w.is_empty()) {
            warn!(file = %redact_path(media_path), %warning, "Transcription service warning");
        }

        Ok(Transcript {
            text: body.transcription,
            language: body.language.filter(|l| !l.is_empty()),
        })
    }

    async fn health_check(&self) -> Result<(), TranscriptionError> {
        let url = format!("{}/health", self.base_url);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
