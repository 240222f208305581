//! Speech-to-text over an external transcription service.

pub mod client;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use client::WhisperClient;

/// Text recognized from a media file's audio track.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    pub text: String,
    pub language: Option<String>,
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Transcription request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transcription service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transcription rejected: {0}")]
    Rejected(String),

    #[error("Invalid transcription response: {0}")]
    InvalidResponse(String),

    #[error("Cannot resolve media path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the audio of the media at `media_path`.
    async fn transcribe(&self, media_path: &Path) -> Result<Transcript, TranscriptionError>;

    /// Succeeds when the service is reachable and reports itself healthy.
    async fn health_check(&self) -> Result<(), TranscriptionError>;
}
