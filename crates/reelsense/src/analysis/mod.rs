//! Cover text extraction and sentiment analysis through a vision/language model.

pub mod client;
pub mod prompt;
pub mod report;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use client::OpenAiClient;
pub use report::SentimentReport;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Analysis service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analysis service returned no choices")]
    EmptyResponse,

    #[error("Malformed sentiment report: {0}")]
    MalformedReport(String),

    #[error("Failed to read image '{path}': {source}")]
    ReadImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Rate limits, server errors and transport failures may succeed on a
    /// later attempt. Everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AnalysisError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Reads the text visible in an image, rendered as Markdown.
    async fn extract_text(&self, image_path: &Path) -> Result<String, AnalysisError>;

    /// Produces a structured sentiment report for `text`.
    async fn analyze_sentiment(&self, text: &str) -> Result<SentimentReport, AnalysisError>;
}
