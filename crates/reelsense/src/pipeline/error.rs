use thiserror::Error;

use crate::analysis::AnalysisError;
use crate::db::DatabaseError;
use crate::error::MediaError;
use crate::models::VideoId;

/// Fatal pipeline errors. Each one aborts the run and, except for
/// `Cancelled`, marks the video and job failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Video {0} not found")]
    VideoNotFound(VideoId),

    #[error("Cover extraction failed: {0}")]
    CoverExtraction(MediaError),

    #[error("Cover text extraction failed: {0}")]
    CoverText(AnalysisError),

    #[error("Sentiment analysis failed: {0}")]
    Sentiment(AnalysisError),

    #[error("Worker panicked: {0}")]
    Panicked(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Database(e) => e.is_retryable(),
            PipelineError::CoverExtraction(e) => e.is_retryable(),
            PipelineError::CoverText(e) | PipelineError::Sentiment(e) => e.is_retryable(),
            PipelineError::VideoNotFound(_)
            | PipelineError::Panicked(_)
            | PipelineError::Cancelled => false,
        }
    }
}

/// Non-fatal stage failures; the run continues with degraded output.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    AudioExtractionFailed { error: String },
    TranscriptionFailed { error: String },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::AudioExtractionFailed { error } => {
                write!(f, "audio extraction failed: {}", error)
            }
            PipelineWarning::TranscriptionFailed { error } => {
                write!(f, "transcription failed: {}", error)
            }
        }
    }
}
