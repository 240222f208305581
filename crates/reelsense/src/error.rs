use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReelsenseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Media toolchain error: {0}")]
    Media(#[from] MediaError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] crate::transcription::TranscriptionError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to create output directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ProcessFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to parse {tool} output '{output}'")]
    InvalidOutput { tool: String, output: String },
}

impl MediaError {
    /// Only a spawn refused for lack of resources is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            MediaError::Spawn { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("File '{filename}' is {size} bytes, limit is {limit}")]
    FileTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register upload: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job queue closed")]
    QueueClosed,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Job queue closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, ReelsenseError>;
