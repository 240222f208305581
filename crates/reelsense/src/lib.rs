pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod media;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod sanitize;
pub mod secrets;
pub mod transcription;
pub mod worker;

pub use analysis::{Analyzer, OpenAiClient, SentimentReport};
pub use config::{load_config, Config, MissingAudioPolicy};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, IngestError, MediaError, ReelsenseError, Result, WorkerError};
pub use ingest::{Ingestor, NewUpload};
pub use media::{FfmpegToolchain, MediaToolchain};
pub use models::{RiskLevel, RunStatus, SentimentLabel, VideoId};
pub use pipeline::{Pipeline, PipelineError, PipelineSettings, RunOutcome};
pub use queue::JobQueue;
pub use secrets::{resolve_api_key, resolve_secret, SecretError};
pub use transcription::{Transcriber, WhisperClient};
pub use worker::{PoolConfig, RetryPolicy, WorkerPool};
