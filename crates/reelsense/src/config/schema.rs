use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub upload_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub missing_audio: MissingAudioPolicy,
}

fn default_worker_count() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_max_file_size() -> u64 {
    500 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
    /// Offset of the frame used as the cover image.
    #[serde(default = "default_cover_timestamp")]
    pub cover_timestamp_secs: f64,
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate: u32,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_cover_timestamp() -> f64 {
    1.0
}

fn default_sample_rate() -> u32 {
    16_000
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            cover_timestamp_secs: default_cover_timestamp(),
            audio_sample_rate: default_sample_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default = "default_transcription_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_service_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_transcription_timeout() -> u64 {
    300
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_url: default_service_url(),
            timeout_secs: default_transcription_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API key given inline. Prefer `api_key_file` or the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    #[serde(default = "default_model")]
    pub model_vision: String,
    #[serde(default = "default_model")]
    pub model_chat: String,
    #[serde(default = "default_analysis_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env_var() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_analysis_timeout() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            model_vision: default_model(),
            model_chat: default_model(),
            timeout_secs: default_analysis_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Bounded retry for runs that fail with a transient error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// What to store in `videos.audio_path` when audio extraction fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAudioPolicy {
    /// Store NULL.
    #[default]
    Clear,
    /// Leave the column as it was.
    Skip,
    /// Store the path the artifact would have had.
    RecordPath,
}
