use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.upload_directory.trim().is_empty() {
        return Err(invalid("upload_directory must not be empty"));
    }
    if config.worker_count == 0 {
        return Err(invalid("worker_count must be at least 1"));
    }
    if config.queue_capacity == 0 {
        return Err(invalid("queue_capacity must be at least 1"));
    }
    if config.max_file_size == 0 {
        return Err(invalid("max_file_size must be greater than 0"));
    }

    if !config.media.cover_timestamp_secs.is_finite() || config.media.cover_timestamp_secs < 0.0 {
        return Err(invalid("media.cover_timestamp_secs must be a non-negative number"));
    }
    if config.media.audio_sample_rate == 0 {
        return Err(invalid("media.audio_sample_rate must be greater than 0"));
    }

    if config.transcription.timeout_secs == 0 {
        return Err(invalid("transcription.timeout_secs must be greater than 0"));
    }
    if config.analysis.timeout_secs == 0 {
        return Err(invalid("analysis.timeout_secs must be greater than 0"));
    }
    if config.analysis.model_vision.trim().is_empty() || config.analysis.model_chat.trim().is_empty()
    {
        return Err(invalid("analysis model names must not be empty"));
    }
    if config.analysis.max_tokens == 0 {
        return Err(invalid("analysis.max_tokens must be greater than 0"));
    }

    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        return Err(invalid("retry.base_delay_ms must not exceed retry.max_delay_ms"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation {
        message: message.to_string(),
    }
}
