//! Secret resolution from multiple sources.
//!
//! Secrets are looked up in priority order:
//!
//! 1. **Direct value** - for quick local testing (`"api_key": "sk-..."`)
//! 2. **File reference** - Docker secrets pattern (`"api_key_file": "/run/secrets/openai"`)
//! 3. **Env var reference** - for production (`"api_key_env_var": "OPENAI_API_KEY"`)

use secrecy::SecretString;
use std::fs;

use crate::config::AnalysisConfig;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret from {source_kind} is empty")]
    Empty { source_kind: &'static str },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// File contents and environment values are trimmed. A source that is
/// named but yields an empty value is an error rather than a fallthrough.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        return non_empty(content.trim(), "file");
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => non_empty(value.trim(), "environment"),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_empty(value: &str, source_kind: &'static str) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty { source_kind });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Resolves the analysis API key from its configured sources.
pub fn resolve_api_key(config: &AnalysisConfig) -> Result<SecretString> {
    resolve_secret(
        config.api_key.as_deref(),
        config.api_key_file.as_deref(),
        Some(config.api_key_env_var.as_str()),
    )
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/...` forms are left untouched.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
