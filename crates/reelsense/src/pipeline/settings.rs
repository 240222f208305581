use crate::config::{Config, MissingAudioPolicy};

/// Knobs the pipeline reads on every run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub cover_timestamp_secs: f64,
    pub missing_audio: MissingAudioPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cover_timestamp_secs: config.media.cover_timestamp_secs,
            missing_audio: config.missing_audio,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cover_timestamp_secs: 1.0,
            missing_audio: MissingAudioPolicy::default(),
        }
    }
}
