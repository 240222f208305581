//! `ffmpeg` / `ffprobe` backed [`MediaToolchain`].

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::MediaToolchain;
use crate::config::MediaConfig;
use crate::error::MediaError;
use crate::sanitize::{redact_path, truncate_for_log, MAX_LOG_TEXT};

/// Runs the ffmpeg binaries as child processes. Children are killed when
/// the awaiting future is dropped, so a cancelled stage leaves no process
/// behind.
#[derive(Debug, Clone)]
pub struct FfmpegToolchain {
    ffmpeg: String,
    ffprobe: String,
    sample_rate: u32,
}

impl FfmpegToolchain {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
            sample_rate: config.audio_sample_rate,
        }
    }

    async fn run(&self, tool: &str, command: &mut Command) -> Result<Output, MediaError> {
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                tool: tool.to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(
                tool,
                status = %output.status,
                stderr = %truncate_for_log(&stderr, MAX_LOG_TEXT),
                "Media tool failed"
            );
            return Err(MediaError::ProcessFailed {
                tool: tool.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output)
    }
}

async fn ensure_parent(output: &Path) -> Result<(), MediaError> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MediaError::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    Ok(())
}

#[async_trait]
impl MediaToolchain for FfmpegToolchain {
    async fn extract_frame(
        &self,
        source: &Path,
        output: &Path,
        timestamp_secs: f64,
    ) -> Result<(), MediaError> {
        ensure_parent(output).await?;
        debug!(source = %redact_path(source), timestamp_secs, "Extracting cover frame");

        self.run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .arg("-ss")
                .arg(format!("{:.2}", timestamp_secs))
                .arg("-i")
                .arg(source)
                .args(["-vframes", "1", "-q:v", "2", "-y"])
                .arg(output),
        )
        .await?;
        Ok(())
    }

    async fn extract_audio(&self, source: &Path, output: &Path) -> Result<(), MediaError> {
        ensure_parent(output).await?;
        debug!(source = %redact_path(source), "Extracting audio track");

        self.run(
            &self.ffmpeg,
            Command::new(&self.ffmpeg)
                .arg("-i")
                .arg(source)
                .args(["-vn", "-acodec", "pcm_s16le", "-ar"])
                .arg(self.sample_rate.to_string())
                .args(["-ac", "1", "-y"])
                .arg(output),
        )
        .await?;
        Ok(())
    }

    async fn probe_duration(&self, source: &Path) -> Result<f64, MediaError> {
        let output = self
            .run(
                &self.ffprobe,
                Command::new(&self.ffprobe)
                    .args([
                        "-v",
                        "error",
                        "-show_entries",
                        "format=duration",
                        "-of",
                        "default=noprint_wrappers=1:nokey=1",
                    ])
                    .arg(source),
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout.trim();
        text.parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| MediaError::InvalidOutput {
                tool: self.ffprobe.clone(),
                output: text.to_string(),
            })
    }
}
