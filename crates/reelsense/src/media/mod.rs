//! Media toolchain: cover frame and audio extraction, duration probing.

pub mod ffmpeg;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::MediaError;
use crate::models::VideoId;

pub use ffmpeg::FfmpegToolchain;

/// Extensions accepted as video uploads (compared case-insensitively).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm", "m4v"];

/// Operations the pipeline needs from an external media toolchain.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Writes a single JPEG frame taken at `timestamp_secs` to `output`.
    async fn extract_frame(
        &self,
        source: &Path,
        output: &Path,
        timestamp_secs: f64,
    ) -> Result<(), MediaError>;

    /// Writes the audio track as mono 16-bit PCM WAV to `output`.
    async fn extract_audio(&self, source: &Path, output: &Path) -> Result<(), MediaError>;

    /// Duration of the media in seconds.
    async fn probe_duration(&self, source: &Path) -> Result<f64, MediaError>;
}

pub fn is_video_file(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// `cover_<id>.jpg`, next to the source file.
pub fn cover_path_for(source: &Path, video_id: VideoId) -> PathBuf {
    artifact_dir(source).join(format!("cover_{}.jpg", video_id))
}

/// `audio_<id>.wav`, next to the source file.
pub fn audio_path_for(source: &Path, video_id: VideoId) -> PathBuf {
    artifact_dir(source).join(format!("audio_{}.wav", video_id))
}

fn artifact_dir(source: &Path) -> &Path {
    source.parent().unwrap_or_else(|| Path::new("."))
}
