use std::path::PathBuf;
use std::time::Instant;

use crate::analysis::SentimentReport;
use crate::db::video_repo::VideoRow;
use crate::models::VideoId;

use super::error::PipelineWarning;

pub struct PipelineContext {
    pub video_id: VideoId,
    pub started: Instant,

    // Stage 1 result, guaranteed Some afterwards
    pub video: Option<VideoRow>,

    // Stage 2
    pub cover_path: Option<PathBuf>,

    // Stage 4, None when extraction failed
    pub audio_path: Option<PathBuf>,

    // Stage 6, empty when transcription failed or is disabled
    pub transcript: String,

    // Stage 7
    pub cover_text: String,

    // Stage 8
    pub combined_text: String,

    // Stage 9
    pub report: Option<SentimentReport>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            started: Instant::now(),
            video: None,
            cover_path: None,
            audio_path: None,
            transcript: String::new(),
            cover_text: String::new(),
            combined_text: String::new(),
            report: None,
            warnings: Vec::new(),
        }
    }
}
