use std::fmt;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::VideoId;

/// Ordered stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MarkProcessing,
    LoadVideo,
    ExtractCover,
    SaveCover,
    ExtractAudio,
    SaveAudio,
    Transcribe,
    SaveTranscript,
    CoverText,
    CombineText,
    Sentiment,
    SaveReport,
    MarkCompleted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::MarkProcessing => "mark_processing",
            Stage::LoadVideo => "load_video",
            Stage::ExtractCover => "extract_cover",
            Stage::SaveCover => "save_cover",
            Stage::ExtractAudio => "extract_audio",
            Stage::SaveAudio => "save_audio",
            Stage::Transcribe => "transcribe",
            Stage::SaveTranscript => "save_transcript",
            Stage::CoverText => "cover_text",
            Stage::CombineText => "combine_text",
            Stage::Sentiment => "sentiment",
            Stage::SaveReport => "save_report",
            Stage::MarkCompleted => "mark_completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StageStatus {
    Started,
    Succeeded,
    /// The stage failed but the run continues without its output.
    Degraded(String),
    Skipped,
    Failed(String),
}

/// Events emitted by the pipeline during processing.
/// Texts (transcripts, model output) are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    pub video_id: VideoId,
    pub stage: Stage,
    #[serde(flatten)]
    pub status: StageStatus,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: StageEvent);
}

/// No-op reporter for unit tests and headless runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: StageEvent) {}
}

/// Forwards pipeline events to a broadcast channel. Having no subscribers
/// is not an error.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<StageEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: StageEvent) {
        let _ = self.sender.send(event);
    }
}
