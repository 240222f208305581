//! Scriptable stand-ins for the external collaborators.
//!
//! Each fake records what it was asked to do and can be told to fail.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use reelsense::analysis::{AnalysisError, Analyzer, SentimentReport};
use reelsense::error::MediaError;
use reelsense::media::MediaToolchain;
use reelsense::models::{RiskLevel, SentimentLabel};
use reelsense::transcription::{Transcriber, Transcript, TranscriptionError};

/// Media toolchain that writes placeholder artifacts.
pub struct ScriptedMedia {
    pub fail_frame: AtomicBool,
    pub fail_audio: AtomicBool,
    pub duration: f64,
    /// When set, every frame extraction waits for a permit first.
    gate: Option<Semaphore>,
    frames: Mutex<Vec<PathBuf>>,
}

impl ScriptedMedia {
    pub fn new() -> Self {
        Self {
            fail_frame: AtomicBool::new(false),
            fail_audio: AtomicBool::new(false),
            duration: 10.0,
            gate: None,
            frames: Mutex::new(Vec::new()),
        }
    }

    /// Frame extraction blocks until [`ScriptedMedia::release`] is called.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn release(&self, runs: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(runs);
        }
    }

    pub fn frames_extracted(&self) -> Vec<PathBuf> {
        self.frames.lock().unwrap().clone()
    }

    fn failure(stderr: &str) -> MediaError {
        MediaError::ProcessFailed {
            tool: "ffmpeg".into(),
            status: "exit status: 1".into(),
            stderr: stderr.into(),
        }
    }
}

#[async_trait]
impl MediaToolchain for ScriptedMedia {
    async fn extract_frame(
        &self,
        _source: &Path,
        output: &Path,
        _timestamp_secs: f64,
    ) -> Result<(), MediaError> {
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if self.fail_frame.load(Ordering::SeqCst) {
            return Err(Self::failure("Invalid data found when processing input"));
        }
        std::fs::write(output, b"\xff\xd8\xff\xe0cover").expect("write cover");
        self.frames.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }

    async fn extract_audio(&self, _source: &Path, output: &Path) -> Result<(), MediaError> {
        if self.fail_audio.load(Ordering::SeqCst) {
            return Err(Self::failure("Output file #0 does not contain any stream"));
        }
        std::fs::write(output, b"RIFFaudio").expect("write audio");
        Ok(())
    }

    async fn probe_duration(&self, _source: &Path) -> Result<f64, MediaError> {
        Ok(self.duration)
    }
}

/// Transcriber returning a fixed text, or failing every call.
pub struct ScriptedTranscriber {
    text: Option<String>,
    pub calls: AtomicU32,
}

impl ScriptedTranscriber {
    pub fn speaking(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            text: None,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _media_path: &Path) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(Transcript {
                text: text.clone(),
                language: Some("en".into()),
            }),
            None => Err(TranscriptionError::Status {
                status: 503,
                body: "model not loaded".into(),
            }),
        }
    }

    async fn health_check(&self) -> Result<(), TranscriptionError> {
        Ok(())
    }
}

/// Analyzer with a fixed cover text and report.
pub struct ScriptedAnalyzer {
    cover_text: String,
    report: SentimentReport,
    pub fail_vision: AtomicBool,
    pub malformed_report: AtomicBool,
    /// Vision calls left that answer 503 before succeeding.
    pub transient_failures: AtomicU32,
    sentiment_inputs: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn new(cover_text: &str) -> Self {
        Self {
            cover_text: cover_text.to_string(),
            report: positive_report(),
            fail_vision: AtomicBool::new(false),
            malformed_report: AtomicBool::new(false),
            transient_failures: AtomicU32::new(0),
            sentiment_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn sentiment_inputs(&self) -> Vec<String> {
        self.sentiment_inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn extract_text(&self, image_path: &Path) -> Result<String, AnalysisError> {
        if self.fail_vision.load(Ordering::SeqCst) {
            return Err(AnalysisError::Status {
                status: 400,
                body: "invalid image".into(),
            });
        }
        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(AnalysisError::Status {
                status: 503,
                body: "overloaded".into(),
            });
        }
        assert!(image_path.exists(), "cover must exist before vision call");
        Ok(self.cover_text.clone())
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<SentimentReport, AnalysisError> {
        self.sentiment_inputs.lock().unwrap().push(text.to_string());
        if self.malformed_report.load(Ordering::SeqCst) {
            return Err(AnalysisError::MalformedReport(
                "unknown sentiment_label 'ecstatic'".into(),
            ));
        }
        Ok(self.report.clone())
    }
}

pub fn positive_report() -> SentimentReport {
    SentimentReport {
        sentiment_score: 0.8,
        sentiment_label: SentimentLabel::Positive,
        key_topics: vec!["discount".into(), "sale".into()],
        risk_level: RiskLevel::Low,
        detailed_analysis: "Promotional content with an upbeat tone.".into(),
        recommendations: vec!["No action needed".into()],
    }
}
