use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::analysis::Analyzer;
use crate::config::MissingAudioPolicy;
use crate::db::report_repo::NewReport;
use crate::db::{status_repo, video_repo, Database};
use crate::media::{audio_path_for, cover_path_for, MediaToolchain};
use crate::models::{RunStatus, VideoId};
use crate::sanitize::{self, truncate_for_log, MAX_LOG_TEXT};
use crate::transcription::Transcriber;

use super::context::PipelineContext;
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressReporter, Stage, StageEvent, StageStatus};
use super::settings::PipelineSettings;

/// Smallest `processing_time` ever recorded for a completed run.
const MIN_PROCESSING_TIME: f64 = 1e-6;

/// Summary of a run that reached `completed`.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub video_id: VideoId,
    pub report_id: i64,
    pub processing_time: f64,
    pub warnings: Vec<PipelineWarning>,
}

/// Final result of a run after its status has been recorded.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(CompletedRun),
    /// Video and job were marked failed with this error.
    Failed(PipelineError),
    /// Video and job were put back to pending.
    Cancelled,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

pub struct Pipeline {
    db: Database,
    media: Arc<dyn MediaToolchain>,
    transcriber: Option<Arc<dyn Transcriber>>,
    analyzer: Arc<dyn Analyzer>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        db: Database,
        media: Arc<dyn MediaToolchain>,
        transcriber: Option<Arc<dyn Transcriber>>,
        analyzer: Arc<dyn Analyzer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            media,
            transcriber,
            analyzer,
            settings,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs every stage once and records the terminal status.
    pub async fn run(
        &self,
        video_id: VideoId,
        worker_id: usize,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> RunOutcome {
        let result = self.attempt(video_id, worker_id, cancel, progress).await;
        self.finish(video_id, result)
    }

    /// Runs stages 0 through 12 without recording a failure.
    ///
    /// Callers that retry use this directly and call [`Pipeline::finish`]
    /// once they stop.
    pub async fn attempt(
        &self,
        video_id: VideoId,
        worker_id: usize,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<CompletedRun, PipelineError> {
        let span = info_span!("pipeline", video_id, worker_id);
        self.run_stages(video_id, cancel, progress)
            .instrument(span)
            .await
    }

    /// Records the terminal (or reset) status for an attempt's result.
    pub fn finish(
        &self,
        video_id: VideoId,
        result: Result<CompletedRun, PipelineError>,
    ) -> RunOutcome {
        match result {
            Ok(completed) => RunOutcome::Completed(completed),
            Err(PipelineError::Cancelled) => {
                // Only a run that got as far as `processing` is put back.
                match status_repo::transition_from(
                    &self.db,
                    video_id,
                    RunStatus::Processing,
                    RunStatus::Pending,
                    None,
                ) {
                    Ok(true) => info!(video_id, "Run cancelled, reset to pending"),
                    Ok(false) => info!(video_id, "Run cancelled before it started"),
                    Err(e) => error!(video_id, error = %e, "Failed to reset cancelled run"),
                }
                RunOutcome::Cancelled
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    video_id,
                    error = %truncate_for_log(&message, MAX_LOG_TEXT),
                    "Pipeline failed"
                );
                if let Err(db_err) =
                    status_repo::transition(&self.db, video_id, RunStatus::Failed, Some(&message))
                {
                    error!(video_id, error = %db_err, "Failed to record pipeline failure");
                }
                RunOutcome::Failed(e)
            }
        }
    }

    async fn run_stages(
        &self,
        video_id: VideoId,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<CompletedRun, PipelineError> {
        let mut ctx = PipelineContext::new(video_id);
        let reporter = StageReporter { video_id, progress };

        // Stage 0: mark processing
        reporter
            .fatal(Stage::MarkProcessing, cancel, async {
                status_repo::transition(&self.db, video_id, RunStatus::Processing, None)
                    .map_err(PipelineError::from)
            })
            .await?;

        // Stage 1: load the video row
        let video = reporter
            .fatal(Stage::LoadVideo, cancel, async {
                video_repo::find_by_id(&self.db, video_id)?
                    .ok_or(PipelineError::VideoNotFound(video_id))
            })
            .await?;
        let source = PathBuf::from(&video.file_path);
        debug!(file = %sanitize::redact_path(&source), "Loaded video");
        ctx.video = Some(video);

        // Stage 2: cover frame
        let cover_path = cover_path_for(&source, video_id);
        reporter
            .fatal(Stage::ExtractCover, cancel, async {
                guarded(
                    cancel,
                    self.media
                        .extract_frame(&source, &cover_path, self.settings.cover_timestamp_secs),
                )
                .await?
                .map_err(PipelineError::CoverExtraction)
            })
            .await?;

        // Stage 3: persist cover path
        reporter
            .fatal(Stage::SaveCover, cancel, async {
                video_repo::set_cover_path(&self.db, video_id, &cover_path.to_string_lossy())
                    .map_err(PipelineError::from)
            })
            .await?;
        ctx.cover_path = Some(cover_path);

        // Stage 4: audio track (non-fatal)
        self.step_extract_audio(&mut ctx, &source, cancel, &reporter)
            .instrument(info_span!("stage", stage = Stage::ExtractAudio.as_str()))
            .await?;

        // Stage 5: persist audio path according to the missing-audio policy
        let intended_audio = audio_path_for(&source, video_id);
        let audio_value = match (&ctx.audio_path, self.settings.missing_audio) {
            (Some(path), _) => Some(Some(path.clone())),
            (None, MissingAudioPolicy::Clear) => Some(None),
            (None, MissingAudioPolicy::Skip) => None,
            (None, MissingAudioPolicy::RecordPath) => Some(Some(intended_audio)),
        };
        match audio_value {
            Some(value) => {
                reporter
                    .fatal(Stage::SaveAudio, cancel, async {
                        let text = value.as_deref().map(|p| p.to_string_lossy().into_owned());
                        video_repo::set_audio_path(&self.db, video_id, text.as_deref())
                            .map_err(PipelineError::from)
                    })
                    .await?
            }
            None => reporter.emit(Stage::SaveAudio, StageStatus::Skipped),
        }

        // Stage 6 and 6b: transcription (non-fatal), then persist it
        let transcribed = self
            .step_transcribe(&mut ctx, &source, cancel, &reporter)
            .instrument(info_span!("stage", stage = Stage::Transcribe.as_str()))
            .await?;
        if transcribed {
            let transcript = ctx.transcript.clone();
            reporter
                .fatal(Stage::SaveTranscript, cancel, async {
                    video_repo::set_transcript(&self.db, video_id, &transcript)
                        .map_err(PipelineError::from)
                })
                .await?;
        } else {
            reporter.emit(Stage::SaveTranscript, StageStatus::Skipped);
        }

        // Stage 7: read the cover text
        let cover_for_vision = ctx
            .cover_path
            .clone()
            .unwrap_or_else(|| cover_path_for(&source, video_id));
        ctx.cover_text = reporter
            .fatal(Stage::CoverText, cancel, async {
                guarded(cancel, self.analyzer.extract_text(&cover_for_vision))
                    .await?
                    .map_err(PipelineError::CoverText)
            })
            .await?;
        debug!(cover_text = %truncate_for_log(&ctx.cover_text, MAX_LOG_TEXT), "Cover text extracted");

        // Stage 8: combine
        ctx.combined_text = combine_text(&ctx.cover_text, &ctx.transcript);
        reporter.emit(Stage::CombineText, StageStatus::Succeeded);

        // Stage 9: sentiment analysis
        let combined = ctx.combined_text.clone();
        let report = reporter
            .fatal(Stage::Sentiment, cancel, async {
                guarded(cancel, self.analyzer.analyze_sentiment(&combined))
                    .await?
                    .map_err(PipelineError::Sentiment)
            })
            .await?;
        ctx.report = Some(report.clone());

        // Stage 10: elapsed time
        let processing_time = ctx.started.elapsed().as_secs_f64().max(MIN_PROCESSING_TIME);

        // Stage 11 and 12: persist the report and mark completed together
        let new_report = NewReport {
            video_id,
            cover_text: ctx.cover_text.clone(),
            transcript_text: ctx.transcript.clone(),
            sentiment_score: report.sentiment_score,
            sentiment_label: report.sentiment_label,
            key_topics: report.key_topics,
            risk_level: report.risk_level,
            detailed_analysis: report.detailed_analysis,
            recommendations: report.recommendations,
            processing_time,
        };
        let report_id = reporter
            .fatal(Stage::SaveReport, cancel, async {
                status_repo::complete_with_report(&self.db, &new_report)
                    .map_err(PipelineError::from)
            })
            .await?;
        // Already committed, so cancellation no longer applies.
        reporter.emit(Stage::MarkCompleted, StageStatus::Started);
        reporter.emit(Stage::MarkCompleted, StageStatus::Succeeded);

        info!(
            report_id,
            processing_time,
            label = %new_report.sentiment_label,
            risk = %new_report.risk_level,
            warnings = ctx.warnings.len(),
            "Pipeline completed"
        );

        Ok(CompletedRun {
            video_id,
            report_id,
            processing_time,
            warnings: ctx.warnings,
        })
    }

    async fn step_extract_audio(
        &self,
        ctx: &mut PipelineContext,
        source: &Path,
        cancel: &CancellationToken,
        reporter: &StageReporter<'_>,
    ) -> Result<(), PipelineError> {
        reporter.emit(Stage::ExtractAudio, StageStatus::Started);
        let audio_path = audio_path_for(source, ctx.video_id);

        match guarded(cancel, self.media.extract_audio(source, &audio_path)).await? {
            Ok(()) => {
                ctx.audio_path = Some(audio_path);
                reporter.emit(Stage::ExtractAudio, StageStatus::Succeeded);
            }
            Err(e) => {
                let error = e.to_string();
                warn!(
                    error = %truncate_for_log(&error, MAX_LOG_TEXT),
                    "Audio extraction failed, continuing without audio"
                );
                reporter.emit(Stage::ExtractAudio, StageStatus::Degraded(error.clone()));
                ctx.warnings
                    .push(PipelineWarning::AudioExtractionFailed { error });
            }
        }
        Ok(())
    }

    /// Returns whether a transcript was obtained.
    async fn step_transcribe(
        &self,
        ctx: &mut PipelineContext,
        source: &Path,
        cancel: &CancellationToken,
        reporter: &StageReporter<'_>,
    ) -> Result<bool, PipelineError> {
        let Some(transcriber) = &self.transcriber else {
            debug!("Transcription disabled, skipping");
            reporter.emit(Stage::Transcribe, StageStatus::Skipped);
            return Ok(false);
        };

        reporter.emit(Stage::Transcribe, StageStatus::Started);
        match guarded(cancel, transcriber.transcribe(source)).await? {
            Ok(transcript) => {
                debug!(
                    language = transcript.language.as_deref().unwrap_or("unknown"),
                    transcript = %truncate_for_log(&transcript.text, MAX_LOG_TEXT),
                    "Transcription finished"
                );
                ctx.transcript = transcript.text;
                reporter.emit(Stage::Transcribe, StageStatus::Succeeded);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Transcription failed, continuing without transcript");
                let error = e.to_string();
                reporter.emit(Stage::Transcribe, StageStatus::Degraded(error.clone()));
                ctx.warnings.push(PipelineWarning::TranscriptionFailed { error });
                Ok(false)
            }
        }
    }
}

/// Builds the sentiment input: the cover section always, the transcript
/// section only when there is a transcript.
pub fn combine_text(cover_text: &str, transcript: &str) -> String {
    let mut combined = format!("Cover text:\n{}", cover_text);
    if !transcript.is_empty() {
        combined.push_str("\n\nAudio transcript:\n");
        combined.push_str(transcript);
    }
    combined
}

/// Races `fut` against cancellation. The inner result is the call's own.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        output = fut => Ok(output),
    }
}

struct StageReporter<'a> {
    video_id: VideoId,
    progress: &'a dyn ProgressReporter,
}

impl StageReporter<'_> {
    fn emit(&self, stage: Stage, status: StageStatus) {
        self.progress.report(StageEvent {
            video_id: self.video_id,
            stage,
            status,
        });
    }

    /// Runs a stage whose failure aborts the run, inside its own span.
    async fn fatal<T, F>(
        &self,
        stage: Stage,
        cancel: &CancellationToken,
        fut: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, PipelineError>>,
    {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        self.emit(stage, StageStatus::Started);

        let result = fut
            .instrument(info_span!("stage", stage = stage.as_str()))
            .await;

        match &result {
            Ok(_) => self.emit(stage, StageStatus::Succeeded),
            Err(e) => self.emit(stage, StageStatus::Failed(e.to_string())),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, SentimentReport};
    use crate::db::{job_repo, report_repo, video_repo::NewVideo};
    use crate::error::MediaError;
    use crate::models::{RiskLevel, SentimentLabel};
    use crate::pipeline::progress::NoopProgress;
    use crate::transcription::{Transcript, TranscriptionError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMedia {
        fail_frame: bool,
        fail_audio: bool,
    }

    #[async_trait]
    impl MediaToolchain for FakeMedia {
        async fn extract_frame(&self, _: &Path, _: &Path, _: f64) -> Result<(), MediaError> {
            if self.fail_frame {
                return Err(MediaError::ProcessFailed {
                    tool: "ffmpeg".into(),
                    status: "exit status: 1".into(),
                    stderr: "moov atom not found".into(),
                });
            }
            Ok(())
        }

        async fn extract_audio(&self, _: &Path, _: &Path) -> Result<(), MediaError> {
            if self.fail_audio {
                return Err(MediaError::ProcessFailed {
                    tool: "ffmpeg".into(),
                    status: "exit status: 1".into(),
                    stderr: "no audio stream".into(),
                });
            }
            Ok(())
        }

        async fn probe_duration(&self, _: &Path) -> Result<f64, MediaError> {
            Ok(10.0)
        }
    }

    struct FakeTranscriber(Option<&'static str>);

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, _: &Path) -> Result<Transcript, TranscriptionError> {
            match self.0 {
                Some(text) => Ok(Transcript {
                    text: text.to_string(),
                    language: Some("en".into()),
                }),
                None => Err(TranscriptionError::Rejected("service down".into())),
            }
        }

        async fn health_check(&self) -> Result<(), TranscriptionError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAnalyzer {
        fail_vision: bool,
        seen_text: Mutex<Option<String>>,
    }

    #[async_trait]
    impl Analyzer for FakeAnalyzer {
        async fn extract_text(&self, _: &Path) -> Result<String, AnalysisError> {
            if self.fail_vision {
                return Err(AnalysisError::EmptyResponse);
            }
            Ok("SALE 50% OFF".to_string())
        }

        async fn analyze_sentiment(&self, text: &str) -> Result<SentimentReport, AnalysisError> {
            *self.seen_text.lock().unwrap() = Some(text.to_string());
            Ok(SentimentReport {
                sentiment_score: 0.8,
                sentiment_label: SentimentLabel::Positive,
                key_topics: vec!["sale".into()],
                risk_level: RiskLevel::Low,
                detailed_analysis: "Promotional.".into(),
                recommendations: vec![],
            })
        }
    }

    fn seed(db: &Database) -> VideoId {
        video_repo::create_upload(
            db,
            &NewVideo {
                user_id: 1,
                original_filename: "clip.mp4".into(),
                file_path: "/srv/uploads/1/clip.mp4".into(),
                file_size: 10,
                duration: 10.0,
            },
        )
        .unwrap()
        .0
    }

    fn pipeline(
        db: &Database,
        media: FakeMedia,
        transcriber: Option<FakeTranscriber>,
        analyzer: Arc<FakeAnalyzer>,
        missing_audio: MissingAudioPolicy,
    ) -> Pipeline {
        Pipeline::new(
            db.clone(),
            Arc::new(media),
            transcriber.map(|t| Arc::new(t) as Arc<dyn Transcriber>),
            analyzer,
            PipelineSettings {
                cover_timestamp_secs: 1.0,
                missing_audio,
            },
        )
    }

    #[test]
    fn test_combine_text() {
        assert_eq!(combine_text("SALE", ""), "Cover text:\nSALE");
        assert_eq!(
            combine_text("SALE", "buy now"),
            "Cover text:\nSALE\n\nAudio transcript:\nbuy now"
        );
    }

    #[tokio::test]
    async fn test_successful_run() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db);
        let analyzer = Arc::new(FakeAnalyzer::default());
        let p = pipeline(
            &db,
            FakeMedia::default(),
            Some(FakeTranscriber(Some("fifty percent off everything"))),
            analyzer.clone(),
            MissingAudioPolicy::Clear,
        );

        let outcome = p.run(id, 0, &CancellationToken::new(), &NoopProgress).await;
        let RunOutcome::Completed(done) = outcome else {
            panic!("expected completion");
        };
        assert!(done.processing_time > 0.0);
        assert!(done.warnings.is_empty());

        let video = video_repo::find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(video.status, RunStatus::Completed);
        assert_eq!(video.cover_path.as_deref(), Some("/srv/uploads/1/cover_1.jpg"));
        assert_eq!(video.audio_path.as_deref(), Some("/srv/uploads/1/audio_1.wav"));
        assert_eq!(video.transcript_text.as_deref(), Some("fifty percent off everything"));

        let report = report_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(report.cover_text, "SALE 50% OFF");
        assert_eq!(
            analyzer.seen_text.lock().unwrap().as_deref(),
            Some("Cover text:\nSALE 50% OFF\n\nAudio transcript:\nfifty percent off everything")
        );
    }

    #[tokio::test]
    async fn test_cover_failure_is_fatal() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db);
        let p = pipeline(
            &db,
            FakeMedia {
                fail_frame: true,
                ..Default::default()
            },
            None,
            Arc::new(FakeAnalyzer::default()),
            MissingAudioPolicy::Clear,
        );

        let outcome = p.run(id, 0, &CancellationToken::new(), &NoopProgress).await;
        assert!(matches!(
            outcome,
            RunOutcome::Failed(PipelineError::CoverExtraction(_))
        ));
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Failed);
        assert!(job.error_message.unwrap().contains("moov atom"));
        assert!(report_repo::find_by_video_id(&db, id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_audio_policies() {
        for (policy, expected) in [
            (MissingAudioPolicy::Clear, None),
            (MissingAudioPolicy::Skip, Some("/previous/audio.wav")),
            (MissingAudioPolicy::RecordPath, Some("/srv/uploads/1/audio_1.wav")),
        ] {
            let db = Database::open_in_memory().unwrap();
            let id = seed(&db);
            video_repo::set_audio_path(&db, id, Some("/previous/audio.wav")).unwrap();
            let p = pipeline(
                &db,
                FakeMedia {
                    fail_audio: true,
                    ..Default::default()
                },
                None,
                Arc::new(FakeAnalyzer::default()),
                policy,
            );

            let outcome = p.run(id, 0, &CancellationToken::new(), &NoopProgress).await;
            let RunOutcome::Completed(done) = outcome else {
                panic!("{policy:?}: expected completion");
            };
            assert!(matches!(
                done.warnings.as_slice(),
                [PipelineWarning::AudioExtractionFailed { .. }]
            ));

            let video = video_repo::find_by_id(&db, id).unwrap().unwrap();
            assert_eq!(video.audio_path.as_deref(), expected, "{policy:?}");
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_stays_pending() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db);
        let p = pipeline(
            &db,
            FakeMedia::default(),
            None,
            Arc::new(FakeAnalyzer::default()),
            MissingAudioPolicy::Clear,
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = p.run(id, 0, &cancel, &NoopProgress).await;
        assert!(matches!(outcome, RunOutcome::Cancelled));
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Pending);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_unknown_video_fails() {
        let db = Database::open_in_memory().unwrap();
        let p = pipeline(
            &db,
            FakeMedia::default(),
            None,
            Arc::new(FakeAnalyzer::default()),
            MissingAudioPolicy::Clear,
        );

        let outcome = p.run(404, 0, &CancellationToken::new(), &NoopProgress).await;
        assert!(matches!(
            outcome,
            RunOutcome::Failed(PipelineError::Database(crate::db::DatabaseError::NotFound { .. }))
        ));
    }

    /// Cancels the run's token as soon as `stage` reports success.
    struct CancelAfter {
        stage: Stage,
        token: CancellationToken,
    }

    impl ProgressReporter for CancelAfter {
        fn report(&self, event: StageEvent) {
            if event.stage == self.stage && event.status == StageStatus::Succeeded {
                self.token.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_after_report_saved_still_completes() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db);
        let p = pipeline(
            &db,
            FakeMedia::default(),
            None,
            Arc::new(FakeAnalyzer::default()),
            MissingAudioPolicy::Clear,
        );
        let cancel = CancellationToken::new();
        let progress = CancelAfter {
            stage: Stage::SaveReport,
            token: cancel.clone(),
        };

        let outcome = p.run(id, 0, &cancel, &progress).await;
        assert!(outcome.is_completed(), "{:?}", outcome);
        assert!(cancel.is_cancelled());
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Completed);
        assert!(report_repo::find_by_video_id(&db, id).unwrap().is_some());

        // A later run of the same id that is cancelled up front leaves it alone.
        let stopped = CancellationToken::new();
        stopped.cancel();
        let outcome = p.run(id, 0, &stopped, &NoopProgress).await;
        assert!(matches!(outcome, RunOutcome::Cancelled));
        let video = video_repo::find_by_id(&db, id).unwrap().unwrap();
        assert_eq!(video.status, RunStatus::Completed);
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_before_report_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        let id = seed(&db);
        let p = pipeline(
            &db,
            FakeMedia::default(),
            None,
            Arc::new(FakeAnalyzer::default()),
            MissingAudioPolicy::Clear,
        );
        let cancel = CancellationToken::new();
        let progress = CancelAfter {
            stage: Stage::Sentiment,
            token: cancel.clone(),
        };

        let outcome = p.run(id, 0, &cancel, &progress).await;
        assert!(matches!(outcome, RunOutcome::Cancelled));
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Pending);
        assert!(report_repo::find_by_video_id(&db, id).unwrap().is_none());

        // The recovered run completes with a single report.
        let outcome = p.run(id, 0, &CancellationToken::new(), &NoopProgress).await;
        assert!(outcome.is_completed(), "{:?}", outcome);
        let job = job_repo::find_by_video_id(&db, id).unwrap().unwrap();
        assert_eq!(job.status, RunStatus::Completed);
        assert!(job.error_message.is_none());
    }
}
