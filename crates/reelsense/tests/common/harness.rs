//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` owns a temp directory holding the upload tree and a
//! file-backed database, plus scriptable fakes for every external service.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use reelsense::analysis::Analyzer;
use reelsense::config::MissingAudioPolicy;
use reelsense::db::job_repo::{self, JobRow};
use reelsense::db::report_repo::{self, ReportRow};
use reelsense::db::video_repo::{self, NewVideo, VideoRow};
use reelsense::db::Database;
use reelsense::ingest::Ingestor;
use reelsense::media::MediaToolchain;
use reelsense::models::{RunStatus, VideoId};
use reelsense::pipeline::{Pipeline, PipelineSettings};
use reelsense::queue::JobQueue;
use reelsense::transcription::Transcriber;
use reelsense::worker::{PoolConfig, RetryPolicy, WorkerPool};

use super::fakes::{ScriptedAnalyzer, ScriptedMedia, ScriptedTranscriber};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Files "uploaded" by a test before import.
    pub incoming_dir: PathBuf,
    /// Where imported videos and their artifacts are stored.
    pub upload_dir: PathBuf,
    pub db: Database,
    pub media: Arc<ScriptedMedia>,
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub missing_audio: MissingAudioPolicy,
}

impl TestHarness {
    /// Harness with working fakes: the cover reads "SALE 50% OFF" and the
    /// transcript is a short promotional sentence.
    pub fn new() -> Self {
        Self::with_media(ScriptedMedia::new())
    }

    pub fn with_media(media: ScriptedMedia) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let incoming_dir = temp_dir.path().join("incoming");
        let upload_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&incoming_dir).expect("Failed to create incoming dir");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let db = Database::open(&temp_dir.path().join("data").join("reelsense.db"))
            .expect("Failed to open database");

        Self {
            temp_dir,
            incoming_dir,
            upload_dir,
            db,
            media: Arc::new(media),
            analyzer: Arc::new(ScriptedAnalyzer::new("SALE 50% OFF")),
            transcriber: Some(Arc::new(ScriptedTranscriber::speaking(
                "Everything in store is fifty percent off this weekend",
            ))),
            missing_audio: MissingAudioPolicy::Clear,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn with_transcriber(mut self, transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_analyzer(mut self, analyzer: ScriptedAnalyzer) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    /// Writes a fake video into the incoming directory.
    pub fn write_video(&self, filename: &str) -> PathBuf {
        let path = self.incoming_dir.join(filename);
        std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").expect("Failed to write video");
        path
    }

    /// Creates Video + Job rows for a file stored directly in the upload tree,
    /// without queueing it.
    pub fn seed_video(&self, filename: &str) -> VideoId {
        let dir = self.upload_dir.join("1");
        std::fs::create_dir_all(&dir).expect("Failed to create user dir");
        let path = dir.join(filename);
        std::fs::write(&path, b"video").expect("Failed to write video");

        video_repo::create_upload(
            &self.db,
            &NewVideo {
                user_id: 1,
                original_filename: filename.to_string(),
                file_path: path.to_string_lossy().into_owned(),
                file_size: 5,
                duration: 10.0,
            },
        )
        .expect("Failed to seed video")
        .0
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            self.db.clone(),
            self.media.clone() as Arc<dyn MediaToolchain>,
            self.transcriber.clone(),
            self.analyzer.clone() as Arc<dyn Analyzer>,
            PipelineSettings {
                cover_timestamp_secs: 1.0,
                missing_audio: self.missing_audio,
            },
        ))
    }

    pub fn ingestor(&self, queue: &JobQueue) -> Ingestor {
        Ingestor::new(
            self.db.clone(),
            queue.clone(),
            self.media.clone() as Arc<dyn MediaToolchain>,
            10 * 1024 * 1024,
        )
        .with_upload_directory(&self.upload_dir)
    }

    pub fn start_pool(&self, queue: &JobQueue, worker_count: usize) -> WorkerPool {
        self.start_pool_with_retry(queue, worker_count, RetryPolicy::none())
    }

    pub fn start_pool_with_retry(
        &self,
        queue: &JobQueue,
        worker_count: usize,
        retry: RetryPolicy,
    ) -> WorkerPool {
        WorkerPool::start(
            queue.clone(),
            self.pipeline(),
            PoolConfig {
                worker_count,
                retry,
            },
        )
    }

    pub fn video(&self, id: VideoId) -> VideoRow {
        video_repo::find_by_id(&self.db, id)
            .expect("Failed to query video")
            .expect("Video missing")
    }

    pub fn job(&self, id: VideoId) -> JobRow {
        job_repo::find_by_video_id(&self.db, id)
            .expect("Failed to query job")
            .expect("Job missing")
    }

    pub fn report(&self, id: VideoId) -> Option<ReportRow> {
        report_repo::find_by_video_id(&self.db, id).expect("Failed to query report")
    }

    /// Polls until the video reaches `status` or the timeout expires.
    pub async fn wait_for_status(&self, id: VideoId, status: RunStatus) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            if self.video(id).status == status {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }
}
