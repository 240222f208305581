//! Producer side of the job queue: registering uploads and re-enqueueing work.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::db::{job_repo, status_repo, video_repo, Database};
use crate::error::IngestError;
use crate::media::{is_video_file, MediaToolchain};
use crate::models::{RunStatus, VideoId};
use crate::queue::JobQueue;
use crate::sanitize::{redact_path, truncate_for_log, MAX_LOG_TEXT};

/// An uploaded file that has already been written to storage.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: i64,
    pub original_filename: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

pub struct Ingestor {
    db: Database,
    queue: JobQueue,
    media: Arc<dyn MediaToolchain>,
    max_file_size: u64,
    upload_directory: Option<PathBuf>,
}

impl Ingestor {
    pub fn new(
        db: Database,
        queue: JobQueue,
        media: Arc<dyn MediaToolchain>,
        max_file_size: u64,
    ) -> Self {
        Self {
            db,
            queue,
            media,
            max_file_size,
            upload_directory: None,
        }
    }

    /// Stores imported files under `dir/<user_id>/<YYYY-MM-DD>/` instead of
    /// registering them in place.
    pub fn with_upload_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_directory = Some(dir.into());
        self
    }

    /// Registers a file from the local filesystem on behalf of `user_id`.
    ///
    /// With an upload directory configured the file is copied there under a
    /// unique name first; the copy is removed again if registration fails.
    pub async fn import_file(&self, user_id: i64, source: &Path) -> Result<VideoId, IngestError> {
        let original_filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_video_file(&original_filename) {
            return Err(IngestError::UnsupportedFormat(original_filename));
        }

        let metadata = tokio::fs::metadata(source).await.map_err(|e| IngestError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        if metadata.len() > self.max_file_size {
            return Err(IngestError::FileTooLarge {
                filename: original_filename,
                size: metadata.len(),
                limit: self.max_file_size,
            });
        }

        let Some(upload_dir) = &self.upload_directory else {
            let stored_path = std::path::absolute(source).map_err(|e| IngestError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
            return self
                .register(NewUpload {
                    user_id,
                    original_filename,
                    stored_path,
                    file_size: metadata.len(),
                })
                .await;
        };

        let stored_path = stage_path(upload_dir, user_id, &original_filename);
        copy_into(source, &stored_path).await?;

        let result = self
            .register(NewUpload {
                user_id,
                original_filename,
                stored_path: stored_path.clone(),
                file_size: metadata.len(),
            })
            .await;

        if let Err(IngestError::Database(_)) = &result {
            if let Err(e) = tokio::fs::remove_file(&stored_path).await {
                warn!(file = %redact_path(&stored_path), error = %e, "Failed to remove stored copy");
            }
        }
        result
    }

    /// Validates an upload, records its video and pending job, and queues it.
    ///
    /// Waits while the queue is full. If the queue has been closed the rows
    /// stay `pending` and are picked up by [`Ingestor::recover`] next start.
    pub async fn register(&self, upload: NewUpload) -> Result<VideoId, IngestError> {
        if !is_video_file(&upload.original_filename) {
            return Err(IngestError::UnsupportedFormat(upload.original_filename));
        }
        if upload.file_size > self.max_file_size {
            return Err(IngestError::FileTooLarge {
                filename: upload.original_filename,
                size: upload.file_size,
                limit: self.max_file_size,
            });
        }

        let duration = match self.media.probe_duration(&upload.stored_path).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!(
                    file = %redact_path(&upload.stored_path),
                    error = %truncate_for_log(&e.to_string(), MAX_LOG_TEXT),
                    "Duration probe failed, recording 0"
                );
                0.0
            }
        };

        let (video_id, job_id) = video_repo::create_upload(
            &self.db,
            &video_repo::NewVideo {
                user_id: upload.user_id,
                original_filename: upload.original_filename,
                file_path: upload.stored_path.to_string_lossy().into_owned(),
                file_size: i64::try_from(upload.file_size).unwrap_or(i64::MAX),
                duration,
            },
        )?;

        info!(
            video_id,
            job_id,
            file = %redact_path(&upload.stored_path),
            duration,
            "Upload registered"
        );

        self.enqueue(video_id).await?;
        Ok(video_id)
    }

    /// Pushes an existing video ID onto the queue.
    pub async fn enqueue(&self, video_id: VideoId) -> Result<(), IngestError> {
        self.queue
            .push(video_id)
            .await
            .map_err(|_| IngestError::QueueClosed)
    }

    /// Re-enqueues every job a previous process left `pending` or
    /// `processing`. Interrupted runs are reset to `pending` first.
    ///
    /// Returns the number of queued IDs.
    pub async fn recover(&self) -> Result<usize, IngestError> {
        let recoverable = job_repo::list_recoverable(&self.db)?;
        if recoverable.is_empty() {
            return Ok(0);
        }

        info!(count = recoverable.len(), "Recovering unfinished jobs");

        for (video_id, status) in &recoverable {
            if *status == RunStatus::Processing {
                status_repo::transition(&self.db, *video_id, RunStatus::Pending, None)?;
            }
            self.enqueue(*video_id).await?;
        }

        Ok(recoverable.len())
    }
}

/// `<dir>/<user_id>/<YYYY-MM-DD>/<unix_nanos>_<filename>`
fn stage_path(upload_dir: &Path, user_id: i64, filename: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    upload_dir
        .join(user_id.to_string())
        .join(chrono::Utc::now().format("%Y-%m-%d").to_string())
        .join(format!("{}_{}", nanos, filename))
}

async fn copy_into(source: &Path, target: &Path) -> Result<(), IngestError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| IngestError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    tokio::fs::copy(source, target)
        .await
        .map_err(|e| IngestError::Io {
            path: target.to_path_buf(),
            source: e,
        })?;
    Ok(())
}
