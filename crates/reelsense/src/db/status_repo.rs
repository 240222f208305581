//! Paired status updates for a video and its job.
//!
//! Both rows always move together inside one transaction, so no reader
//! observes a video and its job in different states.

use rusqlite::{params, OptionalExtension};

use super::report_repo::{self, NewReport};
use super::{job_repo, now_rfc3339, video_repo, Database, DatabaseError};
use crate::models::{RunStatus, VideoId};

/// Moves the video and its job to `status`.
///
/// `error_message` is stored on the job; it is cleared when `None`.
/// Terminal statuses also stamp the job's `finished_at`.
pub fn transition(
    db: &Database,
    video_id: VideoId,
    status: RunStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_transaction(|tx| {
        video_repo::update_status_on(tx, video_id, status, &now)?;
        job_repo::update_status_on(tx, video_id, status, error_message, &now)?;
        Ok(())
    })?;

    log::debug!("Video {} -> {}", video_id, status);
    Ok(())
}

/// Moves the video and its job from `from` to `to`.
///
/// Returns `false` and changes nothing when the video is not in `from`.
pub fn transition_from(
    db: &Database,
    video_id: VideoId,
    from: RunStatus,
    to: RunStatus,
    error_message: Option<&str>,
) -> Result<bool, DatabaseError> {
    let now = now_rfc3339();
    let moved = db.with_transaction(|tx| {
        let current: Option<RunStatus> = tx
            .query_row(
                "SELECT status FROM videos WHERE id = ?1",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => Err(DatabaseError::NotFound {
                entity: "video",
                id: video_id,
            }),
            Some(status) if status != from => Ok(false),
            Some(_) => {
                video_repo::update_status_on(tx, video_id, to, &now)?;
                job_repo::update_status_on(tx, video_id, to, error_message, &now)?;
                Ok(true)
            }
        }
    })?;

    if moved {
        log::debug!("Video {} {} -> {}", video_id, from, to);
    }
    Ok(moved)
}

/// Stores the report and marks the video and its job `completed` in one
/// transaction. Returns the report id.
pub fn complete_with_report(db: &Database, report: &NewReport) -> Result<i64, DatabaseError> {
    let now = now_rfc3339();
    let report_id = db.with_transaction(|tx| {
        let report_id = report_repo::insert_on(tx, report)?;
        video_repo::update_status_on(tx, report.video_id, RunStatus::Completed, &now)?;
        job_repo::update_status_on(tx, report.video_id, RunStatus::Completed, None, &now)?;
        Ok(report_id)
    })?;

    log::debug!("Video {} -> {} with report {}", report.video_id, RunStatus::Completed, report_id);
    Ok(report_id)
}
