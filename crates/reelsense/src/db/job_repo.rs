//! Job repository: CRUD operations for the `jobs` table.
//!
//! Each video has exactly one job row (`video_id` is UNIQUE).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_rfc3339, Database, DatabaseError};
use crate::models::{RunStatus, VideoId};

/// A job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: i64,
    pub video_id: VideoId,
    pub status: RunStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub finished_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            status: row.get("status")?,
            retry_count: row.get("retry_count")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

pub(crate) fn insert_on(conn: &Connection, video_id: VideoId) -> Result<i64, DatabaseError> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO jobs (video_id, status, retry_count, created_at, updated_at)
         VALUES (?1, ?2, 0, ?3, ?3)",
        params![video_id, RunStatus::Pending, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a pending job for `video_id`. A second job for the same video
/// is rejected with [`DatabaseError::ConstraintViolation`].
pub fn insert(db: &Database, video_id: VideoId) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| insert_on(conn, video_id))
}

/// Finds the job belonging to a video.
pub fn find_by_video_id(db: &Database, video_id: VideoId) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE video_id = ?1",
                params![video_id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Bumps the retry counter and returns the new value.
pub fn increment_retry(db: &Database, video_id: VideoId) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn
            .query_row(
                "UPDATE jobs SET retry_count = retry_count + 1, updated_at = ?2
                 WHERE video_id = ?1 RETURNING retry_count",
                params![video_id, now_rfc3339()],
                |r| r.get(0),
            )
            .optional()?;
        count.ok_or(DatabaseError::NotFound {
            entity: "job",
            id: video_id,
        })
    })
}

/// Video IDs whose job never reached a terminal status, oldest first.
pub fn list_recoverable(db: &Database) -> Result<Vec<(VideoId, RunStatus)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT video_id, status FROM jobs
             WHERE status IN ('pending', 'processing') ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts jobs grouped by status.
pub fn count_by_status(db: &Database) -> Result<Vec<(RunStatus, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Writes status, error message and finish time for a job.
pub(crate) fn update_status_on(
    conn: &Connection,
    video_id: VideoId,
    status: RunStatus,
    error_message: Option<&str>,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    let finished_at = status.is_terminal().then_some(updated_at);
    let changed = conn.execute(
        "UPDATE jobs SET status = ?2, error_message = ?3, updated_at = ?4, finished_at = ?5
         WHERE video_id = ?1",
        params![video_id, status, error_message, updated_at, finished_at],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "job",
            id: video_id,
        });
    }
    Ok(())
}
