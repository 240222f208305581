//! Video repository: CRUD operations for the `videos` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{job_repo, now_rfc3339, Database, DatabaseError};
use crate::models::{RunStatus, VideoId};

/// A video row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub id: VideoId,
    pub user_id: i64,
    pub original_filename: String,
    pub file_path: String,
    pub cover_path: Option<String>,
    pub audio_path: Option<String>,
    pub file_size: i64,
    pub duration: f64,
    pub transcript_text: Option<String>,
    pub status: RunStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl VideoRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            original_filename: row.get("original_filename")?,
            file_path: row.get("file_path")?,
            cover_path: row.get("cover_path")?,
            audio_path: row.get("audio_path")?,
            file_size: row.get("file_size")?,
            duration: row.get("duration")?,
            transcript_text: row.get("transcript_text")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields supplied by the upload path when a file is registered.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub user_id: i64,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub duration: f64,
}

fn insert_on(conn: &Connection, video: &NewVideo) -> Result<VideoId, DatabaseError> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO videos (user_id, original_filename, file_path, file_size, duration,
         status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            video.user_id,
            video.original_filename,
            video.file_path,
            video.file_size,
            video.duration,
            RunStatus::Pending,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a video row without a job.
pub fn insert(db: &Database, video: &NewVideo) -> Result<VideoId, DatabaseError> {
    db.with_conn(|conn| insert_on(conn, video))
}

/// Inserts a video and its pending job in one transaction.
/// Returns `(video_id, job_id)`.
pub fn create_upload(db: &Database, video: &NewVideo) -> Result<(VideoId, i64), DatabaseError> {
    db.with_transaction(|tx| {
        let video_id = insert_on(tx, video)?;
        let job_id = job_repo::insert_on(tx, video_id)?;
        Ok((video_id, job_id))
    })
}

/// Finds a video by its ID.
pub fn find_by_id(db: &Database, id: VideoId) -> Result<Option<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM videos WHERE id = ?1",
                params![id],
                VideoRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists videos in the given status, oldest first.
pub fn list_by_status(db: &Database, status: RunStatus) -> Result<Vec<VideoRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM videos WHERE status = ?1 ORDER BY id ASC")?;
        let rows = stmt
            .query_map(params![status], VideoRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn set_cover_path(db: &Database, id: VideoId, path: &str) -> Result<(), DatabaseError> {
    update_column(db, id, "UPDATE videos SET cover_path = ?2, updated_at = ?3 WHERE id = ?1", Some(path))
}

/// Writes the audio artifact path; `None` stores NULL.
pub fn set_audio_path(db: &Database, id: VideoId, path: Option<&str>) -> Result<(), DatabaseError> {
    update_column(db, id, "UPDATE videos SET audio_path = ?2, updated_at = ?3 WHERE id = ?1", path)
}

pub fn set_transcript(db: &Database, id: VideoId, text: &str) -> Result<(), DatabaseError> {
    update_column(
        db,
        id,
        "UPDATE videos SET transcript_text = ?2, updated_at = ?3 WHERE id = ?1",
        Some(text),
    )
}

fn update_column(
    db: &Database,
    id: VideoId,
    sql: &str,
    value: Option<&str>,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(sql, params![id, value, now_rfc3339()])?;
        if changed == 0 {
            return Err(DatabaseError::NotFound { entity: "video", id });
        }
        Ok(())
    })
}

/// Updates only the status and updated_at of a video.
pub(crate) fn update_status_on(
    conn: &Connection,
    id: VideoId,
    status: RunStatus,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE videos SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, updated_at],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound { entity: "video", id });
    }
    Ok(())
}
