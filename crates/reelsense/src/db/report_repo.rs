//! Report repository: one sentiment report per video.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_rfc3339, Database, DatabaseError};
use crate::models::{RiskLevel, SentimentLabel, VideoId};

/// A stored report. List columns are JSON arrays of strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub id: i64,
    pub video_id: VideoId,
    pub cover_text: String,
    pub transcript_text: String,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub key_topics: Vec<String>,
    pub risk_level: RiskLevel,
    pub detailed_analysis: String,
    pub recommendations: Vec<String>,
    pub processing_time: f64,
    pub created_at: String,
}

fn json_list(row: &Row<'_>, column: &str) -> Result<Vec<String>, rusqlite::Error> {
    let idx = row.as_ref().column_index(column)?;
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            cover_text: row.get("cover_text")?,
            transcript_text: row.get("transcript_text")?,
            sentiment_score: row.get("sentiment_score")?,
            sentiment_label: row.get("sentiment_label")?,
            key_topics: json_list(row, "key_topics")?,
            risk_level: row.get("risk_level")?,
            detailed_analysis: row.get("detailed_analysis")?,
            recommendations: json_list(row, "recommendations")?,
            processing_time: row.get("processing_time")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields written by the pipeline's report stage.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub video_id: VideoId,
    pub cover_text: String,
    pub transcript_text: String,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub key_topics: Vec<String>,
    pub risk_level: RiskLevel,
    pub detailed_analysis: String,
    pub recommendations: Vec<String>,
    pub processing_time: f64,
}

/// Inserts a report. A second report for the same video fails with
/// [`DatabaseError::ConstraintViolation`].
pub fn insert(db: &Database, report: &NewReport) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| insert_on(conn, report))
}

/// Inserts a report on an existing connection or transaction.
pub(crate) fn insert_on(conn: &Connection, report: &NewReport) -> Result<i64, DatabaseError> {
    let key_topics = serde_json::to_string(&report.key_topics)?;
    let recommendations = serde_json::to_string(&report.recommendations)?;

    conn.execute(
        "INSERT INTO reports (video_id, cover_text, transcript_text, sentiment_score,
         sentiment_label, key_topics, risk_level, detailed_analysis, recommendations,
         processing_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            report.video_id,
            report.cover_text,
            report.transcript_text,
            report.sentiment_score,
            report.sentiment_label,
            key_topics,
            report.risk_level,
            report.detailed_analysis,
            recommendations,
            report.processing_time,
            now_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_video_id(db: &Database, video_id: VideoId) -> Result<Option<ReportRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM reports WHERE video_id = ?1",
                params![video_id],
                ReportRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
