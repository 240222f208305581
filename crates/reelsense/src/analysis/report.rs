//! Parsing and validation of the model's sentiment report.

use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::models::{RiskLevel, SentimentLabel};
use crate::sanitize::{truncate_for_log, MAX_LOG_TEXT};

/// Structured result of sentiment analysis.
///
/// Every field is required; unknown label or risk values are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub key_topics: Vec<String>,
    pub risk_level: RiskLevel,
    pub detailed_analysis: String,
    pub recommendations: Vec<String>,
}

impl SentimentReport {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.sentiment_score.is_finite() || !(0.0..=1.0).contains(&self.sentiment_score) {
            return Err(AnalysisError::MalformedReport(format!(
                "sentiment_score {} is outside 0.0..=1.0",
                self.sentiment_score
            )));
        }
        Ok(())
    }
}

/// Parses a chat completion's content into a validated report.
///
/// Markdown code fences and any prose around the first JSON object are
/// ignored.
pub fn parse_report(content: &str) -> Result<SentimentReport, AnalysisError> {
    let cleaned = strip_code_fences(content);
    let json = extract_json(cleaned).ok_or_else(|| {
        AnalysisError::MalformedReport(format!(
            "no JSON object in response: {}",
            truncate_for_log(cleaned, MAX_LOG_TEXT)
        ))
    })?;

    let report: SentimentReport = serde_json::from_str(json).map_err(|e| {
        AnalysisError::MalformedReport(format!(
            "{}; response was: {}",
            e,
            truncate_for_log(json, MAX_LOG_TEXT)
        ))
    })?;

    report.validate()?;
    Ok(report)
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Returns the first balanced `{...}` object, honouring string literals
/// and escapes.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
