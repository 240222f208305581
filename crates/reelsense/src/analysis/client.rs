//! OpenAI-compatible chat completions client.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::prompt::{sentiment_prompt, COVER_TEXT_INSTRUCTION};
use super::report::parse_report;
use super::{AnalysisError, Analyzer, SentimentReport};
use crate::config::AnalysisConfig;
use crate::sanitize::{redact_path, truncate_for_log, MAX_LOG_TEXT};

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    http: Client,
    api_base: String,
    api_key: SecretString,
    model_vision: String,
    model_chat: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &AnalysisConfig, api_key: SecretString) -> Result<Self, AnalysisError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model_vision: config.model_vision.clone(),
            model_chat: config.model_chat.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Sends one chat completion request and returns the first choice's content.
    async fn complete(&self, body: Value) -> Result<String, AnalysisError> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, MAX_LOG_TEXT),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedReport(format!("invalid completion body: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AnalysisError::EmptyResponse)
    }
}

#[async_trait]
impl Analyzer for OpenAiClient {
    async fn extract_text(&self, image_path: &Path) -> Result<String, AnalysisError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| AnalysisError::ReadImage {
                path: image_path.to_path_buf(),
                source: e,
            })?;
        let image_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes));

        debug!(image = %redact_path(image_path), model = %self.model_vision, "Extracting cover text");

        let body = json!({
            "model": self.model_vision,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": COVER_TEXT_INSTRUCTION },
                    { "type": "image_url", "image_url": { "url": image_url } }
                ]
            }],
            "max_tokens": self.max_tokens,
        });

        self.complete(body).await
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<SentimentReport, AnalysisError> {
        debug!(model = %self.model_chat, chars = text.chars().count(), "Requesting sentiment analysis");

        let body = json!({
            "model": self.model_chat,
            "messages": [{ "role": "user", "content": sentiment_prompt(text) }],
        });

        let content = self.complete(body).await?;
        parse_report(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RiskLevel, SentimentLabel};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        let config = AnalysisConfig {
            api_base: format!("{}/v1/", server.uri()),
            timeout_secs: 5,
            ..AnalysisConfig::default()
        };
        OpenAiClient::new(&config, SecretString::from("sk-test".to_string())).unwrap()
    }

    fn completion(content: &str) -> Value {
        json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
    }

    #[tokio::test]
    async fn test_extract_text_sends_image_as_data_url() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("cover_1.jpg");
        std::fs::write(&image, b"\xff\xd8jpeg").unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 1000 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("# SALE 50% OFF")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server).extract_text(&image).await.unwrap();
        assert_eq!(text, "# SALE 50% OFF");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let url = body["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap();
        assert_eq!(url, format!("data:image/jpeg;base64,{}", BASE64.encode(b"\xff\xd8jpeg")));
        assert_eq!(body["messages"][0]["content"][0]["text"], "convert to markdown");
    }

    #[tokio::test]
    async fn test_extract_text_missing_image() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .extract_text(Path::new("/nonexistent/cover.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ReadImage { .. }));
    }

    #[tokio::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .analyze_sentiment("Cover text:\nhello")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_analyze_sentiment_parses_fenced_report() {
        let server = MockServer::start().await;
        let content = "```json\n{\"sentiment_score\": 0.2, \"sentiment_label\": \"negative\", \
                       \"key_topics\": [\"recall\"], \"risk_level\": \"high\", \
                       \"detailed_analysis\": \"Complaints about a recall.\", \
                       \"recommendations\": [\"Respond publicly\"]}\n```";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
            .mount(&server)
            .await;

        let report = client_for(&server)
            .analyze_sentiment("Cover text:\nRECALL NOTICE")
            .await
            .unwrap();
        assert_eq!(report.sentiment_label, SentimentLabel::Negative);
        assert_eq!(report.risk_level, RiskLevel::High);

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("RECALL NOTICE"));
    }

    #[tokio::test]
    async fn test_malformed_report_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json")))
            .mount(&server)
            .await;

        let err = client_for(&server).analyze_sentiment("x").await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedReport(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client_for(&server).analyze_sentiment("x").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Status { status: 429, .. }));
        assert!(err.is_retryable());
    }
}
