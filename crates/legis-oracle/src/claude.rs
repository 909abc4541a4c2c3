//! Anthropic messages-API client for segment discovery.
//!
//! Speaks the `/v1/messages` endpoint over reqwest. Responses are parsed
//! tolerantly: markdown-fenced JSON is unwrapped before deserialization,
//! and out-of-range confidence values are clamped with a warning rather
//! than rejected.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use legis_core::{DocumentStructure, Segment};

use crate::prompt;
use crate::{clamp_confidence, DiscoveryRequest, OracleError, SegmentOracle};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Characters of raw text sent to the structure-classification call.
const CLASSIFY_SAMPLE_CHARS: usize = 2000;

/// HTTP client for the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct ClaudeOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

/// Messages API request body.
#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

/// Messages API response body.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Discovery response format: `{"segments": [...]}`.
#[derive(Debug, Deserialize)]
struct SegmentsResponse {
    segments: Vec<SegmentResponse>,
}

#[derive(Debug, Deserialize)]
struct SegmentResponse {
    #[serde(rename = "type")]
    kind: String,
    number: String,
    title: Option<String>,
    start_line: u32,
    end_line: u32,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

impl ClaudeOracle {
    /// Create a client against an explicit endpoint and model.
    #[must_use]
    pub fn new(base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens: 8000,
        }
    }

    /// Build a client from the environment:
    /// `ANTHROPIC_API_KEY` (required), `ANTHROPIC_ENDPOINT` and
    /// `ANTHROPIC_DEPLOYMENT` (optional).
    pub fn from_env() -> Result<Self, OracleError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| OracleError::Unavailable("ANTHROPIC_API_KEY not set".to_string()))?;
        let base_url =
            std::env::var("ANTHROPIC_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model =
            std::env::var("ANTHROPIC_DEPLOYMENT").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(&base_url, api_key, model))
    }

    /// Override the per-call output token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send one prompt and return the raw completion text.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, OracleError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    OracleError::Unavailable(format!("cannot reach {}: {e}", self.base_url))
                } else {
                    OracleError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Overload and server-side failures are worth retrying;
            // everything else means the request itself is wrong.
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(OracleError::Unavailable(format!(
                    "API error ({status}): {body}"
                )));
            }
            return Err(OracleError::Malformed(format!(
                "API rejected request ({status}): {body}"
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("response parse failed: {e}")))?;

        let text = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| OracleError::Malformed("empty response content".to_string()))?;

        Ok(text)
    }
}

#[async_trait]
impl SegmentOracle for ClaudeOracle {
    async fn discover(&self, request: DiscoveryRequest) -> Result<Vec<Segment>, OracleError> {
        if request.numbered_text.trim().is_empty() {
            return Ok(vec![]);
        }

        let prompt = prompt::fixed_type_prompt(
            &request.expected_type,
            request.start_line,
            request.end_line,
            &request.numbered_text,
        );

        tracing::debug!(
            expected_type = %request.expected_type,
            start = request.start_line,
            end = request.end_line,
            "discovering segments"
        );

        let text = self.complete(&prompt, self.max_tokens).await?;
        parse_segments(&text)
    }

    async fn classify(&self, sample: &str) -> Result<DocumentStructure, OracleError> {
        let sample: String = sample.chars().take(CLASSIFY_SAMPLE_CHARS).collect();
        let prompt = prompt::analyze_structure_prompt(&sample);
        let text = self.complete(&prompt, 1000).await?;
        let json = extract_json(&text);
        serde_json::from_str(&json)
            .map_err(|e| OracleError::Malformed(format!("structure parse failed: {e}")))
    }
}

/// Parse a discovery completion into segments, clamping confidence.
fn parse_segments(text: &str) -> Result<Vec<Segment>, OracleError> {
    let json = extract_json(text);
    let parsed: SegmentsResponse = serde_json::from_str(&json)
        .map_err(|e| OracleError::Malformed(format!("segments parse failed: {e}")))?;

    Ok(parsed
        .segments
        .into_iter()
        .map(|s| {
            let context = format!("{} {}", s.kind, s.number);
            Segment {
                confidence: clamp_confidence(s.confidence, &context),
                kind: s.kind,
                number: s.number,
                title: s.title,
                start_line: s.start_line,
                end_line: s.end_line,
            }
        })
        .collect())
}

/// Extract JSON from a completion, handling markdown code fences.
fn extract_json(text: &str) -> String {
    let text = text.trim();

    if text.starts_with("```") {
        if let Some(start) = text.find('\n') {
            let after_first_line = &text[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            return text[start..=end].to_string();
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"segments": []}"#), r#"{"segments": []}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let fenced = "```json\n{\"segments\": []}\n```";
        assert_eq!(extract_json(fenced), r#"{"segments": []}"#);
    }

    #[test]
    fn test_extract_json_with_prose() {
        let text = "Here are the segments:\n{\"segments\": []}\nDone.";
        assert_eq!(extract_json(text), r#"{"segments": []}"#);
    }

    #[test]
    fn test_parse_segments_clamps_confidence() {
        let text = r#"{"segments": [
            {"type": "chapter", "number": "I", "title": null, "start_line": 1, "end_line": 50, "confidence": 1.4},
            {"type": "chapter", "number": "II", "title": "Heading", "start_line": 51, "end_line": 100, "confidence": 0.9}
        ]}"#;
        let segments = parse_segments(text).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].confidence, 1.0);
        assert_eq!(segments[1].confidence, 0.9);
        assert_eq!(segments[1].title.as_deref(), Some("Heading"));
    }

    #[test]
    fn test_parse_segments_defaults_missing_confidence() {
        let text = r#"{"segments": [
            {"type": "section", "number": "1", "title": null, "start_line": 1, "end_line": 5}
        ]}"#;
        let segments = parse_segments(text).unwrap();
        assert_eq!(segments[0].confidence, 0.5);
    }

    #[test]
    fn test_parse_segments_rejects_garbage() {
        let err = parse_segments("not json at all").unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let oracle = ClaudeOracle::new(
            "http://localhost:8080/",
            "key".to_string(),
            "model".to_string(),
        );
        assert_eq!(oracle.base_url, "http://localhost:8080");
    }
}
