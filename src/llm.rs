use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Generation service returned no text")]
    EmptyResponse,

    #[error("Generation service failure: {0}")]
    Service(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Service(err.to_string())
    }
}

/// A text generation backend: prompt in, completion out.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, base_url: &str) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn analyze(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.into(),
                }],
            }],
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "Calling Gemini");

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let json: serde_json::Value = res.json().await?;

        if !status.is_success() {
            let message = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(LlmError::Service(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        extract_text(&json)
    }
}

/// Concatenates the text parts of the first candidate.
pub fn extract_text(json: &serde_json::Value) -> Result<String, LlmError> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or(LlmError::EmptyResponse)?;

    let text: String = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_first_candidate_text() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "**ΣΥΝΟΛΙΚΗ " }, { "text": "ΑΞΙΟΛΟΓΗΣΗ: 7**" }] }
            }]
        });
        assert_eq!(extract_text(&body).unwrap(), "**ΣΥΝΟΛΙΚΗ ΑΞΙΟΛΟΓΗΣΗ: 7**");
    }

    #[test]
    fn blank_or_missing_text_is_an_empty_response() {
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(matches!(extract_text(&blocked), Err(LlmError::EmptyResponse)));

        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert!(matches!(extract_text(&blank), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new("key", "gemini-2.0-flash-lite", "https://example.test/").unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash-lite:generateContent"
        );
    }
}
