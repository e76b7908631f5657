use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use super::types::{CompletionClient, CompletionPayload};
use super::AnalysisError;
use crate::config::Config;

/// Gemini `generateContent` client.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::ServiceCallFailed(format!("HTTP client setup: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            client,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        Self::new(
            &config.completion_base_url,
            &config.completion_model,
            config.completion_api_key.clone(),
            config.completion_timeout,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Request body for `generateContent`
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Pull the generated text out of a `generateContent` envelope.
///
/// Never fails: an envelope without `candidates[0].content.parts[0].text`
/// comes back whole as [`CompletionPayload::Fallback`].
pub fn payload_from_envelope(envelope: &Value) -> CompletionPayload {
    match envelope
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
    {
        Some(text) => CompletionPayload::Text(text.to_string()),
        None => CompletionPayload::Fallback(envelope.to_string()),
    }
}

impl CompletionClient for GeminiClient {
    fn complete(&self, prompt: &str) -> Result<CompletionPayload, AnalysisError> {
        let api_key = self.api_key.as_deref().ok_or(AnalysisError::MissingApiKey)?;

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Calling completion service");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .map_err(|e| {
                // reqwest errors embed the URL, which carries the key.
                let e = e.without_url();
                if e.is_timeout() {
                    AnalysisError::ServiceCallFailed(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else if e.is_connect() {
                    AnalysisError::ServiceCallFailed(format!(
                        "Could not connect to {}: {e}",
                        self.base_url
                    ))
                } else {
                    AnalysisError::ServiceCallFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| AnalysisError::ServiceCallFailed(e.without_url().to_string()))?;

        interpret_response(status, text)
    }
}

/// Map an HTTP answer to a payload. Non-2xx is a call failure carrying a
/// body preview; a 2xx body that is not JSON becomes a fallback payload.
pub fn interpret_response(
    status: StatusCode,
    body: String,
) -> Result<CompletionPayload, AnalysisError> {
    if !status.is_success() {
        return Err(AnalysisError::ServiceCallFailed(format!(
            "status {}: {}",
            status.as_u16(),
            body.chars().take(500).collect::<String>()
        )));
    }

    Ok(match serde_json::from_str::<Value>(&body) {
        Ok(envelope) => payload_from_envelope(&envelope),
        Err(_) => CompletionPayload::Fallback(body),
    })
}

/// Mock completion client for testing, returning a configurable response.
pub struct MockCompletionClient {
    outcome: Result<CompletionPayload, String>,
    calls: AtomicUsize,
}

impl MockCompletionClient {
    pub fn new(text: &str) -> Self {
        Self {
            outcome: Ok(CompletionPayload::Text(text.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_payload(payload: CompletionPayload) -> Self {
        Self {
            outcome: Ok(payload),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `ServiceCallFailed(message)`.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(&self, _prompt: &str) -> Result<CompletionPayload, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map_err(AnalysisError::ServiceCallFailed)
    }
}
