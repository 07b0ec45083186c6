//! Gemini `generateContent` client.
//!
//! Classifies each call into a success body or a [`CandidateError`]; it never
//! retries and never looks at other models.

use super::{CandidateError, ContentGenerator, GenerateContentRequest};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Upstream error text longer than this is cut before it is logged or
/// returned to the caller.
const MAX_ERROR_TEXT_LEN: usize = 512;

/// Gemini HTTP client shared by all requests.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, reqwest::Error> {
        let timeout = config.request_timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            timeout,
        })
    }

    /// Build the API URL for the given model. The credential travels as the
    /// `key` query parameter, so this string must never be logged.
    fn api_url(&self, model: &str, credential: &Secret<String>) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base,
            model,
            credential.expose_secret()
        )
    }

    fn classify_transport(&self, err: reqwest::Error) -> CandidateError {
        if err.is_timeout() {
            CandidateError::Timeout(self.timeout)
        } else {
            // The URL embeds the credential.
            CandidateError::Transport(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        credential: &Secret<String>,
        request: &GenerateContentRequest<'_>,
    ) -> Result<Value, CandidateError> {
        tracing::debug!(
            model = %model,
            turns = request.contents.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.api_url(model, credential))
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CandidateError::Rejected {
                status: status.as_u16(),
                message: upstream_error_message(&error_text),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify_transport(e))?;

        serde_json::from_slice(&body)
            .map_err(|e| CandidateError::InvalidBody(format!("Failed to parse response: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Prefer Gemini's structured `error.message`; fall back to the raw body.
fn upstream_error_message(body: &str) -> String {
    let message = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) => format!("{} ({})", envelope.error.message, status),
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    };

    truncate(&message, MAX_ERROR_TEXT_LEN)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
