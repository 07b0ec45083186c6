//! Content generation backends.
//!
//! A [`ContentGenerator`] performs exactly one outbound call for one
//! candidate model. Retrying and fallback across models belong to the
//! dispatcher, never to a generator.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use secrecy::Secret;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Why a single candidate attempt did not produce a usable response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CandidateError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response body: {0}")]
    InvalidBody(String),

    #[error("response contained no candidates")]
    MissingContent,
}

impl CandidateError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CandidateError::Transport(_) => "transport",
            CandidateError::Timeout(_) => "timeout",
            CandidateError::Rejected { .. } => "rejected",
            CandidateError::InvalidBody(_) => "invalid_body",
            CandidateError::MissingContent => "missing_content",
        }
    }

    /// Transport-level failures, as opposed to an answer the API gave.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CandidateError::Transport(_) | CandidateError::Timeout(_)
        )
    }
}

/// Generation parameters shared by every candidate of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: f64,

    /// Maximum output tokens.
    pub max_output_tokens: u32,

    /// Top-p sampling.
    pub top_p: Option<f64>,

    /// Stop sequences.
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 200,
            top_p: None,
            stop_sequences: Vec::new(),
        }
    }
}

/// Body of a `generateContent` call. Built once per dispatch and reused for
/// every candidate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    pub contents: &'a [Value],
    pub generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig<'a> {
    pub temperature: f64,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub stop_sequences: &'a [String],
}

impl<'a> GenerateContentRequest<'a> {
    pub fn new(contents: &'a [Value], params: &'a GenerationParams) -> Self {
        Self {
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
                top_p: params.top_p,
                stop_sequences: &params.stop_sequences,
            },
        }
    }
}

/// One outbound call to one candidate model.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns the parsed JSON body of a success-status response.
    async fn generate_content(
        &self,
        model: &str,
        credential: &Secret<String>,
        request: &GenerateContentRequest<'_>,
    ) -> Result<Value, CandidateError>;
}
