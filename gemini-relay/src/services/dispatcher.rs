//! Ordered multi-candidate fallback.
//!
//! Candidates are tried strictly one after another in configured order. The
//! first usable response wins and later candidates are never contacted.
//! Per-candidate failures are collected, not propagated; only a missing
//! credential or total exhaustion reaches the caller.

use crate::models::CandidateList;
use crate::services::metrics;
use crate::services::providers::{
    CandidateError, ContentGenerator, GenerateContentRequest, GenerationParams,
};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use service_core::error::AppError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Fallback message used when no individual failure was recorded.
pub const ALL_CANDIDATES_FAILED: &str = "all candidates failed";

/// What counts as a usable success-status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessPolicy {
    /// The body must carry a non-empty `candidates` array.
    #[default]
    Strict,
    /// Any parsed success-status body is accepted.
    Lenient,
}

impl SuccessPolicy {
    pub fn accept(self, body: Value) -> Result<Value, CandidateError> {
        match self {
            SuccessPolicy::Lenient => Ok(body),
            SuccessPolicy::Strict => {
                let has_candidates = body
                    .get("candidates")
                    .and_then(Value::as_array)
                    .is_some_and(|candidates| !candidates.is_empty());
                if has_candidates {
                    Ok(body)
                } else {
                    Err(CandidateError::MissingContent)
                }
            }
        }
    }
}

impl FromStr for SuccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SuccessPolicy::Strict),
            "lenient" => Ok(SuccessPolicy::Lenient),
            other => Err(format!(
                "unknown policy '{}', expected 'strict' or 'lenient'",
                other
            )),
        }
    }
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub model: String,
    pub error: CandidateError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.error)
    }
}

/// Outcome of a dispatch that found a usable response.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSuccess {
    /// Model that produced `body`.
    pub model: String,
    /// Number of outbound calls made, including the successful one.
    pub attempts: usize,
    pub body: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("All models failed")]
    Exhausted { failures: Vec<AttemptFailure> },
}

impl DispatchError {
    /// The last observed failure reason, or a generic message.
    pub fn details(&self) -> String {
        match self {
            DispatchError::NotConfigured => self.to_string(),
            DispatchError::Exhausted { failures } => failures
                .last()
                .map(ToString::to_string)
                .unwrap_or_else(|| ALL_CANDIDATES_FAILED.to_string()),
        }
    }

    /// Number of outbound calls that were made before giving up.
    pub fn attempts(&self) -> usize {
        match self {
            DispatchError::NotConfigured => 0,
            DispatchError::Exhausted { failures } => failures.len(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotConfigured => {
                AppError::ConfigError(anyhow::anyhow!("API key not configured"))
            }
            DispatchError::Exhausted { .. } => {
                AppError::UpstreamFailure(err.to_string(), Some(err.details()))
            }
        }
    }
}

/// Tries each configured candidate in order until one succeeds.
///
/// Holds only immutable configuration, so one instance serves concurrent
/// requests without locking.
pub struct FallbackDispatcher {
    generator: Arc<dyn ContentGenerator>,
    candidates: CandidateList,
    generation: GenerationParams,
    policy: SuccessPolicy,
    attempt_timeout: Duration,
}

impl FallbackDispatcher {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        candidates: CandidateList,
        generation: GenerationParams,
        policy: SuccessPolicy,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            candidates,
            generation,
            policy,
            attempt_timeout,
        }
    }

    pub fn candidates(&self) -> &CandidateList {
        &self.candidates
    }

    pub fn policy(&self) -> SuccessPolicy {
        self.policy
    }

    /// Run one dispatch for `contents`.
    ///
    /// A missing or blank credential fails before any outbound call.
    pub async fn dispatch(
        &self,
        contents: &[Value],
        credential: Option<&Secret<String>>,
    ) -> Result<DispatchSuccess, DispatchError> {
        let credential = credential
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(DispatchError::NotConfigured)?;

        let request = GenerateContentRequest::new(contents, &self.generation);
        let mut failures = Vec::new();

        for (index, model) in self.candidates.iter().enumerate() {
            let attempt = index + 1;

            match self.attempt(model, credential, &request).await {
                Ok(body) => {
                    info!(
                        model = %model,
                        attempt,
                        "Candidate model answered"
                    );
                    metrics::record_attempt(model, "success");
                    return Ok(DispatchSuccess {
                        model: model.clone(),
                        attempts: attempt,
                        body,
                    });
                }
                Err(error) => {
                    warn!(
                        model = %model,
                        attempt,
                        kind = error.kind(),
                        reason = %error,
                        "Candidate model failed, trying next"
                    );
                    metrics::record_attempt(model, error.kind());
                    failures.push(AttemptFailure {
                        model: model.clone(),
                        error,
                    });
                }
            }
        }

        warn!(
            attempts = failures.len(),
            candidates = %self.candidates,
            "All candidate models failed"
        );
        Err(DispatchError::Exhausted { failures })
    }

    async fn attempt(
        &self,
        model: &str,
        credential: &Secret<String>,
        request: &GenerateContentRequest<'_>,
    ) -> Result<Value, CandidateError> {
        let call = self.generator.generate_content(model, credential, request);
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(result) => self.policy.accept(result?),
            Err(_) => Err(CandidateError::Timeout(self.attempt_timeout)),
        }
    }
}
