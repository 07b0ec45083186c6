//! Mock generator for testing.

use super::{CandidateError, ContentGenerator, GenerateContentRequest};
use async_trait::async_trait;
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted behaviour for one model.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Success status with this body.
    Respond(Value),
    /// Fail the attempt with this error.
    Fail(CandidateError),
    /// Sleep before answering; used to trip the dispatcher's timeout.
    Hang(Duration),
}

impl MockOutcome {
    /// A body with one generated candidate.
    pub fn reply(text: &str) -> Self {
        MockOutcome::Respond(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        }))
    }

    /// A success-status body with an empty candidates collection.
    pub fn empty() -> Self {
        MockOutcome::Respond(json!({"candidates": []}))
    }

    pub fn status(status: u16) -> Self {
        MockOutcome::Fail(CandidateError::Rejected {
            status,
            message: format!("mock status {}", status),
        })
    }
}

/// Mock generator that answers per model and records every call in order.
/// Models without a script fail with a 404 rejection.
#[derive(Default)]
pub struct MockGenerator {
    outcomes: HashMap<String, MockOutcome>,
    calls: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: &str, outcome: MockOutcome) -> Self {
        self.outcomes.insert(model.to_string(), outcome);
        self
    }

    /// Models called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate_content(
        &self,
        model: &str,
        _credential: &Secret<String>,
        _request: &GenerateContentRequest<'_>,
    ) -> Result<Value, CandidateError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }

        match self.outcomes.get(model).cloned() {
            Some(MockOutcome::Respond(body)) => Ok(body),
            Some(MockOutcome::Fail(err)) => Err(err),
            Some(MockOutcome::Hang(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(json!({"candidates": [{"content": {"parts": [{"text": "late"}]}}]}))
            }
            None => Err(CandidateError::Rejected {
                status: 404,
                message: format!("models/{} is not found", model),
            }),
        }
    }
}
