//! The relay endpoint.

use crate::models::RelayRequest;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;
use validator::Validate;

/// Response header naming the model that produced the body.
pub const MODEL_HEADER: HeaderName = HeaderName::from_static("x-gemini-model");

/// Forward `contents` to the candidate models and return the first usable
/// response body unchanged.
pub async fn relay(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        AppError::BadRequest(anyhow::anyhow!(
            "Invalid JSON body: {}",
            rejection.body_text()
        ))
    })?;
    request.validate()?;

    let success = state
        .dispatcher
        .dispatch(&request.contents, state.config.gemini.api_key.as_ref())
        .await?;

    tracing::debug!(
        model = %success.model,
        attempts = success.attempts,
        "Relayed request"
    );

    let mut response = (StatusCode::OK, Json(success.body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&success.model) {
        response.headers_mut().insert(MODEL_HEADER, value);
    }
    Ok(response)
}

/// Plain `OPTIONS` without CORS request headers. Real preflights are
/// answered by the CORS layer before reaching this handler.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed("Only POST requests allowed".to_string())
}
