use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness probe.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "gemini-relay",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe. Without a credential every relay call would fail, so the
/// instance reports itself as not ready.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.config.gemini.has_api_key() {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "models": state.dispatcher.candidates().as_slice(),
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unavailable",
                "error": "API key not configured"
            })),
        )
    }
}
