//! Router-level tests driven with `tower::ServiceExt::oneshot`.

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use common::{test_config, TEST_API_KEY};
use gemini_relay::services::providers::mock::{MockGenerator, MockOutcome};
use gemini_relay::startup::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

fn app_with(vars: &[(&str, &str)], mock: &Arc<MockGenerator>) -> Router {
    build_router(AppState::new(test_config(vars), mock.clone()))
}

fn keyed_app(mock: &Arc<MockGenerator>) -> Router {
    app_with(
        &[
            ("GEMINI_API_KEY", TEST_API_KEY),
            ("GEMINI_MODELS", "modelA,modelB"),
        ],
        mock,
    )
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_on_relay_route_is_method_not_allowed() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(
            Request::builder()
                .uri("/api/gemini")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Only POST requests allowed");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn cors_preflight_is_answered_with_permissive_headers() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/gemini")
                .header(header::ORIGIN, "https://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn bare_options_request_succeeds() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/gemini")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn successful_relay_returns_model_body() {
    let mock = Arc::new(
        MockGenerator::new()
            .with("modelA", MockOutcome::status(429))
            .with("modelB", MockOutcome::reply("hello from B")),
    );
    let response = keyed_app(&mock)
        .oneshot(post_json(
            "/api/gemini",
            r#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-gemini-model"], "modelB");
    let body = json_body(response).await;
    assert_eq!(
        body["candidates"][0]["content"]["parts"][0]["text"],
        "hello from B"
    );
    assert_eq!(mock.calls(), vec!["modelA", "modelB"]);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(post_json("/api/gemini", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid JSON body"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn missing_contents_field_is_bad_request() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(post_json("/api/gemini", r#"{"prompt":"hi"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn empty_contents_fail_validation() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(post_json("/api/gemini", r#"{"contents":[]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Validation error");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn missing_api_key_is_configuration_error() {
    let mock = Arc::new(MockGenerator::new().with("modelA", MockOutcome::reply("hi")));
    let app = app_with(&[("GEMINI_MODELS", "modelA")], &mock);

    let response = app
        .oneshot(post_json(
            "/api/gemini",
            r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Configuration error");
    assert_eq!(body["details"], "API key not configured");
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn custom_route_is_honoured() {
    let mock = Arc::new(MockGenerator::new().with("modelA", MockOutcome::reply("hi")));
    let app = app_with(
        &[
            ("GEMINI_API_KEY", TEST_API_KEY),
            ("GEMINI_MODELS", "modelA"),
            ("RELAY_ROUTE", "/v1/chat"),
        ],
        &mock,
    );

    let response = app
        .oneshot(post_json(
            "/v1/chat",
            r#"{"contents":[{"parts":[{"text":"hi"}]}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.calls(), vec!["modelA"]);
}

#[tokio::test]
async fn index_page_is_served_from_static_dir() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("/api/gemini"));
}

#[tokio::test]
async fn responses_carry_request_id() {
    let mock = Arc::new(MockGenerator::new());
    let response = keyed_app(&mock)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}
