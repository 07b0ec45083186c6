//! Application startup and lifecycle management.
//!
//! Builds the router (relay route, health, metrics, static files) and owns
//! the listener so tests can bind to port 0 and discover the real port.

use crate::config::RelayConfig;
use crate::handlers::{
    health::{health_check, readiness_check},
    metrics::metrics,
    relay::{method_not_allowed, preflight, relay},
};
use crate::services::providers::ContentGenerator;
use crate::services::{FallbackDispatcher, GeminiClient};
use axum::{
    http::{HeaderName, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub dispatcher: Arc<FallbackDispatcher>,
}

impl AppState {
    /// Wire a dispatcher around `generator` using the configured candidates,
    /// generation parameters, policy and timeout.
    pub fn new(config: RelayConfig, generator: Arc<dyn ContentGenerator>) -> Self {
        let dispatcher = FallbackDispatcher::new(
            generator,
            config.gemini.models.clone(),
            config.gemini.generation.clone(),
            config.relay.success_policy,
            config.gemini.request_timeout(),
        );

        Self {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// Permissive cross-origin policy for browser clients.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::OPTIONS,
            Method::PATCH,
            Method::DELETE,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("accept-version"),
            HeaderName::from_static("content-length"),
            HeaderName::from_static("content-md5"),
            HeaderName::from_static("content-type"),
            HeaderName::from_static("date"),
            HeaderName::from_static("x-api-version"),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .max_age(Duration::from_secs(86400))
}

pub fn build_router(state: AppState) -> Router {
    let relay_route = state.config.relay.route.clone();
    let static_dir = state.config.relay.static_dir.clone();

    let mut router = Router::new()
        .route(
            &relay_route,
            post(relay).options(preflight).fallback(method_not_allowed),
        )
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    router
        .layer(cors_layer())
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the Gemini client as generator.
    pub async fn build(config: RelayConfig) -> Result<Self, AppError> {
        let client = GeminiClient::new(&config.gemini).map_err(|e| {
            tracing::error!("Failed to create HTTP client: {}", e);
            AppError::InternalError(anyhow::anyhow!("failed to create HTTP client: {}", e))
        })?;

        Self::build_with_generator(config, Arc::new(client)).await
    }

    /// Build the application around any generator.
    pub async fn build_with_generator(
        config: RelayConfig,
        generator: Arc<dyn ContentGenerator>,
    ) -> Result<Self, AppError> {
        let address = config.common.bind_address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        if !config.gemini.has_api_key() {
            tracing::warn!("GEMINI_API_KEY is not set; relay requests will fail until it is");
        }

        tracing::info!(
            port,
            route = %config.relay.route,
            models = %config.gemini.models,
            policy = ?config.relay.success_policy,
            timeout_secs = config.gemini.request_timeout_secs,
            "Gemini relay configured"
        );

        let state = AppState::new(config, generator);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Run until `shutdown` resolves, then finish in-flight requests.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}
