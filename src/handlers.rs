use crate::config::Config;
use crate::webhook_handler;
use crate::zoho_client::ZohoClient;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Maximum accepted webhook body.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Zoho CRM client; owns the token cache.
    pub zoho: ZohoClient,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Pipefile to Zoho webhook receiver is running",
            "timestamp": chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })),
    )
}

/// Builds the HTTP router: `POST /webhook` and `GET /health`.
pub fn router(state: Arc<AppState>) -> Router {
    let webhook_routes = Router::new()
        .route("/webhook", post(webhook_handler::pipefile_webhook))
        .layer(
            ServiceBuilder::new()
                // The tower-http limit replaces axum's 2MB extractor default
                .layer(DefaultBodyLimit::disable())
                // Request size limit: 5MB max payload
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        );

    Router::new()
        .route("/health", get(health))
        .merge(webhook_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
