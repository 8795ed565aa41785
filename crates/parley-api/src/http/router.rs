//! Axum router configuration with middleware.
//!
//! All resource routes are under `/api/v1/`. `/health` and `/` sit outside.
//! Middleware: CORS and request tracing.

use axum::extract::State;
use axum::http::HeaderValue;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use parley_core::session::store::SessionStore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Local frontend dev servers, always allowed alongside the configured origin.
const DEV_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://localhost:3001"];

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chat/message", post(handlers::chat::send_message))
        .route(
            "/sessions",
            post(handlers::session::create_session).get(handlers::session::list_sessions),
        )
        .route(
            "/sessions/{id}",
            get(handlers::session::get_session).delete(handlers::session::delete_session),
        )
        .route(
            "/sessions/{id}/metadata",
            patch(handlers::session::update_metadata),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .route("/", get(root))
        .layer(cors_layer(&state.config.server.frontend_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let mut origins: Vec<HeaderValue> = Vec::new();
    for origin in std::iter::once(frontend_url).chain(DEV_ORIGINS) {
        match HeaderValue::from_str(origin) {
            Ok(value) if !origins.contains(&value) => origins.push(value),
            Ok(_) => {}
            Err(_) => tracing::warn!(%origin, "ignoring invalid CORS origin"),
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// GET /health - Liveness check.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.server.environment,
        "provider": state.conversation.provider_name(),
        "sessions": state.store().len(),
    }))
}

/// GET / - Service banner.
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "parley",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}
