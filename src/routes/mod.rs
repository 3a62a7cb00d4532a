//! Router assembly.

mod entity;

pub use entity::entity_routes;

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

/// Path prefix of the table API.
pub const API_PREFIX: &str = "/api/v1";

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Readiness follows the backend: 503 while a ping fails.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok", "database": "ok"}))),
        Err(e) => {
            tracing::warn!(error = %e, "backend ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "degraded", "database": "unavailable"})),
            )
        }
    }
}

/// GET /health, GET /ready, GET /version.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route("/ready", get(ready))
        .route(
            "/version",
            get(|| async {
                Json(json!({"name": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION")}))
            }),
        )
        .with_state(state)
}

/// Full application router: table API under [`API_PREFIX`] plus health routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, entity_routes(state.clone()))
        .merge(common_routes(state))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
