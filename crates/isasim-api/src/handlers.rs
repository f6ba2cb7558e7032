//! Read-only endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Health check |
//! | `POST` | `/service/steps` | Step list, device ready flag |
//! | `POST` | `/service/start` | Step list, service started flag |
//! | `GET` | `/service/status` | Engine diagnostics |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{Uri, header};
use axum::response::IntoResponse;

use isasim_core::catalog;
use isasim_types::{EngineStatus, MessageResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// Reply to `GET /`.
pub const HEALTH_MESSAGE: &str = "Server is running ...";

/// Health check.
pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new(HEALTH_MESSAGE))
}

/// Return the step list with the device-ready flag.
pub async fn steps(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.reply_delay().await;
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Json(catalog::steps_response()),
    )
}

/// Return the step list with the service-started flag.
pub async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.reply_delay().await;
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Json(catalog::start_response()),
    )
}

/// Return an engine diagnostics snapshot.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.engine.status())
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {uri}"))
}
