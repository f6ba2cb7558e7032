//! Axum router construction for the simulator API.
//!
//! Assembles all routes into a single [`Router`] with CORS open to any
//! origin, since the installation front end is served from elsewhere.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{control, handlers, sse};

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /` -- health check
/// - `GET /service/sse` -- step event stream
/// - `POST /service/resume` -- resume after a fault
/// - `POST /service/cancel` -- cancel and rewind
/// - `POST /service/temper` -- clear a tamper hold
/// - `POST /service/steps` -- step list
/// - `POST /service/start` -- start the service run
/// - `GET /service/status` -- engine diagnostics
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/", get(handlers::index))
        // Event stream
        .route("/service/sse", get(sse::stream_events))
        // Control
        .route("/service/resume", post(control::resume))
        .route("/service/cancel", post(control::cancel))
        .route("/service/temper", post(control::temper))
        // Metadata
        .route("/service/steps", post(handlers::steps))
        .route("/service/start", post(handlers::start))
        .route("/service/status", get(handlers::status))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
