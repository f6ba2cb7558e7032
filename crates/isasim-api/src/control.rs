//! Stream control handlers.
//!
//! Each handler mutates engine state immediately, then waits out the
//! configured reply latency before acknowledging.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/service/resume` | Clear the fault pause and skip ahead one event |
//! | `POST` | `/service/cancel` | Stop the timer and rewind to the first event |
//! | `POST` | `/service/temper` | Clear a tamper hold; same effect as resume |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use tracing::info;

use isasim_types::MessageResponse;

use crate::state::AppState;

/// Reply to `POST /service/resume`.
pub const RESUMED_MESSAGE: &str = "Stream resumed";

/// Reply to `POST /service/cancel`.
pub const CANCELED_MESSAGE: &str = "Stream canceled and clients disconnected";

/// Reply to `POST /service/temper`.
pub const TEMPER_MESSAGE: &str = "Device is not tempered resumed";

// ---------------------------------------------------------------------------
// POST /service/resume
// ---------------------------------------------------------------------------

/// Resume the stream after a fault.
pub async fn resume(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.engine.resume();
    info!(cursor = state.engine.cursor(), "resume requested");
    state.reply_delay().await;
    Json(MessageResponse::new(RESUMED_MESSAGE))
}

// ---------------------------------------------------------------------------
// POST /service/cancel
// ---------------------------------------------------------------------------

/// Cancel the stream and rewind.
pub async fn cancel(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.engine.cancel();
    info!("cancel requested");
    state.reply_delay().await;
    Json(MessageResponse::new(CANCELED_MESSAGE))
}

// ---------------------------------------------------------------------------
// POST /service/temper
// ---------------------------------------------------------------------------

/// Clear a tamper hold.
pub async fn temper(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.engine.temper();
    info!(cursor = state.engine.cursor(), "tamper check requested");
    state.reply_delay().await;
    Json(MessageResponse::new(TEMPER_MESSAGE))
}
