//! Server-Sent Events handler for the step progress stream.
//!
//! Clients connect to `GET /service/sse` and receive one
//! `data: <json StepEvent>\n\n` frame per emitting engine tick. The
//! connection owns a [`Subscription`]; when the client goes away Axum
//! drops the response stream, the subscription with it, and the engine
//! stops its timer and rewinds. Server shutdown ends every open stream the
//! same way.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::StreamExt;
use futures::stream::{self, Stream};
use tracing::{info, warn};

use isasim_core::Subscription;

use crate::state::AppState;

/// Attach to the engine and stream step events.
///
/// # Route
///
/// `GET /service/sse`
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let subscription = state.engine.attach();
    info!(subscriber = %subscription.id(), "SSE client connected");

    let frames = stream::unfold(subscription, next_frame)
        .take_until(state.shutdown.clone().cancelled_owned());
    Sse::new(frames)
}

/// Wait for the next engine event and encode it as an SSE frame.
///
/// Ends the stream only if the engine's sender is gone.
async fn next_frame(
    mut subscription: Subscription,
) -> Option<(Result<Event, Infallible>, Subscription)> {
    loop {
        let event = subscription.recv().await?;
        match Event::default().json_data(&event) {
            Ok(frame) => return Some((Ok(frame), subscription)),
            Err(e) => {
                warn!(subscriber = %subscription.id(), "failed to serialize step event: {e}");
            }
        }
    }
}
