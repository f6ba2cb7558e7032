//! Shared application state for the simulator API.
//!
//! [`AppState`] owns the [`StreamEngine`], the artificial reply latency
//! applied by the control endpoints, and the shutdown token that ends open
//! event streams. It is wrapped in [`Arc`] and injected through Axum's
//! `State` extractor.

use std::sync::Arc;
use std::time::Duration;

use isasim_core::StreamEngine;
use tokio_util::sync::CancellationToken;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The progress stream engine.
    pub engine: Arc<StreamEngine>,
    /// How long control endpoints wait before replying.
    pub response_delay: Duration,
    /// Cancelled when the server starts shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create application state around an engine.
    pub fn new(engine: Arc<StreamEngine>, response_delay: Duration) -> Self {
        Self {
            engine,
            response_delay,
            shutdown: CancellationToken::new(),
        }
    }

    /// Sleep for the configured reply latency.
    ///
    /// The state change a handler performs has already happened by the
    /// time this is awaited; only the reply is held back.
    pub async fn reply_delay(&self) {
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
    }
}
