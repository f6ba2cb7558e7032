//! HTTP server lifecycle management.
//!
//! Provides [`start_server`] which binds to a TCP port and runs the
//! Axum server until the supplied shutdown future resolves, and [`serve`]
//! for a listener the caller has already bound.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use isasim_core::config::ListenConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&ListenConfig::default())
    }
}

impl From<&ListenConfig> for ServerConfig {
    fn from(listen: &ListenConfig) -> Self {
        Self {
            host: listen.host.clone(),
            port: listen.port,
        }
    }
}

impl ServerConfig {
    /// Parse the configured host and port into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address does not parse.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
    }
}

/// Start the HTTP server.
///
/// Binds to the configured address and hands off to [`serve`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server<F>(
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;

    serve(listener, state, shutdown).await
}

/// Serve requests on an already bound listener until `shutdown` resolves.
///
/// When `shutdown` resolves the state's shutdown token is cancelled, which
/// ends every open event stream so the graceful drain can complete. Other
/// in-flight requests are allowed to finish.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("listener has no local address: {e}")))?;
    let token = state.shutdown.clone();
    let router = build_router(state);

    info!(%addr, "SSE server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown requested, closing event streams");
            token.cancel();
        })
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))?;

    info!("server stopped");
    Ok(())
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
