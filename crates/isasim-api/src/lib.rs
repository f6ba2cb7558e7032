//! HTTP surface for the ISA installation simulator.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **SSE endpoint** (`/service/sse`) streaming step events from the
//!   [`StreamEngine`](isasim_core::StreamEngine)
//! - **Control endpoints** for resume, cancel and tamper acknowledgement
//! - **Metadata endpoints** for the step list and service start
//! - **Health and diagnostics** (`GET /`, `GET /service/status`)
//!
//! Every JSON field name and message string served here is part of the
//! installation client's contract.

pub mod control;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;

// Re-export primary types for convenience.
pub use error::ApiError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, serve, start_server};
pub use state::AppState;
