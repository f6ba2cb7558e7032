//! Shared wire types for the ISA installation simulator.
//!
//! Every JSON field name here is part of the client contract. Types flow
//! to `TypeScript` via `ts-rs` for the installation front end.
//!
//! # Modules
//!
//! - [`enums`] -- Calibration stages, fault status, step presentation, engine phase
//! - [`events`] -- Step events streamed over SSE
//! - [`ids`] -- Subscriber identifiers
//! - [`service`] -- Control endpoint response bodies

pub mod enums;
pub mod events;
pub mod ids;
pub mod service;

// Re-export all public types at crate root for convenience.
pub use enums::{EnginePhase, ErrorStatus, Stage, StepStatusType};
pub use events::{ErrorInfo, InvalidStepEvent, StepEvent, StepEventWire, StepInfo, StepPayload};
pub use ids::SubscriberId;
pub use service::{EngineStatus, MessageResponse, StartResponse, StepDescriptor, StepsResponse};
