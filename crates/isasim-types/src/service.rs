//! Response bodies for the service control endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{EnginePhase, Stage, StepStatusType};

/// Describes one installation step for the client's step list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "PascalCase")]
#[ts(export, export_to = "bindings/")]
pub struct StepDescriptor {
    /// Display name, e.g. `Brake Calibration`.
    pub step_name: String,
    /// The stage this step corresponds to.
    pub step_abbreviation: Stage,
    /// How the client renders this step.
    pub step_status_type: StepStatusType,
}

/// Body of `POST /service/steps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "PascalCase")]
#[ts(export, export_to = "bindings/")]
pub struct StepsResponse {
    /// Always `true`: the device is ready.
    pub plus_lite_ready: bool,
    /// Service name.
    pub service_info: String,
    /// Ordered step list.
    pub service_steps: Vec<StepDescriptor>,
}

/// Body of `POST /service/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StartResponse {
    /// Always `true`: the service run has started.
    #[serde(rename = "startPerfomService")]
    pub start_perform_service: bool,
    /// Service name.
    #[serde(rename = "ServiceInfo")]
    pub service_info: String,
    /// Ordered step list.
    #[serde(rename = "ServiceSteps")]
    pub service_steps: Vec<StepDescriptor>,
}

/// `{"message": ...}` acknowledgement used by the control endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MessageResponse {
    /// Human-readable acknowledgement.
    pub message: String,
}

impl MessageResponse {
    /// Build a message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Snapshot of the stream engine for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EngineStatus {
    /// Current lifecycle phase.
    pub phase: EnginePhase,
    /// Index of the next event to consider.
    pub cursor: usize,
    /// Whether emission is held after a fault.
    pub paused: bool,
    /// Length of the event table.
    pub total_events: usize,
    /// Number of attached subscribers.
    pub subscribers: usize,
    /// When the engine was created.
    pub started_at: DateTime<Utc>,
}
