//! Step events streamed to the installation client.
//!
//! A [`StepEvent`] carries either progress data or a device fault, never
//! both and never neither. In memory that is a [`StepPayload`] enum; on
//! the wire it is the pair of nullable `StepInfo` / `ErrorInfo` fields the
//! client expects, converted through [`StepEventWire`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ErrorStatus, Stage};

// ---------------------------------------------------------------------------
// Progress payload
// ---------------------------------------------------------------------------

/// Progress sample reported while a stage is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "PascalCase")]
#[ts(export, export_to = "bindings/")]
pub struct StepInfo {
    /// Stage completion in percent (0, 25, 50, 75, 100).
    pub completion: u8,
    /// Name of the popup the client should show for this sample.
    pub popup_step: String,
    /// Pedal position sample, 0 to 100. Sent as a decimal string.
    #[serde(with = "decimal_string")]
    #[ts(as = "String")]
    pub pedal_position: u8,
    /// Engine RPM sample, 0 to 100. Sent as a decimal string.
    #[serde(rename = "EngineRPM", with = "decimal_string")]
    #[ts(as = "String")]
    pub engine_rpm: u8,
}

// ---------------------------------------------------------------------------
// Fault payload
// ---------------------------------------------------------------------------

/// Synthetic device fault surfaced to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorInfo {
    /// Fault code such as `E001`.
    #[serde(rename = "Error")]
    pub code: String,
    /// Human-readable fault description.
    #[serde(rename = "ErrorMessage")]
    pub message: String,
    /// Whether to abort or repeat.
    #[serde(rename = "Status")]
    pub status: ErrorStatus,
    /// Stage the client should go back to.
    #[serde(rename = "ResumeStep")]
    pub resume_step: Stage,
}

// ---------------------------------------------------------------------------
// StepEvent
// ---------------------------------------------------------------------------

/// The data a [`StepEvent`] carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPayload {
    /// Normal progress.
    Progress(StepInfo),
    /// A device fault. Emitting one pauses the stream.
    Fault(ErrorInfo),
}

/// One unit of streamed progress for a calibration stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StepEventWire", try_from = "StepEventWire")]
pub struct StepEvent {
    stage: Stage,
    payload: StepPayload,
}

impl StepEvent {
    /// Build a progress event.
    pub const fn progress(stage: Stage, info: StepInfo) -> Self {
        Self {
            stage,
            payload: StepPayload::Progress(info),
        }
    }

    /// Build a fault event.
    pub const fn fault(stage: Stage, info: ErrorInfo) -> Self {
        Self {
            stage,
            payload: StepPayload::Fault(info),
        }
    }

    /// The stage this event belongs to.
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// The event payload.
    pub const fn payload(&self) -> &StepPayload {
        &self.payload
    }

    /// Progress data, if this is not a fault.
    pub const fn step_info(&self) -> Option<&StepInfo> {
        match &self.payload {
            StepPayload::Progress(info) => Some(info),
            StepPayload::Fault(_) => None,
        }
    }

    /// Fault data, if this is a fault.
    pub const fn error_info(&self) -> Option<&ErrorInfo> {
        match &self.payload {
            StepPayload::Fault(info) => Some(info),
            StepPayload::Progress(_) => None,
        }
    }

    /// Whether this event carries a fault.
    pub const fn is_fault(&self) -> bool {
        matches!(self.payload, StepPayload::Fault(_))
    }
}

/// Wire shape of a [`StepEvent`].
///
/// Exactly one of `step_info` and `error_info` is `Some`; conversion back
/// into [`StepEvent`] rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/", rename = "StepEvent")]
pub struct StepEventWire {
    /// Stage the event belongs to.
    #[serde(rename = "CurrentStep")]
    pub current_step: Stage,
    /// Progress data, `null` for faults.
    #[serde(rename = "StepInfo")]
    pub step_info: Option<StepInfo>,
    /// Fault data, `null` for progress.
    #[serde(rename = "ErrorInfo")]
    pub error_info: Option<ErrorInfo>,
}

/// A wire event that does not carry exactly one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStepEvent {
    /// Both `StepInfo` and `ErrorInfo` were set.
    #[error("step event carries both StepInfo and ErrorInfo")]
    BothPayloads,
    /// Neither `StepInfo` nor `ErrorInfo` was set.
    #[error("step event carries neither StepInfo nor ErrorInfo")]
    NoPayload,
}

impl From<StepEvent> for StepEventWire {
    fn from(event: StepEvent) -> Self {
        let (step_info, error_info) = match event.payload {
            StepPayload::Progress(info) => (Some(info), None),
            StepPayload::Fault(info) => (None, Some(info)),
        };
        Self {
            current_step: event.stage,
            step_info,
            error_info,
        }
    }
}

impl TryFrom<StepEventWire> for StepEvent {
    type Error = InvalidStepEvent;

    fn try_from(wire: StepEventWire) -> Result<Self, Self::Error> {
        match (wire.step_info, wire.error_info) {
            (Some(info), None) => Ok(Self::progress(wire.current_step, info)),
            (None, Some(info)) => Ok(Self::fault(wire.current_step, info)),
            (Some(_), Some(_)) => Err(InvalidStepEvent::BothPayloads),
            (None, None) => Err(InvalidStepEvent::NoPayload),
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric samples as strings
// ---------------------------------------------------------------------------

/// Serialize a small integer as a decimal string (`57` → `"57"`).
///
/// Deserialization accepts either form.
mod decimal_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u8),
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.parse().map_err(D::Error::custom),
            Raw::Number(n) => Ok(n),
        }
    }
}
