//! Enumeration types for the ISA installation simulator.
//!
//! Wire names are fixed by the client contract, including the historical
//! `ISAVerfiyCal` spelling.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Calibration stages
// ---------------------------------------------------------------------------

/// One of the seven calibration stages of an ISA installation, in the
/// order the device walks through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Stage {
    /// Verify that a device is connected.
    #[serde(rename = "ISAConnect")]
    Connect,
    /// Device health check.
    #[serde(rename = "ISAHealth")]
    Health,
    /// Firmware version check.
    #[serde(rename = "ISAFirmware")]
    Firmware,
    /// Brake pedal calibration.
    #[serde(rename = "ISABrakeCal")]
    BrakeCal,
    /// Accelerator pedal calibration.
    #[serde(rename = "ISAAccelCal")]
    AccelCal,
    /// Calibration verification.
    #[serde(rename = "ISAVerfiyCal")]
    VerifyCal,
    /// Option configuration.
    #[serde(rename = "ISAOptions")]
    Options,
}

impl Stage {
    /// All stages in declared order.
    pub const ALL: [Self; 7] = [
        Self::Connect,
        Self::Health,
        Self::Firmware,
        Self::BrakeCal,
        Self::AccelCal,
        Self::VerifyCal,
        Self::Options,
    ];

    /// The name this stage carries on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Connect => "ISAConnect",
            Self::Health => "ISAHealth",
            Self::Firmware => "ISAFirmware",
            Self::BrakeCal => "ISABrakeCal",
            Self::AccelCal => "ISAAccelCal",
            Self::VerifyCal => "ISAVerfiyCal",
            Self::Options => "ISAOptions",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ---------------------------------------------------------------------------
// Error status
// ---------------------------------------------------------------------------

/// What the client is expected to do after a device fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ErrorStatus {
    /// The installation cannot continue.
    Abort,
    /// The stage named by `ResumeStep` should be repeated.
    Repeat,
}

// ---------------------------------------------------------------------------
// Step presentation
// ---------------------------------------------------------------------------

/// How the client renders progress for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StepStatusType {
    /// A plain status message.
    Message,
    /// A progress bar.
    Progress,
    /// A popup requiring operator interaction.
    Popup,
}

// ---------------------------------------------------------------------------
// Engine phase
// ---------------------------------------------------------------------------

/// Coarse lifecycle phase of the progress stream engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EnginePhase {
    /// No timer is running.
    Idle,
    /// The timer is running and events are being emitted.
    Streaming,
    /// The timer is running but emission is held after a fault event.
    PausedOnError,
}
