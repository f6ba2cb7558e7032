//! Static service catalog served by the step listing endpoints.

use isasim_types::{Stage, StartResponse, StepDescriptor, StepStatusType, StepsResponse};

/// Service name reported to clients.
pub const SERVICE_INFO: &str = "ISA Installation";

/// Display name and presentation for each stage, in stage order.
const STEP_TABLE: [(&str, Stage, StepStatusType); 7] = [
    ("Verify Connected Device", Stage::Connect, StepStatusType::Message),
    ("Device Health Check", Stage::Health, StepStatusType::Progress),
    ("Firmware Check", Stage::Firmware, StepStatusType::Progress),
    ("Brake Calibration", Stage::BrakeCal, StepStatusType::Popup),
    ("Accelerator Calibration", Stage::AccelCal, StepStatusType::Popup),
    ("Verify Calibration", Stage::VerifyCal, StepStatusType::Popup),
    ("Option Configuration", Stage::Options, StepStatusType::Progress),
];

/// The ordered step list.
pub fn service_steps() -> Vec<StepDescriptor> {
    STEP_TABLE
        .iter()
        .map(|(name, stage, status_type)| StepDescriptor {
            step_name: (*name).to_owned(),
            step_abbreviation: *stage,
            step_status_type: *status_type,
        })
        .collect()
}

/// Body for the step listing endpoint.
pub fn steps_response() -> StepsResponse {
    StepsResponse {
        plus_lite_ready: true,
        service_info: SERVICE_INFO.to_owned(),
        service_steps: service_steps(),
    }
}

/// Body for the service start endpoint.
pub fn start_response() -> StartResponse {
    StartResponse {
        start_perform_service: true,
        service_info: SERVICE_INFO.to_owned(),
        service_steps: service_steps(),
    }
}
