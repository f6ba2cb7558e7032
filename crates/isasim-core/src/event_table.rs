//! Generation of the fixed step event table.
//!
//! The table always has [`EVENTS_PER_STAGE`] events for each of the seven
//! stages, in stage order. Sample values are random; whether an event is
//! a fault is drawn with [`EventTableConfig::error_probability`].

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use isasim_types::{ErrorInfo, ErrorStatus, Stage, StepEvent, StepInfo};

use crate::config::EventTableConfig;

/// Sub-steps generated per stage.
pub const EVENTS_PER_STAGE: u8 = 5;

/// Completion percent added per sub-step.
const COMPLETION_STEP: u8 = 25;

/// Popup names sampled for the verification stage.
const VERIFY_POPUPS: [&str; 3] = ["Verify1", "Verify2", "Verify3"];

/// A fault the generator can inject.
struct FaultSample {
    code: &'static str,
    message: &'static str,
    status: ErrorStatus,
    resume_step: Stage,
}

impl FaultSample {
    fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.to_owned(),
            message: self.message.to_owned(),
            status: self.status,
            resume_step: self.resume_step,
        }
    }
}

const FAULT_SAMPLES: [FaultSample; 5] = [
    FaultSample {
        code: "E001",
        message: "Connection failed. Please check the network.",
        status: ErrorStatus::Abort,
        resume_step: Stage::Connect,
    },
    FaultSample {
        code: "E002",
        message: "Health check timed out.",
        status: ErrorStatus::Repeat,
        resume_step: Stage::Health,
    },
    FaultSample {
        code: "E003",
        message: "Firmware version mismatch.",
        status: ErrorStatus::Abort,
        resume_step: Stage::Firmware,
    },
    FaultSample {
        code: "E004",
        message: "Brake calibration incomplete.",
        status: ErrorStatus::Repeat,
        resume_step: Stage::BrakeCal,
    },
    FaultSample {
        code: "E005",
        message: "Unexpected pedal position value.",
        status: ErrorStatus::Repeat,
        resume_step: Stage::AccelCal,
    },
];

/// Total number of events in a generated table.
pub const fn table_len() -> usize {
    Stage::ALL.len().saturating_mul(EVENTS_PER_STAGE as usize)
}

/// Generate the event table using the supplied RNG.
///
/// An out-of-range `error_probability` is treated as zero; configuration
/// validation rejects such values before they get here.
pub fn generate_events<R: Rng + ?Sized>(config: &EventTableConfig, rng: &mut R) -> Vec<StepEvent> {
    let fault_chance = if (0.0..=1.0).contains(&config.error_probability) {
        config.error_probability
    } else {
        warn!(
            error_probability = config.error_probability,
            "error probability outside [0, 1], fault injection disabled"
        );
        0.0
    };

    let mut events = Vec::with_capacity(table_len());
    for stage in Stage::ALL {
        for sub_step in 0..EVENTS_PER_STAGE {
            let fault = if rng.random_bool(fault_chance) {
                FAULT_SAMPLES.choose(&mut *rng).map(FaultSample::to_error_info)
            } else {
                None
            };

            let event = match fault {
                Some(info) => StepEvent::fault(stage, info),
                None => StepEvent::progress(stage, sample_progress(stage, sub_step, &mut *rng)),
            };
            events.push(event);
        }
    }

    debug!(
        events = events.len(),
        faults = events.iter().filter(|e| e.is_fault()).count(),
        "event table generated"
    );
    events
}

/// Generate the event table, seeding from config when a seed is set.
pub fn build_event_table(config: &EventTableConfig) -> Vec<StepEvent> {
    let mut rng = config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    generate_events(config, &mut rng)
}

fn sample_progress<R: Rng + ?Sized>(stage: Stage, sub_step: u8, rng: &mut R) -> StepInfo {
    let popup_step = if stage == Stage::VerifyCal {
        VERIFY_POPUPS
            .choose(&mut *rng)
            .map_or_else(|| stage.wire_name(), |popup| *popup)
    } else {
        stage.wire_name()
    };

    StepInfo {
        completion: sub_step.saturating_mul(COMPLETION_STEP),
        popup_step: popup_step.to_owned(),
        pedal_position: rng.random_range(0..=100),
        engine_rpm: rng.random_range(0..=100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(error_probability: f64) -> EventTableConfig {
        EventTableConfig {
            error_probability,
            seed: None,
        }
    }

    #[test]
    fn table_has_five_events_per_stage_in_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let events = generate_events(&config(0.0), &mut rng);
        assert_eq!(events.len(), 35);
        assert_eq!(table_len(), 35);

        for (stage, chunk) in Stage::ALL.iter().zip(events.chunks(5)) {
            assert_eq!(chunk.len(), 5);
            assert!(chunk.iter().all(|e| e.stage() == *stage));
        }
    }

    #[test]
    fn zero_probability_never_faults() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let events = generate_events(&config(0.0), &mut rng);
            assert!(events.iter().all(|e| e.error_info().is_none()));
        }
    }

    #[test]
    fn full_probability_always_faults() {
        let mut rng = StdRng::seed_from_u64(3);
        let events = generate_events(&config(1.0), &mut rng);
        assert_eq!(events.len(), 35);
        assert!(events.iter().all(StepEvent::is_fault));
    }

    #[test]
    fn every_event_carries_exactly_one_payload() {
        let mut rng = StdRng::seed_from_u64(11);
        let events = generate_events(&config(0.5), &mut rng);
        for event in &events {
            assert!(event.step_info().is_some() ^ event.error_info().is_some());
        }
    }

    #[test]
    fn completion_steps_by_quarter() {
        let mut rng = StdRng::seed_from_u64(5);
        let events = generate_events(&config(0.0), &mut rng);
        let completions: Vec<u8> = events
            .iter()
            .take(5)
            .filter_map(|e| e.step_info().map(|info| info.completion))
            .collect();
        assert_eq!(completions, vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(8);
        let events = generate_events(&config(0.0), &mut rng);
        for info in events.iter().filter_map(StepEvent::step_info) {
            assert!(info.pedal_position <= 100);
            assert!(info.engine_rpm <= 100);
        }
    }

    #[test]
    fn popup_names_follow_stage() {
        let mut rng = StdRng::seed_from_u64(9);
        let events = generate_events(&config(0.0), &mut rng);
        for event in &events {
            let Some(info) = event.step_info() else {
                continue;
            };
            if event.stage() == Stage::VerifyCal {
                assert!(VERIFY_POPUPS.contains(&info.popup_step.as_str()));
            } else {
                assert_eq!(info.popup_step, event.stage().wire_name());
            }
        }
    }

    #[test]
    fn faults_come_from_sample_table() {
        let mut rng = StdRng::seed_from_u64(4);
        let events = generate_events(&config(1.0), &mut rng);
        for info in events.iter().filter_map(StepEvent::error_info) {
            assert!(FAULT_SAMPLES.iter().any(|s| s.code == info.code
                && s.message == info.message
                && s.status == info.status
                && s.resume_step == info.resume_step));
        }
    }

    #[test]
    fn out_of_range_probability_disables_faults() {
        let mut rng = StdRng::seed_from_u64(2);
        let events = generate_events(&config(7.0), &mut rng);
        assert!(events.iter().all(|e| !e.is_fault()));
    }

    #[test]
    fn seeded_tables_are_reproducible() {
        let seeded = EventTableConfig {
            error_probability: 0.3,
            seed: Some(42),
        };
        assert_eq!(build_event_table(&seeded), build_event_table(&seeded));
    }
}
