//! Progress stream engine and configuration for the ISA installation
//! simulator.
//!
//! This crate owns everything that is not HTTP: the configuration layer,
//! the pre-generated step event table, the static step catalog, and the
//! interval-driven stream engine with its pause-on-fault state machine.
//!
//! # Modules
//!
//! - [`catalog`] -- The fixed seven-step service descriptor list.
//! - [`config`] -- Configuration from defaults, YAML and environment.
//! - [`engine`] -- [`StreamEngine`] state machine and timer task.
//! - [`event_table`] -- Randomised generation of the 35-event table.
//!
//! [`StreamEngine`]: engine::StreamEngine

pub mod catalog;
pub mod config;
pub mod engine;
pub mod event_table;

pub use config::{ConfigError, SimulatorConfig};
pub use engine::{StreamEngine, Subscription, TickOutcome};
pub use event_table::{build_event_table, generate_events};
