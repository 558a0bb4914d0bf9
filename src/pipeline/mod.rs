//! Monitoring Pipeline
//!
//! ```text
//! acquisition ──frame──▶ SignalSampler ──dB──▶ AlarmMonitor ──▶ LevelReport (watch)
//!                                                  │                 │
//!                                                  ▼                 ├──▶ reporter (500 ms)
//!                                          CueDispatcher             └──▶ HTTP API
//! ```
//!
//! One tick every frame interval (16 ms by default). The threshold is read
//! from a shared [`ThresholdHandle`](crate::types::ThresholdHandle) at the
//! start of each tick; stdin, the HTTP API and the config watcher write it.

pub mod control;
pub mod reporter;
mod session;
mod state;

pub use control::{
    parse_command, run_control, run_stdin_control, spawn_line_reader, ControlCommand, ControlError,
};
pub use reporter::run_reporter;
pub use session::{MonitoringSession, SessionContext};
pub use state::*;
