//! Alarm monitor.
//!
//! - [`state`]: the pure per-tick transition function
//! - [`alarm`]: [`AlarmMonitor`], which owns the state and fires the cue

pub mod alarm;
pub mod state;

pub use alarm::AlarmMonitor;
pub use state::{evaluate, smooth, AlarmState, MonitorSettings, MonitorState, ResetPolicy};
