//! volume-monitor: ambient sound level monitor
//!
//! Samples a microphone (or a synthetic / replayed signal), converts each
//! frame into a decibel estimate, smooths it for display and raises a
//! debounced, auto-resetting alarm with an audible cue when the estimate
//! exceeds a selectable threshold.
//!
//! ## Architecture
//!
//! - **Acquisition**: frame sources behind [`AcquisitionSource`]
//! - **Sampler**: frame -> decibel estimate ([`SignalSampler`])
//! - **Monitor**: display smoothing and the alarm state machine ([`AlarmMonitor`])
//! - **Cue**: fire-and-forget tone playback ([`CueDispatcher`])
//! - **Pipeline**: the ticking [`MonitoringSession`], reporter and stdin picker
//! - **API**: read-only HTTP views plus the threshold picker

pub mod acquisition;
pub mod api;
pub mod config;
pub mod cue;
pub mod monitor;
pub mod pipeline;
pub mod sampler;
pub mod types;

pub use acquisition::{AcquisitionError, AcquisitionSource, ReplaySource, Scenario, SyntheticSource};
pub use config::MonitorConfig;
pub use cue::{AlarmCue, CueDispatcher, CueError, ToneSpec};
pub use monitor::{AlarmMonitor, AlarmState, MonitorSettings, ResetPolicy};
pub use pipeline::{MonitoringSession, SessionContext, SessionStats, SessionStatus};
pub use sampler::{decibel_estimate, SignalSampler};
pub use types::{AlarmTransition, LevelReport, Threshold, ThresholdError, ThresholdHandle, TickOutput};
