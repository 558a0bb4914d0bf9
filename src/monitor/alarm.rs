//! Stateful alarm monitor: owns the tick state and fires the cue.

use std::time::Instant;
use tracing::{debug, info, warn};

use super::state::{evaluate, AlarmState, MonitorSettings, MonitorState};
use crate::cue::AlarmCue;
use crate::types::{AlarmTransition, Threshold, TickOutput};

/// Smooths the estimate for display and drives the alarm state machine.
///
/// The cue is dispatched on the Idle -> Active transition only and never
/// blocks the tick.
pub struct AlarmMonitor<C: AlarmCue> {
    settings: MonitorSettings,
    state: MonitorState,
    cue: C,
}

impl<C: AlarmCue> AlarmMonitor<C> {
    pub fn new(settings: MonitorSettings, cue: C) -> Self {
        Self {
            settings,
            state: MonitorState::default(),
            cue,
        }
    }

    /// Process one decibel estimate.
    ///
    /// NaN or infinite estimates leave the display level untouched and never
    /// raise the alarm.
    pub fn tick(&mut self, estimate: f64, threshold: Threshold, now: Instant) -> TickOutput {
        let (next, output) = evaluate(self.state, estimate, threshold, now, &self.settings);
        self.state = next;

        match output.transition {
            Some(AlarmTransition::Triggered) => {
                warn!(
                    estimate_db = estimate,
                    threshold = %threshold,
                    reset_after_secs = self.settings.reset_after.as_secs_f64(),
                    "🔔 Volume above threshold, alarm raised"
                );
                self.cue.dispatch();
            }
            Some(AlarmTransition::Reset) => {
                info!(estimate_db = estimate, "Alarm cleared");
            }
            Some(AlarmTransition::Extended) => {
                debug!(estimate_db = estimate, "Alarm deadline extended");
            }
            None => {}
        }

        output
    }

    /// Drop all per-session state. The next tick seeds the display level
    /// again and starts from Idle; a pending deadline is discarded.
    pub fn reset(&mut self) {
        if self.state.alarm.is_active() {
            debug!("Discarding pending alarm deadline");
        }
        self.state = MonitorState::default();
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn alarm(&self) -> AlarmState {
        self.state.alarm
    }

    pub fn display_level(&self) -> Option<f64> {
        self.state.display_level
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn cue(&self) -> &C {
        &self.cue
    }
}
