//! Pure alarm state machine.
//!
//! ```text
//! Idle   --(estimate > threshold)--> Active [cue, deadline = now + D]
//! Active --(now >= deadline)-------> Idle
//! Active --(estimate > threshold)--> Active (suppressed)
//! ```
//!
//! Transitions are decided on the state at the start of the tick, so the tick
//! that clears an expired alarm never re-triggers it; the next loud tick does.
//!
//! Under the default [`ResetPolicy::Fixed`] an alarm clears after exactly `D`
//! even if the room is still loud, and cannot fire again until it cleared.
//! This hysteresis is intended. [`ResetPolicy::Extend`] is the opt-in variant
//! that pushes the deadline back while the estimate stays above threshold.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::config::defaults::{ALARM_RESET_SECS, DISPLAY_SMOOTHING};
use crate::types::{AlarmTransition, Threshold, TickOutput};

/// What happens to an Active alarm while the estimate stays above threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// Clear after the fixed window regardless of ongoing loudness.
    #[default]
    Fixed,
    /// Re-arm the deadline on every loud tick; clear `D` after the last one.
    Extend,
}

/// Tuning of the smoother and the alarm window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Weight of the previous display level, in `[0, 1)`.
    pub smoothing: f64,
    /// Time an alarm stays latched (`D`).
    pub reset_after: Duration,
    pub reset_policy: ResetPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            smoothing: DISPLAY_SMOOTHING,
            reset_after: Duration::from_secs(ALARM_RESET_SECS),
            reset_policy: ResetPolicy::Fixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    #[default]
    Idle,
    Active {
        triggered_at: Instant,
        deadline: Instant,
    },
}

impl AlarmState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Pending reset deadline, if Active.
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Idle => None,
            Self::Active { deadline, .. } => Some(*deadline),
        }
    }
}

/// Everything carried from one tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonitorState {
    /// `None` before the first tick of the session.
    pub display_level: Option<f64>,
    pub alarm: AlarmState,
}

/// Exponential smoothing step. The first estimate seeds the display level.
pub fn smooth(previous: Option<f64>, estimate: f64, smoothing: f64) -> f64 {
    match previous {
        None => estimate,
        Some(display) => display * smoothing + estimate * (1.0 - smoothing),
    }
}

/// Advance the monitor by one tick.
///
/// Pure: the caller owns the state and performs the cue side effect when the
/// output carries [`AlarmTransition::Triggered`].
///
/// A non-finite estimate (NaN or infinite) is skipped for smoothing and never
/// triggers; a pending deadline still expires on that tick.
pub fn evaluate(
    state: MonitorState,
    estimate: f64,
    threshold: Threshold,
    now: Instant,
    settings: &MonitorSettings,
) -> (MonitorState, TickOutput) {
    let usable = estimate.is_finite();
    let display = if usable {
        Some(smooth(state.display_level, estimate, settings.smoothing))
    } else {
        state.display_level
    };
    let loud = usable && threshold.is_exceeded_by(estimate);

    let (alarm, transition) = match state.alarm {
        AlarmState::Idle if loud => (
            AlarmState::Active {
                triggered_at: now,
                deadline: now + settings.reset_after,
            },
            Some(AlarmTransition::Triggered),
        ),
        AlarmState::Idle => (AlarmState::Idle, None),
        AlarmState::Active { deadline, .. } if now >= deadline => {
            (AlarmState::Idle, Some(AlarmTransition::Reset))
        }
        AlarmState::Active { triggered_at, .. }
            if loud && settings.reset_policy == ResetPolicy::Extend =>
        {
            (
                AlarmState::Active {
                    triggered_at,
                    deadline: now + settings.reset_after,
                },
                Some(AlarmTransition::Extended),
            )
        }
        active @ AlarmState::Active { .. } => (active, None),
    };

    let next = MonitorState {
        display_level: display,
        alarm,
    };
    let output = TickOutput {
        estimate,
        display_level: display.unwrap_or(0.0),
        alarm_active: alarm.is_active(),
        transition,
    };
    (next, output)
}
