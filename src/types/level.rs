//! Per-tick outputs of the alarm monitor and the snapshot published to the
//! presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Threshold;

/// Alarm state change produced by a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmTransition {
    /// Idle -> Active; the cue was dispatched.
    Triggered,
    /// Active -> Idle after the deadline passed.
    Reset,
    /// Active and still loud; the deadline was pushed back (`extend` policy only).
    Extended,
}

/// Observable result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    /// Decibel estimate sampled this tick.
    pub estimate: f64,
    /// Smoothed display level after this tick.
    pub display_level: f64,
    /// Alarm state after this tick.
    pub alarm_active: bool,
    pub transition: Option<AlarmTransition>,
}

/// Latest tick as seen by the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelReport {
    /// `None` until the first tick ran.
    pub estimate_db: Option<f64>,
    pub display_db: Option<f64>,
    pub alarm_active: bool,
    pub threshold_db: f64,
    pub ticks: u64,
    pub updated_at: DateTime<Utc>,
}

impl LevelReport {
    /// Report published before the first tick.
    pub fn waiting(threshold: Threshold) -> Self {
        Self {
            estimate_db: None,
            display_db: None,
            alarm_active: false,
            threshold_db: threshold.db(),
            ticks: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn from_tick(output: &TickOutput, threshold: Threshold, ticks: u64) -> Self {
        Self {
            estimate_db: Some(output.estimate),
            display_db: Some(output.display_level),
            alarm_active: output.alarm_active,
            threshold_db: threshold.db(),
            ticks,
            updated_at: Utc::now(),
        }
    }

    /// Status line text, e.g. `Current volume: 32.41 dB | normal`.
    pub fn status_line(&self) -> String {
        let level = self
            .display_db
            .map_or_else(|| "--".to_string(), |db| format!("{db:.2}"));
        let status = if self.alarm_active {
            "LOUD, threshold exceeded"
        } else {
            "normal"
        };
        format!(
            "Current volume: {level} dB | {status} (threshold {:.0} dB)",
            self.threshold_db
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiting_report_has_no_level() {
        let report = LevelReport::waiting(Threshold::default());
        assert!(report.display_db.is_none());
        assert!(report.status_line().starts_with("Current volume: -- dB | normal"));
    }

    #[test]
    fn test_status_line_marks_alarm() {
        let output = TickOutput {
            estimate: 50.0,
            display_level: 41.234,
            alarm_active: true,
            transition: Some(AlarmTransition::Triggered),
        };
        let report = LevelReport::from_tick(&output, Threshold::try_from_db(40.0).unwrap(), 7);
        let line = report.status_line();
        assert!(line.contains("41.23 dB"), "{line}");
        assert!(line.contains("LOUD"), "{line}");
        assert_eq!(report.ticks, 7);
    }
}
