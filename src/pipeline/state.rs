//! Session status and statistics shared with the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::TickOutput;

// ============================================================================
// Session Status
// ============================================================================

/// Lifecycle of a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Waiting for the acquisition source to become ready.
    Starting,
    /// Ticking.
    Monitoring,
    /// Cancelled and torn down.
    Stopped,
    /// Acquisition failed; monitoring cannot proceed.
    Failed { reason: String },
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed { .. })
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Monitoring => write!(f, "monitoring"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

// ============================================================================
// Session Statistics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub ticks_processed: u64,
    pub alarms_triggered: u64,
    pub alarms_reset: u64,
    /// Loudest raw estimate seen this session.
    pub peak_estimate_db: Option<f64>,
    pub cue_failures: u64,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionStats {
    /// Fold one tick into the counters.
    pub fn record(&mut self, output: &TickOutput) {
        use crate::types::AlarmTransition;

        self.ticks_processed += 1;
        match output.transition {
            Some(AlarmTransition::Triggered) => self.alarms_triggered += 1,
            Some(AlarmTransition::Reset) => self.alarms_reset += 1,
            _ => {}
        }
        if output.estimate.is_finite() {
            self.peak_estimate_db = Some(
                self.peak_estimate_db
                    .map_or(output.estimate, |peak| peak.max(output.estimate)),
            );
        }
    }
}

/// Status plus counters, published after every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub source: String,
    pub stats: SessionStats,
}

impl SessionSnapshot {
    pub fn starting() -> Self {
        Self {
            status: SessionStatus::Starting,
            source: String::new(),
            stats: SessionStats::default(),
        }
    }
}
