//! Readable level display.
//!
//! The tick loop publishes at frame rate; this task logs the latest report at
//! a slower, readable cadence.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::LevelReport;

/// Log the latest report every `every` until cancelled or the session's
/// channel closes.
pub async fn run_reporter(levels: watch::Receiver<LevelReport>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if levels.has_changed().is_err() {
                    debug!("Level channel closed, reporter stopping");
                    break;
                }
                let report = levels.borrow().clone();
                if report.ticks == 0 {
                    debug!("Waiting for the first sample...");
                    continue;
                }
                if report.ticks == last_tick {
                    continue;
                }
                last_tick = report.ticks;

                if report.alarm_active {
                    warn!("🔊 {}", report.status_line());
                } else {
                    info!("🔈 {}", report.status_line());
                }
            }
        }
    }
}
