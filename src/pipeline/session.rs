//! Monitoring session: the periodic sample -> monitor -> publish loop.
//!
//! A session owns the sampler (and through it the acquisition source) and the
//! alarm monitor. It ticks on a tokio interval until cancelled or until
//! acquisition fails, and always tears down before returning.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::state::{SessionSnapshot, SessionStats, SessionStatus};
use crate::acquisition::{AcquisitionError, AcquisitionSource};
use crate::config::MonitorConfig;
use crate::cue::AlarmCue;
use crate::monitor::AlarmMonitor;
use crate::sampler::SignalSampler;
use crate::types::{LevelReport, ThresholdHandle, TickOutput};

// ============================================================================
// Session Context
// ============================================================================

/// Channels a session publishes to, created before the session starts so the
/// presentation layer can observe startup and failure.
#[derive(Clone)]
pub struct SessionContext {
    threshold: ThresholdHandle,
    levels: Arc<watch::Sender<LevelReport>>,
    snapshot: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionContext {
    pub fn new(threshold: ThresholdHandle) -> Self {
        let (levels, _) = watch::channel(LevelReport::waiting(threshold.get()));
        let (snapshot, _) = watch::channel(SessionSnapshot::starting());
        Self {
            threshold,
            levels: Arc::new(levels),
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn threshold(&self) -> &ThresholdHandle {
        &self.threshold
    }

    pub fn subscribe_levels(&self) -> watch::Receiver<LevelReport> {
        self.levels.subscribe()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn latest_level(&self) -> LevelReport {
        self.levels.borrow().clone()
    }

    pub fn latest_snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    fn set_status(&self, status: SessionStatus) {
        self.snapshot.send_modify(|s| s.status = status);
    }
}

// ============================================================================
// Monitoring Session
// ============================================================================

pub struct MonitoringSession<S: AcquisitionSource, C: AlarmCue> {
    sampler: SignalSampler<S>,
    monitor: AlarmMonitor<C>,
    context: SessionContext,
    frame_interval: Duration,
    progress_every: u64,
    stats: SessionStats,
    torn_down: bool,
}

impl<S: AcquisitionSource, C: AlarmCue> MonitoringSession<S, C> {
    /// Wait for the source to become ready and build the session.
    ///
    /// A source that fails to become ready is released and its error
    /// returned; the context reports the session as failed.
    pub async fn start(
        mut source: S,
        config: &MonitorConfig,
        context: SessionContext,
        cue: C,
    ) -> Result<Self, AcquisitionError> {
        let source_name = source.source_name().to_string();
        context.snapshot.send_modify(|s| {
            s.status = SessionStatus::Starting;
            s.source = source_name.clone();
        });

        info!(source = %source_name, "Waiting for acquisition source...");
        if let Err(e) = source.ready().await {
            error!(source = %source_name, error = %e, "Acquisition unavailable");
            source.release();
            context.set_status(SessionStatus::Failed { reason: e.to_string() });
            return Err(e);
        }

        let sampler = SignalSampler::new(source, config.sampler.epsilon);
        info!(
            source = %source_name,
            bins = sampler.frame_len(),
            threshold = %context.threshold.get(),
            "Acquisition ready"
        );

        Ok(Self {
            sampler,
            monitor: AlarmMonitor::new(config.monitor_settings(), cue),
            context,
            frame_interval: config.session.frame_interval(),
            progress_every: config.session.progress_every_ticks,
            stats: SessionStats::default(),
            torn_down: false,
        })
    }

    /// Receiver for the per-tick level reports.
    pub fn subscribe(&self) -> watch::Receiver<LevelReport> {
        self.context.subscribe_levels()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn monitor(&self) -> &AlarmMonitor<C> {
        &self.monitor
    }

    /// One synchronous tick: sample, evaluate, publish.
    pub fn tick(&mut self, now: std::time::Instant) -> Result<TickOutput, AcquisitionError> {
        let estimate = self.sampler.sample()?;
        let threshold = self.context.threshold.get();
        let output = self.monitor.tick(estimate, threshold, now);

        self.stats.record(&output);

        self.context
            .levels
            .send_replace(LevelReport::from_tick(&output, threshold, self.stats.ticks_processed));
        self.publish_stats();

        Ok(output)
    }

    /// Copy the cue's failure count into the stats and publish them.
    fn publish_stats(&mut self) {
        self.stats.cue_failures = self.monitor.cue().failures();
        let stats = &self.stats;
        self.context.snapshot.send_modify(|s| s.stats = stats.clone());
    }

    /// Tick until `cancel` fires (Ok) or acquisition fails (Err).
    ///
    /// Ticks never overlap; a tick that runs late skips the missed ones.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<SessionStats, AcquisitionError> {
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("🎙️  Monitoring volume from {}...", self.sampler.source_name());
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        self.stats.started_at = Some(Utc::now());
        self.context.set_status(SessionStatus::Monitoring);

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[MonitoringSession] Shutdown signal received");
                    break Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(tokio::time::Instant::now().into_std()) {
                        error!("[MonitoringSession] Acquisition failed: {}", e);
                        break Err(e);
                    }
                    self.log_progress();
                }
            }
        };

        // Playback finishes off the tick path; pick up failures since the last tick.
        self.publish_stats();
        self.teardown();
        self.log_final_stats();

        match outcome {
            Ok(()) => {
                self.context.set_status(SessionStatus::Stopped);
                Ok(self.stats.clone())
            }
            Err(e) => {
                self.context.set_status(SessionStatus::Failed { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Release acquisition and drop monitor state. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.sampler.release();
        self.monitor.reset();
        debug!("Session torn down, acquisition released");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn log_progress(&self) {
        let ticks = self.stats.ticks_processed;
        if self.progress_every == 0 || ticks % self.progress_every != 0 {
            return;
        }
        info!(
            "📈 Progress: {} ticks | Alarms: {} | Peak: {:.1} dB",
            ticks,
            self.stats.alarms_triggered,
            self.stats.peak_estimate_db.unwrap_or(0.0)
        );
    }

    fn log_final_stats(&self) {
        let stats = &self.stats;
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 FINAL STATISTICS");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("   Ticks Processed:   {}", stats.ticks_processed);
        info!("   Alarms Triggered:  {}", stats.alarms_triggered);
        info!("   Alarms Reset:      {}", stats.alarms_reset);
        match stats.peak_estimate_db {
            Some(peak) => info!("   Peak Estimate:     {:.1} dB", peak),
            None => info!("   Peak Estimate:     --"),
        }
        info!("   Cue Failures:      {}", stats.cue_failures);
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

impl<S: AcquisitionSource, C: AlarmCue> Drop for MonitoringSession<S, C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ReplaySource;
    use crate::types::Threshold;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    fn frames(values: &[u8]) -> Vec<Vec<u8>> {
        values.iter().map(|&v| vec![v; 4]).collect()
    }

    async fn session(
        values: &[u8],
        looping: bool,
        threshold: f64,
    ) -> MonitoringSession<ReplaySource, ()> {
        let context = SessionContext::new(ThresholdHandle::new(Threshold::try_from_db(threshold).unwrap()));
        let source = ReplaySource::from_frames(frames(values), looping);
        MonitoringSession::start(source, &MonitorConfig::default(), context, ())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_start_reports_failure() {
        let context = SessionContext::new(ThresholdHandle::default());
        let source = ReplaySource::from_frames(Vec::new(), false);
        let result = MonitoringSession::start(source, &MonitorConfig::default(), context.clone(), ()).await;

        assert!(matches!(result, Err(AcquisitionError::Unavailable(_))));
        assert!(matches!(context.latest_snapshot().status, SessionStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_tick_publishes_level_report() {
        let mut session = session(&[99], true, 35.0).await;
        let rx = session.subscribe();

        let out = session.tick(std::time::Instant::now()).unwrap();
        assert!((out.estimate - 40.0).abs() < 1e-9);
        assert!(out.alarm_active);

        let report = rx.borrow().clone();
        assert_eq!(report.ticks, 1);
        assert!(report.alarm_active);
        assert_eq!(report.threshold_db, 35.0);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let mut session = session(&[0], true, 25.0).await;
        session.tick(std::time::Instant::now()).unwrap();
        session.teardown();
        session.teardown();
        assert!(session.is_torn_down());
        assert_eq!(session.monitor().display_level(), None);
        assert!(matches!(session.tick(std::time::Instant::now()), Err(AcquisitionError::Released)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let mut session = session(&[0], true, 25.0).await;
        let context_rx = session.context.subscribe_snapshot();
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let stats = session.run(cancel).await.unwrap();
        assert!(stats.ticks_processed >= 6, "ticks = {}", stats.ticks_processed);
        assert_eq!(stats.alarms_triggered, 0);
        assert!(session.is_torn_down());
        assert_eq!(context_rx.borrow().status, SessionStatus::Stopped);
    }

    #[derive(Clone, Default)]
    struct LateFailureCue(Arc<AtomicU64>);

    impl AlarmCue for LateFailureCue {
        fn dispatch(&self) {}

        fn failures(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_stats_include_failures_after_last_tick() {
        let mut config = MonitorConfig::default();
        config.session.frame_interval_ms = 60_000;
        let context = SessionContext::new(ThresholdHandle::default());
        let cue = LateFailureCue::default();
        let mut session = MonitoringSession::start(
            ReplaySource::from_frames(frames(&[0]), true),
            &config,
            context.clone(),
            cue.clone(),
        )
        .await
        .unwrap();

        // Only the immediate first tick runs before the failure lands.
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let failures = Arc::clone(&cue.0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            failures.store(2, Ordering::SeqCst);
            stopper.cancel();
        });

        let stats = session.run(cancel).await.unwrap();
        assert_eq!(stats.ticks_processed, 1);
        assert_eq!(stats.cue_failures, 2);
        assert_eq!(context.latest_snapshot().stats.cue_failures, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fails_when_acquisition_ends() {
        let mut session = session(&[0, 0, 0], false, 25.0).await;
        let err = session.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Exhausted));
        assert_eq!(session.stats().ticks_processed, 3);
        assert!(session.is_torn_down());
    }
}
