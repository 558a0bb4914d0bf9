//! Fire-and-forget cue dispatch.
//!
//! The monitor sends a request over an unbounded channel; a player task picks
//! it up and runs the blocking sink on tokio's blocking pool. Playback errors
//! are logged and counted, never returned to the tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sink::ToneSink;
use super::tone::{square_wave, ToneSpec};
use super::{AlarmCue, CueError};

#[derive(Debug, Default)]
struct CueCounters {
    dispatched: AtomicU64,
    played: AtomicU64,
    failed: AtomicU64,
}

/// Handle the monitor holds to sound the alarm.
///
/// Cloning shares the player task. The task ends once every handle is dropped.
#[derive(Clone)]
pub struct CueDispatcher {
    tx: Option<mpsc::UnboundedSender<()>>,
    counters: Arc<CueCounters>,
}

impl CueDispatcher {
    /// Pre-render the tone and start the player task.
    pub fn spawn(sink: Arc<dyn ToneSink>, tone: ToneSpec) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(CueCounters::default());
        let samples: Arc<[f32]> = square_wave(&tone).into();

        let handle = tokio::spawn(run_player(rx, sink, samples, tone.sample_rate, Arc::clone(&counters)));

        (
            Self {
                tx: Some(tx),
                counters,
            },
            handle,
        )
    }

    /// A dispatcher that never plays anything (cue disabled in config).
    pub fn disabled() -> Self {
        Self {
            tx: None,
            counters: Arc::new(CueCounters::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Cues requested by the monitor.
    pub fn dispatched(&self) -> u64 {
        self.counters.dispatched.load(Ordering::Relaxed)
    }

    /// Cues the sink finished playing.
    pub fn played(&self) -> u64 {
        self.counters.played.load(Ordering::Relaxed)
    }
}

impl AlarmCue for CueDispatcher {
    fn dispatch(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        if tx.send(()).is_err() {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(error = %CueError::ChannelClosed, "Alarm cue dropped");
        }
    }

    fn failures(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}

async fn run_player(
    mut rx: mpsc::UnboundedReceiver<()>,
    sink: Arc<dyn ToneSink>,
    samples: Arc<[f32]>,
    sample_rate: u32,
    counters: Arc<CueCounters>,
) {
    debug!(sink = sink.name(), samples = samples.len(), "Cue player started");

    while rx.recv().await.is_some() {
        let sink = Arc::clone(&sink);
        let samples = Arc::clone(&samples);
        let result = tokio::task::spawn_blocking(move || sink.play(&samples, sample_rate)).await;

        match result {
            Ok(Ok(())) => {
                counters.played.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Alarm cue failed to play");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Alarm cue worker panicked");
            }
        }
    }

    debug!("Cue player stopped");
}
