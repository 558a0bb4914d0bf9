//! Audible alarm cue.
//!
//! The monitor only sees [`AlarmCue::dispatch`], which must return at once.
//! [`CueDispatcher`] renders the tone once and plays it off the tick path.

mod dispatcher;
pub mod sink;
pub mod tone;

pub use dispatcher::CueDispatcher;
pub use sink::{build_sink, SilentSink, SinkKind, TerminalBellSink, ToneSink};
pub use tone::{square_wave, ToneSpec};

use thiserror::Error;

/// Side effect fired on the Idle -> Active transition.
///
/// Implementations must not block and must not fail the caller.
pub trait AlarmCue: Send {
    fn dispatch(&self);

    /// Cues that were requested but did not sound.
    fn failures(&self) -> u64 {
        0
    }
}

/// No cue at all.
impl AlarmCue for () {
    fn dispatch(&self) {}
}

#[derive(Debug, Error)]
pub enum CueError {
    #[error("audio device busy: {0}")]
    DeviceBusy(String),

    #[error("cue output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("cue player is not running")]
    ChannelClosed,
}
