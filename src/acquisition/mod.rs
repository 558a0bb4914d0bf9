//! Sound acquisition module
//!
//! Everything that produces amplitude frames for the sampler: the
//! [`AcquisitionSource`] trait, the byte-frequency analyser that turns PCM
//! blocks into `u8` magnitude bins, and the concrete sources (synthetic
//! generator, frame replay, live microphone).

pub mod analyser;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod replay;
pub mod synthetic;

pub use analyser::ByteFrequencyAnalyser;
#[cfg(feature = "microphone")]
pub use microphone::MicrophoneSource;
pub use replay::ReplaySource;
pub use synthetic::{Scenario, SyntheticSource};

use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failures of the acquisition subsystem.
///
/// All of them are fatal to a monitoring session: the sampler propagates them
/// and the session ends. Retrying is up to whoever starts the next session.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Acquisition unavailable: {0}")]
    Unavailable(String),

    #[error("Permission to record audio was denied: {0}")]
    PermissionDenied(String),

    #[error("No audio input device found")]
    DeviceMissing,

    #[error("Source read before it reported ready")]
    NotReady,

    #[error("Source has been released")]
    Released,

    #[error("Frame length mismatch: expected {expected} bins, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    #[error("Source exhausted")]
    Exhausted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

// ============================================================================
// Source Trait
// ============================================================================

/// Anything that can hand the sampler one frame of frequency-bin magnitudes
/// per tick.
///
/// Lifecycle: `ready()` resolves once the source can serve frames (device
/// opened, file parsed). From then on `bin_count()` is fixed and every
/// `read_frame()` fills exactly that many bins. `release()` frees the
/// underlying resources and may be called more than once.
#[async_trait]
pub trait AcquisitionSource: Send + 'static {
    /// Wait until frames can be read.
    async fn ready(&mut self) -> Result<(), AcquisitionError>;

    /// Number of bins per frame. Only meaningful after `ready()`.
    fn bin_count(&self) -> usize;

    /// Overwrite `frame` with the current magnitudes.
    fn read_frame(&mut self, frame: &mut [u8]) -> Result<(), AcquisitionError>;

    /// Release device handles. Idempotent.
    fn release(&mut self);

    /// Human-readable name for logging (e.g. "synthetic", "replay").
    fn source_name(&self) -> &str;
}

#[async_trait]
impl AcquisitionSource for Box<dyn AcquisitionSource> {
    async fn ready(&mut self) -> Result<(), AcquisitionError> {
        (**self).ready().await
    }

    fn bin_count(&self) -> usize {
        (**self).bin_count()
    }

    fn read_frame(&mut self, frame: &mut [u8]) -> Result<(), AcquisitionError> {
        (**self).read_frame(frame)
    }

    fn release(&mut self) {
        (**self).release();
    }

    fn source_name(&self) -> &str {
        (**self).source_name()
    }
}

/// Check that a caller's buffer matches the source's bin count.
pub(crate) fn check_frame_len(expected: usize, frame: &[u8]) -> Result<(), AcquisitionError> {
    if frame.len() == expected {
        Ok(())
    } else {
        Err(AcquisitionError::FrameLength {
            expected,
            actual: frame.len(),
        })
    }
}
