//! Tone outputs.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;

use super::CueError;

/// Which output plays the alarm tone.
///
/// Defaults to [`SinkKind::Device`] when audio output is compiled in and to
/// [`SinkKind::Bell`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// ASCII BEL on stderr. Fallback for builds without audio output: the
    /// rendered square wave is not played and the terminal decides how the
    /// bell sounds.
    Bell,
    /// Log the cue without sound.
    Silent,
    /// Default audio output device (requires the `microphone` feature).
    Device,
}

impl Default for SinkKind {
    fn default() -> Self {
        if cfg!(feature = "microphone") {
            Self::Device
        } else {
            Self::Bell
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bell => write!(f, "bell"),
            Self::Silent => write!(f, "silent"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// Blocking tone playback. Called from a blocking worker, never from a tick.
pub trait ToneSink: Send + Sync + 'static {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), CueError>;

    fn name(&self) -> &'static str;
}

/// Rings the terminal bell instead of playing the tone.
///
/// The samples are ignored; use [`SinkKind::Device`] to hear the actual
/// square wave.
pub struct TerminalBellSink;

impl ToneSink for TerminalBellSink {
    fn play(&self, _samples: &[f32], _sample_rate: u32) -> Result<(), CueError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "bell"
    }
}

pub struct SilentSink;

impl ToneSink for SilentSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), CueError> {
        tracing::debug!(samples = samples.len(), sample_rate, "Silent cue");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "silent"
    }
}

/// Build the sink for `kind`.
///
/// `Device` without audio support compiled in falls back to the bell.
pub fn build_sink(kind: SinkKind) -> Arc<dyn ToneSink> {
    match kind {
        SinkKind::Bell => Arc::new(TerminalBellSink),
        SinkKind::Silent => Arc::new(SilentSink),
        #[cfg(feature = "microphone")]
        SinkKind::Device => Arc::new(device::DeviceSink),
        #[cfg(not(feature = "microphone"))]
        SinkKind::Device => {
            tracing::warn!("Built without the `microphone` feature, using the terminal bell for the cue");
            Arc::new(TerminalBellSink)
        }
    }
}

#[cfg(feature = "microphone")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{CueError, ToneSink};

    /// Plays the tone on the default output device.
    ///
    /// The stream is opened per cue and dropped once the tone finished, so the
    /// device is only held while the alarm sounds.
    pub struct DeviceSink;

    impl ToneSink for DeviceSink {
        fn play(&self, samples: &[f32], sample_rate: u32) -> Result<(), CueError> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| CueError::DeviceBusy("no default output device".to_string()))?;

            let channels = device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(1)
                .max(1);
            let config = cpal::StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let tone: Arc<[f32]> = Arc::from(samples);
            let cursor = Arc::new(Mutex::new(0usize));
            let frame_width = usize::from(channels);

            let stream = device
                .build_output_stream(
                    &config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let Ok(mut pos) = cursor.lock() else {
                            out.fill(0.0);
                            return;
                        };
                        for frame in out.chunks_mut(frame_width) {
                            let value = tone.get(*pos).copied().unwrap_or(0.0);
                            frame.fill(value);
                            *pos += 1;
                        }
                    },
                    |err| tracing::warn!(error = %err, "Cue output stream error"),
                    None,
                )
                .map_err(|e| match e {
                    cpal::BuildStreamError::DeviceNotAvailable => CueError::DeviceBusy(e.to_string()),
                    other => CueError::Stream(other.to_string()),
                })?;

            stream.play().map_err(|e| CueError::Stream(e.to_string()))?;

            let millis = samples.len() as u64 * 1000 / u64::from(sample_rate.max(1));
            std::thread::sleep(Duration::from_millis(millis));
            drop(stream);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "device"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_kind_serde_names() {
        let kind: SinkKind = toml::from_str::<toml::Value>("k = \"silent\"")
            .unwrap()
            .get("k")
            .cloned()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(kind, SinkKind::Silent);
        assert_eq!(serde_json::to_string(&SinkKind::Bell).unwrap(), "\"bell\"");
    }

    #[test]
    fn test_silent_sink_always_succeeds() {
        assert!(SilentSink.play(&[0.1, -0.1], 44_100).is_ok());
        assert_eq!(build_sink(SinkKind::Silent).name(), "silent");
    }

    #[cfg(not(feature = "microphone"))]
    #[test]
    fn test_device_falls_back_to_bell_without_audio_support() {
        assert_eq!(build_sink(SinkKind::Device).name(), "bell");
        assert_eq!(SinkKind::default(), SinkKind::Bell);
    }

    #[cfg(feature = "microphone")]
    #[test]
    fn test_default_sink_plays_the_rendered_tone() {
        assert_eq!(SinkKind::default(), SinkKind::Device);
        assert_eq!(build_sink(SinkKind::default()).name(), "device");
    }
}
