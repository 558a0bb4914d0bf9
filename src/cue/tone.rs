//! Alarm tone synthesis.

use crate::config::defaults::{CUE_AMPLITUDE, CUE_DURATION_MS, CUE_FREQUENCY_HZ, CUE_SAMPLE_RATE};

/// Fixed-frequency tone played when the alarm is raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub frequency_hz: f64,
    pub duration_ms: u64,
    pub sample_rate: u32,
    /// Peak amplitude in `(0, 1]`.
    pub amplitude: f32,
}

impl Default for ToneSpec {
    fn default() -> Self {
        Self {
            frequency_hz: CUE_FREQUENCY_HZ,
            duration_ms: CUE_DURATION_MS,
            sample_rate: CUE_SAMPLE_RATE,
            amplitude: CUE_AMPLITUDE,
        }
    }
}

impl ToneSpec {
    /// Number of mono samples in the tone.
    pub fn sample_count(&self) -> usize {
        (u64::from(self.sample_rate) * self.duration_ms / 1000) as usize
    }
}

/// Render the tone as a mono square wave.
///
/// The first half of every period is `+amplitude`, the second `-amplitude`.
pub fn square_wave(tone: &ToneSpec) -> Vec<f32> {
    let rate = f64::from(tone.sample_rate);
    if rate <= 0.0 || tone.frequency_hz <= 0.0 {
        return Vec::new();
    }

    (0..tone.sample_count())
        .map(|n| {
            let cycles = n as f64 * tone.frequency_hz / rate;
            if cycles.fract() < 0.5 {
                tone.amplitude
            } else {
                -tone.amplitude
            }
        })
        .collect()
}
