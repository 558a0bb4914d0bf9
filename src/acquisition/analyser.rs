//! Byte-frequency analyser using rustfft
//!
//! Turns a block of mono PCM samples into `fft_size / 2` unsigned byte
//! magnitudes, one per frequency bin, the way a browser analyser node does:
//!
//! 1. Blackman window over the most recent `fft_size` samples
//! 2. Forward FFT, magnitude scaled by `1 / fft_size`
//! 3. Temporal smoothing against the previous spectrum
//! 4. Conversion to dB and linear mapping of `[min_db, max_db]` onto `0..=255`

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use super::AcquisitionError;
use crate::config::AcquisitionConfig;

/// Stateful PCM-to-bins analyser. Keeps the previous spectrum for smoothing.
pub struct ByteFrequencyAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    smoothed: Vec<f64>,
    scratch: Vec<Complex<f64>>,
    smoothing_time_constant: f64,
    min_db: f64,
    max_db: f64,
}

impl ByteFrequencyAnalyser {
    /// Build an analyser from the `[acquisition]` config section.
    pub fn new(config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || fft_size < 32 {
            return Err(AcquisitionError::Unavailable(format!(
                "analyser fft_size {fft_size} must be a power of two >= 32"
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing_time_constant: config.smoothing_time_constant,
            min_db: config.min_db,
            max_db: config.max_db,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Bins per frame: half the FFT size.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse `samples` into `out`.
    ///
    /// Uses the last `fft_size` samples; shorter blocks are zero-padded at the
    /// front. `out` must hold exactly `frequency_bin_count()` bytes.
    pub fn analyse(&mut self, samples: &[f32], out: &mut [u8]) -> Result<(), AcquisitionError> {
        super::check_frame_len(self.frequency_bin_count(), out)?;

        let tail = &samples[samples.len().saturating_sub(self.fft_size)..];
        let pad = self.fft_size - tail.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { f64::from(tail[i - pad]) };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f64;
        let tau = self.smoothing_time_constant;
        let range = self.max_db - self.min_db;

        for (k, byte) in out.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() * norm;
            let smoothed = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            // Keep the smoothing state finite even if a sample was NaN.
            self.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let db = 20.0 * self.smoothed[k].log10();
            let scaled = (255.0 / range) * (db - self.min_db);
            *byte = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }

        Ok(())
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

/// Classic Blackman window (alpha = 0.16).
fn blackman_window(n: usize) -> Vec<f64> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..n)
        .map(|i| {
            let x = i as f64 / n as f64;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser(fft_size: usize) -> ByteFrequencyAnalyser {
        ByteFrequencyAnalyser::new(&AcquisitionConfig {
            fft_size,
            ..AcquisitionConfig::default()
        })
        .unwrap()
    }

    fn sine(freq: f64, sample_rate: f64, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate).sin() as f32)
            .collect()
    }

    #[test]
    fn test_bin_count_is_half_fft_size() {
        assert_eq!(analyser(256).frequency_bin_count(), 128);
        assert_eq!(analyser(2048).frequency_bin_count(), 1024);
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let result = ByteFrequencyAnalyser::new(&AcquisitionConfig {
            fft_size: 300,
            ..AcquisitionConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut a = analyser(256);
        let mut out = vec![7u8; 128];
        a.analyse(&vec![0.0; 256], &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_in_its_bin() {
        // 25.6 kHz / 256 = 100 Hz per bin, so 3 kHz lands on bin 30.
        let mut a = analyser(256);
        let mut out = vec![0u8; 128];
        a.analyse(&sine(3_000.0, 25_600.0, 1.0, 256), &mut out).unwrap();

        assert_eq!(out[30], 255);
        assert!(out[100] < out[30]);
        let peak = out.iter().enumerate().max_by_key(|(_, &b)| b).map(|(i, _)| i);
        assert!(peak.is_some_and(|i| (28..=32).contains(&i)));
    }

    #[test]
    fn test_short_block_is_zero_padded() {
        let mut a = analyser(256);
        let mut out = vec![0u8; 128];
        assert!(a.analyse(&sine(3_000.0, 25_600.0, 0.5, 64), &mut out).is_ok());
        assert!(out.iter().any(|&b| b > 0));
    }

    #[test]
    fn test_wrong_output_length_rejected() {
        let mut a = analyser(256);
        let mut out = vec![0u8; 64];
        assert!(matches!(
            a.analyse(&[0.0; 256], &mut out),
            Err(AcquisitionError::FrameLength { expected: 128, actual: 64 })
        ));
    }

    #[test]
    fn test_smoothing_decays_after_signal_stops() {
        let mut a = analyser(256);
        let mut loud = vec![0u8; 128];
        let mut after = vec![0u8; 128];
        a.analyse(&sine(3_000.0, 25_600.0, 1.0, 256), &mut loud).unwrap();
        a.analyse(&vec![0.0; 256], &mut after).unwrap();
        // Previous spectrum still contributes, but less.
        assert!(after[30] > 0);
        assert!(after[30] <= loud[30]);

        a.reset();
        a.analyse(&vec![0.0; 256], &mut after).unwrap();
        assert_eq!(after[30], 0);
    }
}
