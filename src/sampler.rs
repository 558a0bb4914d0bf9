//! Signal sampler: one decibel estimate per tick.
//!
//! Reads the acquisition source's current amplitude frame into a buffer
//! allocated once per session, averages the bins and converts the mean to
//! decibels:
//!
//! ```text
//! estimate = 20 * log10(mean + epsilon)
//! ```
//!
//! With `epsilon >= 1` the result is finite and non-negative for every frame,
//! including an all-zero one (`20 * log10(1) = 0 dB`).

use crate::acquisition::{AcquisitionError, AcquisitionSource};
use crate::config::defaults::DECIBEL_SCALE;

/// Arithmetic mean of the bin magnitudes. An empty frame averages to 0.
pub fn mean_magnitude(frame: &[u8]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: u64 = frame.iter().map(|&b| u64::from(b)).sum();
    sum as f64 / frame.len() as f64
}

/// Decibel estimate of one frame.
pub fn decibel_estimate(frame: &[u8], epsilon: f64) -> f64 {
    DECIBEL_SCALE * (mean_magnitude(frame) + epsilon).log10()
}

/// Pulls frames from an acquisition source and converts them to decibels.
///
/// Construct only after the source reported ready: the frame length is taken
/// from the source at construction and never changes afterwards.
pub struct SignalSampler<S: AcquisitionSource> {
    source: S,
    frame: Vec<u8>,
    epsilon: f64,
}

impl<S: AcquisitionSource> SignalSampler<S> {
    pub fn new(source: S, epsilon: f64) -> Self {
        let frame = vec![0; source.bin_count()];
        Self { source, frame, epsilon }
    }

    /// Read the current frame and return its decibel estimate.
    ///
    /// Acquisition errors are returned as-is; there is no retry.
    pub fn sample(&mut self) -> Result<f64, AcquisitionError> {
        self.source.read_frame(&mut self.frame)?;
        Ok(decibel_estimate(&self.frame, self.epsilon))
    }

    /// Bins per frame for this session.
    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Release the underlying source. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.source.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::ReplaySource;

    #[test]
    fn test_all_zero_frame_is_zero_db() {
        assert_eq!(decibel_estimate(&[0, 0, 0, 0], 1.0), 0.0);
    }

    #[test]
    fn test_mean_99_is_40_db() {
        let estimate = decibel_estimate(&[99, 99, 99, 99], 1.0);
        assert!((estimate - 40.0).abs() < 1e-9, "got {estimate}");
    }

    #[test]
    fn test_mixed_frame_uses_arithmetic_mean() {
        // mean = (0 + 198) / 2 = 99
        let estimate = decibel_estimate(&[0, 198], 1.0);
        assert!((estimate - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_frame_is_finite() {
        assert_eq!(mean_magnitude(&[]), 0.0);
        assert_eq!(decibel_estimate(&[], 1.0), 0.0);
    }

    #[test]
    fn test_estimate_always_finite_and_non_negative() {
        // Sweep constant frames across the whole byte range and a few lengths.
        for len in [1usize, 4, 128, 1024] {
            for value in 0..=255u8 {
                let frame = vec![value; len];
                let e = decibel_estimate(&frame, 1.0);
                assert!(e.is_finite(), "len={len} value={value} gave {e}");
                assert!(e >= 0.0, "len={len} value={value} gave {e}");
            }
        }
    }

    #[test]
    fn test_maximum_frame_bound() {
        let e = decibel_estimate(&[255; 128], 1.0);
        assert!((e - 20.0 * 256f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn test_monotonic_in_magnitudes() {
        let mut frame = vec![3u8, 0, 17, 200, 42, 0, 0, 9];
        let mut previous = decibel_estimate(&frame, 1.0);
        for step in 0..40 {
            for (i, bin) in frame.iter_mut().enumerate() {
                // Bump a varying subset of bins each round; never decrease.
                if (i + step) % 3 != 0 {
                    *bin = bin.saturating_add(7);
                }
            }
            let next = decibel_estimate(&frame, 1.0);
            assert!(next >= previous, "step {step}: {next} < {previous}");
            previous = next;
        }
    }

    #[test]
    fn test_larger_epsilon_raises_floor() {
        assert!(decibel_estimate(&[0; 8], 10.0) > decibel_estimate(&[0; 8], 1.0));
    }

    #[tokio::test]
    async fn test_sampler_reads_source_frames() {
        let mut source = ReplaySource::from_frames(vec![vec![0; 4], vec![99; 4]], false);
        source.ready().await.unwrap();

        let mut sampler = SignalSampler::new(source, 1.0);
        assert_eq!(sampler.frame_len(), 4);
        assert_eq!(sampler.sample().unwrap(), 0.0);
        assert!((sampler.sample().unwrap() - 40.0).abs() < 1e-9);
        assert!(matches!(sampler.sample(), Err(AcquisitionError::Exhausted)));
    }

    #[tokio::test]
    async fn test_sampler_propagates_release() {
        let mut source = ReplaySource::from_frames(vec![vec![1; 2]], true);
        source.ready().await.unwrap();
        let mut sampler = SignalSampler::new(source, 1.0);
        sampler.release();
        sampler.release();
        assert!(matches!(sampler.sample(), Err(AcquisitionError::Released)));
    }
}
