//! Synthetic sound source for demos, CI, and machines without a microphone.
//!
//! Generates PCM blocks (background noise plus an optional 440 Hz hum) whose
//! loudness follows a [`Scenario`], then runs them through the
//! [`ByteFrequencyAnalyser`] like a live capture would.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{AcquisitionError, AcquisitionSource, ByteFrequencyAnalyser};
use crate::config::AcquisitionConfig;

/// Noise level of a quiet room (PCM standard deviation).
const QUIET_NOISE: f64 = 0.000_5;

/// Noise level of a loud room (PCM standard deviation).
const LOUD_NOISE: f64 = 0.2;

/// Burst scenario: loud for this many frames...
const BURST_LOUD_FRAMES: u64 = 90;

/// ...out of every this many frames.
const BURST_PERIOD_FRAMES: u64 = 600;

/// Loudness profile of the synthetic source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Constant low background noise; never crosses the default threshold.
    Quiet,
    /// Constant loud noise; triggers the alarm on the first tick.
    Loud,
    /// Quiet background with a short loud burst every ~10 s at 60 fps.
    #[default]
    Bursts,
}

impl Scenario {
    /// Noise level for the given frame index.
    fn noise_level(self, frame_index: u64) -> f64 {
        match self {
            Self::Quiet => QUIET_NOISE,
            Self::Loud => LOUD_NOISE,
            Self::Bursts => {
                if frame_index % BURST_PERIOD_FRAMES < BURST_LOUD_FRAMES {
                    LOUD_NOISE
                } else {
                    QUIET_NOISE
                }
            }
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quiet => write!(f, "quiet"),
            Self::Loud => write!(f, "loud"),
            Self::Bursts => write!(f, "bursts"),
        }
    }
}

/// PCM generator feeding a byte-frequency analyser.
pub struct SyntheticSource {
    scenario: Scenario,
    analyser: ByteFrequencyAnalyser,
    sample_rate: f64,
    rng: StdRng,
    block: Vec<f32>,
    frame_index: u64,
    phase: f64,
    ready: bool,
    released: bool,
}

impl SyntheticSource {
    pub fn new(scenario: Scenario, config: &AcquisitionConfig) -> Result<Self, AcquisitionError> {
        Self::with_rng(scenario, config, StdRng::from_entropy())
    }

    /// Deterministic source for tests and reproducible demos.
    pub fn with_seed(
        scenario: Scenario,
        config: &AcquisitionConfig,
        seed: u64,
    ) -> Result<Self, AcquisitionError> {
        Self::with_rng(scenario, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        scenario: Scenario,
        config: &AcquisitionConfig,
        rng: StdRng,
    ) -> Result<Self, AcquisitionError> {
        let analyser = ByteFrequencyAnalyser::new(config)?;
        let block = vec![0.0; analyser.fft_size()];
        Ok(Self {
            scenario,
            analyser,
            sample_rate: f64::from(config.sample_rate),
            rng,
            block,
            frame_index: 0,
            phase: 0.0,
            ready: false,
            released: false,
        })
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    fn fill_block(&mut self) -> Result<(), AcquisitionError> {
        let sigma = self.scenario.noise_level(self.frame_index);
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| AcquisitionError::Unavailable(format!("noise generator: {e}")))?;
        let step = 2.0 * PI * 440.0 / self.sample_rate;

        for sample in &mut self.block {
            let hum = sigma * 0.5 * self.phase.sin();
            self.phase = (self.phase + step) % (2.0 * PI);
            *sample = (noise.sample(&mut self.rng) + hum) as f32;
        }
        Ok(())
    }
}

#[async_trait]
impl AcquisitionSource for SyntheticSource {
    async fn ready(&mut self) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        self.ready = true;
        tracing::debug!(scenario = %self.scenario, "Synthetic source ready");
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn read_frame(&mut self, frame: &mut [u8]) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        if !self.ready {
            return Err(AcquisitionError::NotReady);
        }
        self.fill_block()?;
        self.analyser.analyse(&self.block, frame)?;
        self.frame_index += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
