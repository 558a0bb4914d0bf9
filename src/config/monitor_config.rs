//! Monitor Configuration - sampler, alarm, cue and session settings as TOML values
//!
//! Every section implements `Default` with the values from [`super::defaults`],
//! so a missing or empty config file behaves exactly like the built-in setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use crate::cue::{SinkKind, ToneSpec};
use crate::monitor::{MonitorSettings, ResetPolicy};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "VOLMON_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "volume_monitor.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a monitoring deployment.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. an explicit path
/// 2. `$VOLMON_CONFIG`
/// 3. `./volume_monitor.toml`
/// 4. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Decibel conversion
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Smoothing, threshold and alarm timing
    #[serde(default)]
    pub monitor: AlarmConfig,

    /// Alarm tone
    #[serde(default)]
    pub cue: CueConfig,

    /// Byte-frequency analyser used by PCM sources
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Tick loop and reporting cadence
    #[serde(default)]
    pub session: SessionConfig,

    /// Optional HTTP status API
    #[serde(default)]
    pub server: ServerConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order.
    ///
    /// A file that fails to parse or validate is skipped with a warning and
    /// the next candidate is tried.
    pub fn load(explicit: Option<&Path>) -> Self {
        for (path, origin) in candidate_paths(explicit) {
            if !path.exists() {
                if origin != ConfigOrigin::WorkingDirectory {
                    warn!(path = %path.display(), origin = %origin, "Config path does not exist, falling back");
                }
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!(path = %path.display(), origin = %origin, "Loaded monitor config");
                    return config;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load config, falling back");
                }
            }
        }

        info!("No volume_monitor.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys only produce warnings; range violations are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate every section.
    ///
    /// Range errors fail the whole config; suspicious values are logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_ranges(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Settings consumed by the alarm monitor.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            smoothing: self.monitor.smoothing,
            reset_after: self.monitor.reset_after(),
            reset_policy: self.monitor.reset_policy,
        }
    }

    /// Tone synthesised for the alarm cue.
    pub fn tone_spec(&self) -> ToneSpec {
        ToneSpec {
            frequency_hz: self.cue.frequency_hz,
            duration_ms: self.cue.duration_ms,
            sample_rate: self.cue.sample_rate,
            amplitude: self.cue.amplitude,
        }
    }
}

/// Where a config candidate came from, for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigOrigin {
    CommandLine,
    Environment,
    WorkingDirectory,
}

impl std::fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CommandLine => write!(f, "--config"),
            Self::Environment => write!(f, "{CONFIG_ENV_VAR}"),
            Self::WorkingDirectory => write!(f, "./{LOCAL_CONFIG_FILE}"),
        }
    }
}

fn candidate_paths(explicit: Option<&Path>) -> Vec<(PathBuf, ConfigOrigin)> {
    let mut paths = Vec::with_capacity(3);
    if let Some(p) = explicit {
        paths.push((p.to_path_buf(), ConfigOrigin::CommandLine));
    }
    if let Ok(p) = std::env::var(CONFIG_ENV_VAR) {
        paths.push((PathBuf::from(p), ConfigOrigin::Environment));
    }
    paths.push((PathBuf::from(LOCAL_CONFIG_FILE), ConfigOrigin::WorkingDirectory));
    paths
}

/// The first existing config file in the search order, if any.
///
/// Used by the hot-reload watcher to know which file to poll.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    candidate_paths(explicit)
        .into_iter()
        .map(|(p, _)| p)
        .find(|p| p.exists())
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from loading or validating the config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sampler
// ============================================================================

/// Decibel conversion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Offset added to the mean magnitude before `log10`. Must be >= 1.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_epsilon() -> f64 { defaults::DECIBEL_EPSILON }

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { epsilon: default_epsilon() }
    }
}

// ============================================================================
// Alarm Monitor
// ============================================================================

/// Smoothing, threshold and alarm timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    /// Initial threshold in dB; must be one of the selectable values.
    #[serde(default = "default_threshold_db")]
    pub threshold_db: u8,

    /// Weight of the previous display level, in `[0, 1)`.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    /// Seconds an alarm stays latched before it auto-clears.
    #[serde(default = "default_reset_after_secs")]
    pub reset_after_secs: u64,

    /// `fixed` (always clear after the window) or `extend` (re-arm while loud).
    #[serde(default)]
    pub reset_policy: ResetPolicy,
}

fn default_threshold_db() -> u8 { defaults::DEFAULT_THRESHOLD_DB }
fn default_smoothing() -> f64 { defaults::DISPLAY_SMOOTHING }
fn default_reset_after_secs() -> u64 { defaults::ALARM_RESET_SECS }

impl AlarmConfig {
    pub fn reset_after(&self) -> Duration {
        Duration::from_secs(self.reset_after_secs)
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_threshold_db(),
            smoothing: default_smoothing(),
            reset_after_secs: default_reset_after_secs(),
            reset_policy: ResetPolicy::default(),
        }
    }
}

// ============================================================================
// Alarm Cue
// ============================================================================

/// Alarm tone settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CueConfig {
    /// Play a cue at all.
    #[serde(default = "default_cue_enabled")]
    pub enabled: bool,

    /// Output for the synthesised tone.
    #[serde(default)]
    pub sink: SinkKind,

    #[serde(default = "default_cue_frequency")]
    pub frequency_hz: f64,

    #[serde(default = "default_cue_duration")]
    pub duration_ms: u64,

    #[serde(default = "default_cue_sample_rate")]
    pub sample_rate: u32,

    /// Peak amplitude in `(0, 1]`.
    #[serde(default = "default_cue_amplitude")]
    pub amplitude: f32,
}

fn default_cue_enabled() -> bool { true }
fn default_cue_frequency() -> f64 { defaults::CUE_FREQUENCY_HZ }
fn default_cue_duration() -> u64 { defaults::CUE_DURATION_MS }
fn default_cue_sample_rate() -> u32 { defaults::CUE_SAMPLE_RATE }
fn default_cue_amplitude() -> f32 { defaults::CUE_AMPLITUDE }

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            enabled: default_cue_enabled(),
            sink: SinkKind::default(),
            frequency_hz: default_cue_frequency(),
            duration_ms: default_cue_duration(),
            sample_rate: default_cue_sample_rate(),
            amplitude: default_cue_amplitude(),
        }
    }
}

// ============================================================================
// Acquisition
// ============================================================================

/// Byte-frequency analyser settings for PCM-based sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// FFT window, a power of two. Frames carry `fft_size / 2` bins.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_analyser_smoothing")]
    pub smoothing_time_constant: f64,

    #[serde(default = "default_min_db")]
    pub min_db: f64,

    #[serde(default = "default_max_db")]
    pub max_db: f64,
}

fn default_fft_size() -> usize { defaults::ANALYSER_FFT_SIZE }
fn default_sample_rate() -> u32 { defaults::CAPTURE_SAMPLE_RATE }
fn default_analyser_smoothing() -> f64 { defaults::ANALYSER_SMOOTHING_TIME_CONSTANT }
fn default_min_db() -> f64 { defaults::ANALYSER_MIN_DB }
fn default_max_db() -> f64 { defaults::ANALYSER_MAX_DB }

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            sample_rate: default_sample_rate(),
            smoothing_time_constant: default_analyser_smoothing(),
            min_db: default_min_db(),
            max_db: default_max_db(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Tick loop and reporting cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    #[serde(default = "default_progress_every_ticks")]
    pub progress_every_ticks: u64,
}

fn default_frame_interval_ms() -> u64 { defaults::FRAME_INTERVAL_MS }
fn default_report_interval_ms() -> u64 { defaults::REPORT_INTERVAL_MS }
fn default_progress_every_ticks() -> u64 { defaults::PROGRESS_LOG_EVERY_TICKS }

impl SessionConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            progress_every_ticks: default_progress_every_ticks(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP status API. Disabled unless an address is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub addr: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: MonitorConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.sampler.epsilon, 1.0);
        assert_eq!(config.monitor.threshold_db, 25);
        assert_eq!(config.monitor.smoothing, 0.8);
        assert_eq!(config.monitor.reset_after_secs, 5);
        assert_eq!(config.monitor.reset_policy, ResetPolicy::Fixed);
        assert_eq!(config.acquisition.fft_size, 256);
        assert!(config.server.addr.is_none());
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[monitor]
threshold_db = 45
reset_policy = "extend"

[cue]
sink = "silent"
"#;
        let config = MonitorConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        assert_eq!(config.monitor.threshold_db, 45);
        assert_eq!(config.monitor.reset_policy, ResetPolicy::Extend);
        assert_eq!(config.cue.sink, SinkKind::Silent);
        // Non-overridden values retain defaults
        assert_eq!(config.monitor.reset_after_secs, 5);
        assert_eq!(config.cue.frequency_hz, 440.0);
    }

    #[test]
    fn test_validation_rejects_small_epsilon() {
        let mut config = MonitorConfig::default();
        config.sampler.epsilon = 0.5;
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("sampler.epsilon")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_rejects_unselectable_threshold() {
        let toml_str = "[monitor]\nthreshold_db = 42\n";
        let result = MonitorConfig::from_toml_str(toml_str);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_roundtrip_toml() {
        let original = MonitorConfig::default();
        let toml_str = original.to_toml().expect("serialization should work");
        let roundtripped = MonitorConfig::from_toml_str(&toml_str).expect("deserialization should work");
        assert_eq!(original.monitor.threshold_db, roundtripped.monitor.threshold_db);
        assert_eq!(original.cue.duration_ms, roundtripped.cue.duration_ms);
    }

    #[test]
    fn test_monitor_settings_mirror_config() {
        let mut config = MonitorConfig::default();
        config.monitor.reset_after_secs = 9;
        let settings = config.monitor_settings();
        assert_eq!(settings.reset_after, Duration::from_secs(9));
        assert_eq!(settings.smoothing, 0.8);
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let result = MonitorConfig::load_from_file(Path::new("/nonexistent/volume_monitor.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }
}
