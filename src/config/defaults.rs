//! System-wide default constants.
//!
//! Centralises the numbers the sampler, alarm monitor, cue and session share.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Sampler
// ============================================================================

/// Offset added to the mean magnitude before taking the logarithm.
///
/// Must stay `>= 1.0` so an all-zero frame yields `0.0 dB` instead of `-inf`.
pub const DECIBEL_EPSILON: f64 = 1.0;

/// Scale factor of the amplitude-to-decibel conversion.
pub const DECIBEL_SCALE: f64 = 20.0;

// ============================================================================
// Analyser
// ============================================================================

/// FFT window length of the byte-frequency analyser. Yields 128 bins.
pub const ANALYSER_FFT_SIZE: usize = 256;

/// Temporal smoothing applied between consecutive analyser spectra.
pub const ANALYSER_SMOOTHING_TIME_CONSTANT: f64 = 0.8;

/// Decibel value mapped to byte magnitude 0.
pub const ANALYSER_MIN_DB: f64 = -100.0;

/// Decibel value mapped to byte magnitude 255.
pub const ANALYSER_MAX_DB: f64 = -30.0;

/// Capture sample rate used by the synthetic and microphone sources (Hz).
pub const CAPTURE_SAMPLE_RATE: u32 = 44_100;

// ============================================================================
// Alarm Monitor
// ============================================================================

/// Weight of the previous display level in the exponential smoother.
///
/// `display' = display * 0.8 + estimate * 0.2`
pub const DISPLAY_SMOOTHING: f64 = 0.8;

/// Time an alarm stays latched before auto-clearing (seconds).
pub const ALARM_RESET_SECS: u64 = 5;

/// Threshold in force when nothing else is configured (dB).
pub const DEFAULT_THRESHOLD_DB: u8 = 25;

/// Threshold values the presentation layer may select (dB).
pub const SELECTABLE_THRESHOLDS_DB: [u8; 11] = [20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70];

// ============================================================================
// Alarm Cue
// ============================================================================

/// Cue tone frequency (Hz).
pub const CUE_FREQUENCY_HZ: f64 = 440.0;

/// Cue tone length (milliseconds).
pub const CUE_DURATION_MS: u64 = 500;

/// Cue synthesis sample rate (Hz).
pub const CUE_SAMPLE_RATE: u32 = 44_100;

/// Peak amplitude of the square wave, in `[0, 1]`.
pub const CUE_AMPLITUDE: f32 = 0.25;

// ============================================================================
// Session
// ============================================================================

/// Scheduling period of the tick loop (milliseconds). ~60 Hz display refresh.
pub const FRAME_INTERVAL_MS: u64 = 16;

/// Interval between readable status lines (milliseconds).
pub const REPORT_INTERVAL_MS: u64 = 500;

/// Ticks between progress log lines.
pub const PROGRESS_LOG_EVERY_TICKS: u64 = 600;

// ============================================================================
// Config Watcher
// ============================================================================

/// Interval between config file mtime checks (milliseconds).
pub const CONFIG_POLL_INTERVAL_MS: u64 = 2_000;

/// Debounce delay after detecting a config change (milliseconds).
pub const CONFIG_DEBOUNCE_MS: u64 = 500;
