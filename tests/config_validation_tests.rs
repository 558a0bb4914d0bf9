//! Config Validation Tests
//!
//! Typo detection and range validation for `volume_monitor.toml`, exercised
//! independently from the rest of the pipeline.

use volume_monitor::config::validation::{
    known_config_keys, suggest_correction, validate_ranges, validate_unknown_keys,
};
use volume_monitor::config::{ConfigError, MonitorConfig};
use volume_monitor::cue::SinkKind;
use volume_monitor::monitor::ResetPolicy;

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_threshold_warns_with_suggestion() {
    let toml_str = r#"
[monitor]
treshold_db = 45
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("treshold_db"));
    assert_eq!(warnings[0].suggestion.as_deref(), Some("monitor.threshold_db"));
}

#[test]
fn unknown_section_warns() {
    let toml_str = r#"
[histroy]
keep_days = 7
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 2, "section and key are both unknown");
    assert!(warnings.iter().any(|w| w.field == "histroy"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[sampler]
epsilon = 1.0

[monitor]
threshold_db = 45
smoothing = 0.8
reset_after_secs = 5
reset_policy = "extend"

[cue]
enabled = true
sink = "silent"
frequency_hz = 880.0
duration_ms = 250

[acquisition]
fft_size = 512

[session]
frame_interval_ms = 20

[server]
addr = "127.0.0.1:8080"
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());

    let config = MonitorConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.monitor.threshold_db, 45);
    assert_eq!(config.monitor.reset_policy, ResetPolicy::Extend);
    assert_eq!(config.cue.sink, SinkKind::Silent);
    assert_eq!(config.acquisition.fft_size, 512);
    assert_eq!(config.server.addr.as_deref(), Some("127.0.0.1:8080"));
}

#[test]
fn empty_toml_produces_zero_warnings() {
    assert!(validate_unknown_keys("").is_empty());
}

#[test]
fn known_keys_cover_every_section() {
    let keys = known_config_keys();
    for section in ["sampler", "monitor", "cue", "acquisition", "session", "server"] {
        assert!(keys.contains(section), "missing section {section}");
    }
    assert!(keys.contains("monitor.reset_policy"));
}

#[test]
fn suggest_correction_returns_none_for_garbage() {
    assert!(suggest_correction("zzzzzzzzzzzzzz", &known_config_keys()).is_none());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn all_defaults_pass_validation() {
    let (errors, warnings) = validate_ranges(&MonitorConfig::default());
    assert!(errors.is_empty(), "{errors:?}");
    assert!(warnings.is_empty());
}

#[test]
fn epsilon_below_one_is_error() {
    let err = MonitorConfig::from_toml_str("[sampler]\nepsilon = 0.0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(ref e) if e[0].contains("sampler.epsilon")));
}

#[test]
fn unselectable_threshold_is_error() {
    let err = MonitorConfig::from_toml_str("[monitor]\nthreshold_db = 42\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn smoothing_of_one_is_error() {
    // alpha = 1 would freeze the display level forever.
    let mut config = MonitorConfig::default();
    config.monitor.smoothing = 1.0;
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("monitor.smoothing")));
}

#[test]
fn zero_reset_window_is_error() {
    let mut config = MonitorConfig::default();
    config.monitor.reset_after_secs = 0;
    let (errors, _) = validate_ranges(&config);
    assert!(errors.iter().any(|e| e.contains("reset_after_secs")));
}

#[test]
fn long_cue_only_warns() {
    let mut config = MonitorConfig::default();
    config.cue.duration_ms = 8_000;
    let (errors, warnings) = validate_ranges(&config);
    assert!(errors.is_empty());
    assert!(warnings.iter().any(|w| w.field == "cue.duration_ms"));
}

#[test]
fn unknown_reset_policy_fails_to_parse() {
    let err = MonitorConfig::from_toml_str("[monitor]\nreset_policy = \"forever\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)));
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn config_roundtrip_preserves_values() {
    let mut config = MonitorConfig::default();
    config.monitor.threshold_db = 60;
    config.cue.enabled = false;

    let text = config.to_toml().unwrap();
    let parsed = MonitorConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.monitor.threshold_db, 60);
    assert!(!parsed.cue.enabled);
}
