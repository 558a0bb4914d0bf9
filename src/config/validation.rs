//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization and range checks. Unknown keys never break a config.

use std::collections::HashSet;

use super::defaults::SELECTABLE_THRESHOLDS_DB;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `MonitorConfig`.
///
/// Maintained by hand to match the structs in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [sampler]
        "sampler",
        "sampler.epsilon",
        // [monitor]
        "monitor",
        "monitor.threshold_db",
        "monitor.smoothing",
        "monitor.reset_after_secs",
        "monitor.reset_policy",
        // [cue]
        "cue",
        "cue.enabled",
        "cue.sink",
        "cue.frequency_hz",
        "cue.duration_ms",
        "cue.sample_rate",
        "cue.amplitude",
        // [acquisition]
        "acquisition",
        "acquisition.fft_size",
        "acquisition.sample_rate",
        "acquisition.smoothing_time_constant",
        "acquisition.min_db",
        "acquisition.max_db",
        // [session]
        "session",
        "session.frame_interval_ms",
        "session.report_interval_ms",
        "session.progress_every_ticks",
        // [server]
        "server",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (*k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by(|(ka, da), (kb, db)| da.cmp(db).then_with(|| ka.cmp(kb)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Parse errors are left to serde, so a malformed document yields no warnings.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed `MonitorConfig`.
///
/// Returns (errors, warnings): errors are values the pipeline cannot run
/// with; warnings are legal but probably unintended.
pub fn validate_ranges(config: &super::MonitorConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // A smaller offset lets an all-zero frame reach log10(0) = -inf.
    let eps = config.sampler.epsilon;
    if !eps.is_finite() || eps < 1.0 {
        errors.push(format!("sampler.epsilon = {eps} must be a finite value >= 1.0"));
    }

    let m = &config.monitor;
    if !SELECTABLE_THRESHOLDS_DB.contains(&m.threshold_db) {
        errors.push(format!(
            "monitor.threshold_db = {} is not selectable (choose one of {:?})",
            m.threshold_db, SELECTABLE_THRESHOLDS_DB
        ));
    }
    if !(0.0..1.0).contains(&m.smoothing) {
        errors.push(format!("monitor.smoothing = {} must be in [0, 1)", m.smoothing));
    }
    if m.reset_after_secs == 0 {
        errors.push("monitor.reset_after_secs must be > 0".to_string());
    } else if m.reset_after_secs > 300 {
        warnings.push(range_warning(
            "monitor.reset_after_secs",
            format!("monitor.reset_after_secs = {} latches alarms for over 5 minutes", m.reset_after_secs),
        ));
    }

    let c = &config.cue;
    if c.sample_rate == 0 {
        errors.push("cue.sample_rate must be > 0".to_string());
    } else if !(c.frequency_hz > 0.0 && c.frequency_hz < f64::from(c.sample_rate) / 2.0) {
        errors.push(format!(
            "cue.frequency_hz = {} must be between 0 and the Nyquist frequency ({} Hz)",
            c.frequency_hz,
            c.sample_rate / 2
        ));
    }
    if c.duration_ms == 0 {
        errors.push("cue.duration_ms must be > 0".to_string());
    } else if c.duration_ms > 5_000 {
        warnings.push(range_warning(
            "cue.duration_ms",
            format!("cue.duration_ms = {} is longer than the default alarm window", c.duration_ms),
        ));
    }
    if !(c.amplitude > 0.0 && c.amplitude <= 1.0) {
        errors.push(format!("cue.amplitude = {} must be in (0, 1]", c.amplitude));
    }

    let a = &config.acquisition;
    if !a.fft_size.is_power_of_two() || !(32..=32_768).contains(&a.fft_size) {
        errors.push(format!(
            "acquisition.fft_size = {} must be a power of two between 32 and 32768",
            a.fft_size
        ));
    }
    if a.sample_rate == 0 {
        errors.push("acquisition.sample_rate must be > 0".to_string());
    }
    if !(0.0..1.0).contains(&a.smoothing_time_constant) {
        errors.push(format!(
            "acquisition.smoothing_time_constant = {} must be in [0, 1)",
            a.smoothing_time_constant
        ));
    }
    if a.min_db >= a.max_db {
        errors.push(format!(
            "acquisition.min_db ({}) must be less than acquisition.max_db ({})",
            a.min_db, a.max_db
        ));
    }

    let s = &config.session;
    if s.frame_interval_ms == 0 {
        errors.push("session.frame_interval_ms must be > 0".to_string());
    } else if s.frame_interval_ms > 250 {
        warnings.push(range_warning(
            "session.frame_interval_ms",
            format!("session.frame_interval_ms = {} makes the alarm react slowly", s.frame_interval_ms),
        ));
    }
    if s.report_interval_ms == 0 {
        errors.push("session.report_interval_ms must be > 0".to_string());
    }
    if s.progress_every_ticks == 0 {
        errors.push("session.progress_every_ticks must be > 0".to_string());
    }

    (errors, warnings)
}

fn range_warning(field: &str, message: String) -> ValidationWarning {
    ValidationWarning {
        field: field.to_string(),
        message,
        suggestion: None,
    }
}
