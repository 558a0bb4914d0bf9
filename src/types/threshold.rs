//! Alarm threshold: the selectable decibel set and the shared handle the
//! presentation layer writes through.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::defaults::{DEFAULT_THRESHOLD_DB, SELECTABLE_THRESHOLDS_DB};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{0} dB is not a selectable threshold (choose one of {SELECTABLE_THRESHOLDS_DB:?})")]
    NotSelectable(f64),

    #[error("'{0}' is not a number of decibels")]
    NotANumber(String),
}

/// A decibel threshold from the selectable set (20, 25, ... 70).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(u8);

impl Threshold {
    /// Accept `value` only if it is one of the selectable thresholds.
    pub fn try_from_db(value: f64) -> Result<Self, ThresholdError> {
        SELECTABLE_THRESHOLDS_DB
            .iter()
            .copied()
            .find(|&db| f64::from(db) == value)
            .map(Self)
            .ok_or(ThresholdError::NotSelectable(value))
    }

    pub fn db(self) -> f64 {
        f64::from(self.0)
    }

    /// Every selectable threshold, lowest first.
    pub fn selectable() -> impl Iterator<Item = Self> {
        SELECTABLE_THRESHOLDS_DB.iter().copied().map(Self)
    }

    /// Whether `estimate` is loud enough to trigger the alarm.
    ///
    /// Strictly greater: an estimate equal to the threshold stays quiet.
    pub fn is_exceeded_by(self, estimate: f64) -> bool {
        estimate > self.db()
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD_DB)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ThresholdError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_from_db(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> Self {
        t.db()
    }
}

impl std::fmt::Display for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} dB", self.0)
    }
}

impl std::str::FromStr for Threshold {
    type Err = ThresholdError;

    /// Parses `"45"`, `"45dB"` or `"45 dB"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_suffix("dB")
            .or_else(|| trimmed.strip_suffix("db"))
            .unwrap_or(trimmed)
            .trim();
        let value: f64 = number
            .parse()
            .map_err(|_| ThresholdError::NotANumber(trimmed.to_string()))?;
        Self::try_from_db(value)
    }
}

/// Shared, lock-free threshold cell.
///
/// Writers (stdin picker, HTTP API, config watcher) store a new value; the
/// tick loop loads it once per tick, so a change is effective on the next
/// tick.
#[derive(Debug, Clone)]
pub struct ThresholdHandle {
    inner: Arc<ArcSwap<Threshold>>,
}

impl ThresholdHandle {
    pub fn new(initial: Threshold) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn get(&self) -> Threshold {
        **self.inner.load()
    }

    /// Store `next`, returning the value it replaced.
    pub fn set(&self, next: Threshold) -> Threshold {
        *self.inner.swap(Arc::new(next))
    }
}

impl Default for ThresholdHandle {
    fn default() -> Self {
        Self::new(Threshold::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectable_values_accepted() {
        for db in [20.0, 25.0, 45.0, 70.0] {
            assert_eq!(Threshold::try_from_db(db).unwrap().db(), db);
        }
    }

    #[test]
    fn test_values_outside_set_rejected() {
        for db in [0.0, 22.5, 42.0, 75.0, f64::NAN] {
            assert!(Threshold::try_from_db(db).is_err(), "{db} should be rejected");
        }
    }

    #[test]
    fn test_selectable_has_eleven_steps() {
        let all: Vec<f64> = Threshold::selectable().map(Threshold::db).collect();
        assert_eq!(all.len(), 11);
        assert_eq!(all.first(), Some(&20.0));
        assert_eq!(all.last(), Some(&70.0));
    }

    #[test]
    fn test_exceeded_is_strict() {
        let t = Threshold::try_from_db(40.0).unwrap();
        assert!(!t.is_exceeded_by(40.0));
        assert!(t.is_exceeded_by(40.01));
    }

    #[test]
    fn test_parse_with_unit_suffix() {
        assert_eq!("45".parse::<Threshold>().unwrap().db(), 45.0);
        assert_eq!("45 dB".parse::<Threshold>().unwrap().db(), 45.0);
        assert!("loud".parse::<Threshold>().is_err());
    }

    #[test]
    fn test_parse_non_number_names_the_input() {
        let err = "loud".parse::<Threshold>().unwrap_err();
        assert_eq!(err, ThresholdError::NotANumber("loud".to_string()));
        assert_eq!(err.to_string(), "'loud' is not a number of decibels");
        assert!(matches!("42".parse::<Threshold>(), Err(ThresholdError::NotSelectable(v)) if v == 42.0));
    }

    #[test]
    fn test_handle_set_returns_previous() {
        let handle = ThresholdHandle::default();
        let next = Threshold::try_from_db(60.0).unwrap();
        assert_eq!(handle.set(next), Threshold::default());
        assert_eq!(handle.clone().get(), next);
    }

    #[test]
    fn test_serde_as_number() {
        let t = Threshold::try_from_db(35.0).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "35.0");
        let back: Threshold = serde_json::from_str("35").unwrap();
        assert_eq!(back, t);
        assert!(serde_json::from_str::<Threshold>("36").is_err());
    }
}
