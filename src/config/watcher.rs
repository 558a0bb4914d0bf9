//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (to handle partial writes from editors), re-reads the
//! file and pushes `monitor.threshold_db` into the shared [`ThresholdHandle`]
//! only when that value differs from the one last loaded from the file, so a
//! threshold picked on stdin or over HTTP survives edits to other keys.
//! Other sections are fixed for the session lifetime.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::defaults::{CONFIG_DEBOUNCE_MS, CONFIG_POLL_INTERVAL_MS};
use super::MonitorConfig;
use crate::types::{Threshold, ThresholdHandle};

/// Events emitted by the config watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEvent {
    /// The file changed and its threshold was applied.
    ThresholdChanged { from: Threshold, to: Threshold },
    /// The file changed but the threshold stayed the same.
    Unchanged,
    /// Reload was attempted but failed (previous threshold remains active).
    Error(String),
}

/// Run the config file watcher loop.
///
/// Polls `path` for mtime changes and applies reloaded thresholds to
/// `threshold`. Sends events on `tx` when a channel is given. Returns on
/// cancellation.
pub async fn run_config_watcher(
    path: PathBuf,
    threshold: ThresholdHandle,
    tx: Option<mpsc::Sender<ConfigEvent>>,
    cancel: CancellationToken,
) {
    run_config_watcher_with(
        path,
        threshold,
        tx,
        cancel,
        Duration::from_millis(CONFIG_POLL_INTERVAL_MS),
        Duration::from_millis(CONFIG_DEBOUNCE_MS),
    )
    .await;
}

/// [`run_config_watcher`] with explicit timing, for tests.
pub async fn run_config_watcher_with(
    path: PathBuf,
    threshold: ThresholdHandle,
    tx: Option<mpsc::Sender<ConfigEvent>>,
    cancel: CancellationToken,
    poll_interval: Duration,
    debounce: Duration,
) {
    tracing::info!(path = %path.display(), "Config watcher started");

    let mut last_mtime = get_mtime(&path);
    let mut file_threshold = read_threshold(&path).ok();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Config watcher cancelled");
                return;
            }
            () = tokio::time::sleep(poll_interval) => {}
        }

        // If we can't read mtime (file deleted, permissions), warn and keep polling
        let Some(current) = get_mtime(&path) else {
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not accessible, keeping current threshold, will retry"
                );
                last_mtime = None;
            }
            continue;
        };

        if last_mtime == Some(current) {
            continue;
        }

        // Debounce: wait, then re-check mtime to ensure write is complete
        tokio::time::sleep(debounce).await;
        if get_mtime(&path) != Some(current) {
            continue;
        }
        last_mtime = Some(current);

        let event = apply_reload(&path, &threshold, &mut file_threshold);
        if let Some(ref tx) = tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Read `monitor.threshold_db` from the config file.
fn read_threshold(path: &Path) -> Result<Threshold, String> {
    let config = MonitorConfig::load_from_file(path).map_err(|e| e.to_string())?;
    Threshold::try_from_db(f64::from(config.monitor.threshold_db)).map_err(|e| e.to_string())
}

/// Re-read the config file and apply its threshold if the file changed it.
///
/// `file_threshold` is the value last loaded from the file. The handle is
/// left alone when the file still holds that value, even if the live
/// threshold was changed from somewhere else in the meantime.
pub fn apply_reload(
    path: &Path,
    threshold: &ThresholdHandle,
    file_threshold: &mut Option<Threshold>,
) -> ConfigEvent {
    let next = match read_threshold(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Config hot-reload failed, keeping previous threshold");
            return ConfigEvent::Error(e);
        }
    };

    if *file_threshold == Some(next) {
        return ConfigEvent::Unchanged;
    }
    *file_threshold = Some(next);

    let previous = threshold.set(next);
    if previous == next {
        ConfigEvent::Unchanged
    } else {
        tracing::info!(from = %previous, to = %next, "Threshold reloaded from config");
        ConfigEvent::ThresholdChanged { from: previous, to: next }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn test_apply_reload_changes_threshold() {
        let file = config_file("[monitor]\nthreshold_db = 55");
        let handle = ThresholdHandle::new(Threshold::default());
        let mut loaded = Some(Threshold::default());

        let event = apply_reload(file.path(), &handle, &mut loaded);

        assert_eq!(
            event,
            ConfigEvent::ThresholdChanged {
                from: Threshold::default(),
                to: Threshold::try_from_db(55.0).unwrap(),
            }
        );
        assert_eq!(handle.get().db(), 55.0);
        assert_eq!(loaded, Some(Threshold::try_from_db(55.0).unwrap()));
    }

    #[test]
    fn test_apply_reload_same_value_is_unchanged() {
        let file = config_file("[monitor]\nthreshold_db = 25");
        let handle = ThresholdHandle::new(Threshold::default());
        let mut loaded = Some(Threshold::default());

        assert_eq!(apply_reload(file.path(), &handle, &mut loaded), ConfigEvent::Unchanged);
    }

    #[test]
    fn test_unrelated_edit_keeps_user_selected_threshold() {
        // File still says 25 but the user picked 60 at runtime.
        let file = config_file("[monitor]\nthreshold_db = 25\n\n[cue]\namplitude = 0.1");
        let handle = ThresholdHandle::new(Threshold::default());
        let mut loaded = Some(Threshold::default());
        handle.set(Threshold::try_from_db(60.0).unwrap());

        let event = apply_reload(file.path(), &handle, &mut loaded);

        assert_eq!(event, ConfigEvent::Unchanged);
        assert_eq!(handle.get().db(), 60.0);
    }

    #[test]
    fn test_file_edit_still_overrides_user_selection() {
        let file = config_file("[monitor]\nthreshold_db = 45");
        let handle = ThresholdHandle::new(Threshold::try_from_db(60.0).unwrap());
        let mut loaded = Some(Threshold::default());

        let event = apply_reload(file.path(), &handle, &mut loaded);

        assert!(matches!(event, ConfigEvent::ThresholdChanged { .. }));
        assert_eq!(handle.get().db(), 45.0);
    }

    #[test]
    fn test_apply_reload_invalid_keeps_previous() {
        let file = config_file("[monitor]\nthreshold_db = 33");
        let handle = ThresholdHandle::new(Threshold::default());
        let mut loaded = Some(Threshold::default());

        assert!(matches!(
            apply_reload(file.path(), &handle, &mut loaded),
            ConfigEvent::Error(_)
        ));
        assert_eq!(handle.get(), Threshold::default());
        assert_eq!(loaded, Some(Threshold::default()));
    }

    #[tokio::test]
    async fn test_watcher_picks_up_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("volume_monitor.toml");
        std::fs::write(&path, "[monitor]\nthreshold_db = 25\n").unwrap();

        let handle = ThresholdHandle::new(Threshold::default());
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_config_watcher_with(
            path.clone(),
            handle.clone(),
            Some(tx),
            cancel.clone(),
            Duration::from_millis(20),
            Duration::from_millis(5),
        ));

        // Make sure the rewrite lands on a different mtime.
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        std::fs::write(&path, "[monitor]\nthreshold_db = 60\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher should report within 5s")
            .expect("channel open");
        assert!(matches!(event, ConfigEvent::ThresholdChanged { .. }));
        assert_eq!(handle.get().db(), 60.0);

        cancel.cancel();
        task.await.unwrap();
    }
}
