//! Monitor Configuration Module
//!
//! Provides the monitor configuration loaded from TOML files, replacing the
//! hardcoded sampler, alarm, cue and session constants with operator-tunable
//! values.
//!
//! ## Loading Order
//!
//! 1. Explicit path (`--config` on the command line)
//! 2. `VOLMON_CONFIG` environment variable (path to TOML file)
//! 3. `volume_monitor.toml` in the current working directory
//! 4. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(MonitorConfig::load(None));
//!
//! // Anywhere in the codebase:
//! let reset_after = config::get().monitor.reset_after();
//! ```

mod monitor_config;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use monitor_config::*;

use std::sync::OnceLock;

/// Global monitor configuration, initialized once at startup.
static MONITOR_CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// Initialize the global monitor configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: MonitorConfig) {
    if MONITOR_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global monitor configuration.
///
/// Falls back to the built-in defaults when `init()` was never called.
pub fn get() -> &'static MonitorConfig {
    MONITOR_CONFIG.get_or_init(MonitorConfig::default)
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    MONITOR_CONFIG.get().is_some()
}
