//! volume-monitor - ambient sound level monitor
//!
//! Samples ambient sound, shows a smoothed decibel level and sounds a short
//! alarm when the room gets louder than the selected threshold.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic signal with periodic loud bursts
//! cargo run --release
//!
//! # Live microphone
//! cargo run --release --features microphone -- --source microphone
//!
//! # Replay recorded frames, status API on port 8080
//! ./volume-monitor --replay frames.txt --addr 127.0.0.1:8080
//! ```
//!
//! While running, type a threshold (`45`, `t 45`, `threshold 45`) or `list`
//! on stdin.
//!
//! # Environment Variables
//!
//! - `VOLMON_CONFIG`: path to `volume_monitor.toml`
//! - `VOLMON_CORS_ORIGINS`: comma-separated origins allowed to call the API
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use volume_monitor::acquisition::{AcquisitionSource, ReplaySource, Scenario, SyntheticSource};
use volume_monitor::api::{create_app, ApiState};
use volume_monitor::config::{self, MonitorConfig};
use volume_monitor::cue::{build_sink, CueDispatcher};
use volume_monitor::pipeline::{run_reporter, run_stdin_control, MonitoringSession, SessionContext};
use volume_monitor::types::{Threshold, ThresholdHandle};

/// Grace period for tasks to finish after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum SourceKind {
    /// Generated signal following `--scenario`
    Synthetic,
    /// Recorded frames from `--replay`
    Replay,
    /// Default input device (requires the `microphone` feature)
    Microphone,
}

#[derive(Parser, Debug)]
#[command(name = "volume-monitor")]
#[command(about = "Ambient sound level monitor with a debounced loudness alarm")]
#[command(version)]
struct CliArgs {
    /// Signal source (default: microphone when compiled in, else synthetic;
    /// replay when `--replay` is given)
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// Loudness profile of the synthetic source
    #[arg(long, value_enum, default_value_t = Scenario::Bursts)]
    scenario: Scenario,

    /// Frame file for the replay source (one comma-separated frame per line)
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Stop at the end of the replay file instead of looping
    #[arg(long)]
    no_loop: bool,

    /// Initial alarm threshold in dB (20, 25, ... 70)
    #[arg(short, long)]
    threshold: Option<Threshold>,

    /// Serve the status API on this address
    #[arg(short, long, value_name = "HOST:PORT")]
    addr: Option<String>,

    /// Path to volume_monitor.toml
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not read threshold commands from stdin
    #[arg(long)]
    no_stdin: bool,

    /// Do not hot-reload the threshold from the config file
    #[arg(long)]
    no_watch: bool,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECS")]
    duration_secs: Option<u64>,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Supervisor Task Names
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    Session,
    Reporter,
    ThresholdControl,
    ConfigWatcher,
    HttpServer,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::Session => write!(f, "Session"),
            TaskName::Reporter => write!(f, "Reporter"),
            TaskName::ThresholdControl => write!(f, "ThresholdControl"),
            TaskName::ConfigWatcher => write!(f, "ConfigWatcher"),
            TaskName::HttpServer => write!(f, "HttpServer"),
        }
    }
}

// ============================================================================
// Source Selection
// ============================================================================

fn build_source(args: &CliArgs, config: &MonitorConfig) -> Result<Box<dyn AcquisitionSource>> {
    let kind = match (args.source, &args.replay) {
        (Some(kind), _) => kind,
        (None, Some(_)) => SourceKind::Replay,
        (None, None) if cfg!(feature = "microphone") => SourceKind::Microphone,
        (None, None) => SourceKind::Synthetic,
    };

    match kind {
        SourceKind::Synthetic => {
            info!("📥 Input: synthetic ({} scenario)", args.scenario);
            Ok(Box::new(SyntheticSource::new(args.scenario, &config.acquisition)?))
        }
        SourceKind::Replay => {
            let path = args
                .replay
                .clone()
                .context("--source replay needs --replay <FILE>")?;
            info!("📥 Input: replay from {}", path.display());
            Ok(Box::new(ReplaySource::from_file(path, !args.no_loop)))
        }
        SourceKind::Microphone => microphone_source(config),
    }
}

#[cfg(feature = "microphone")]
fn microphone_source(config: &MonitorConfig) -> Result<Box<dyn AcquisitionSource>> {
    info!("📥 Input: default microphone");
    Ok(Box::new(volume_monitor::acquisition::MicrophoneSource::new(&config.acquisition)?))
}

#[cfg(not(feature = "microphone"))]
fn microphone_source(_config: &MonitorConfig) -> Result<Box<dyn AcquisitionSource>> {
    Err(anyhow::anyhow!(
        "built without microphone support, rebuild with `--features microphone`"
    ))
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    state: ApiState,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, create_app(state))
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the monitoring session. Its failure is fatal for the process.
fn spawn_session(
    task_set: &mut JoinSet<Result<TaskName>>,
    source: Box<dyn AcquisitionSource>,
    context: SessionContext,
    cue: CueDispatcher,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[Session] Task starting");
        let config = config::get();

        let mut session = MonitoringSession::start(source, config, context, cue)
            .await
            .context("acquisition unavailable")?;

        let result = session.run(cancel_token.clone()).await;
        // Normal completion also stops the sibling tasks.
        cancel_token.cancel();

        let stats = result.context("monitoring stopped")?;
        info!(ticks = stats.ticks_processed, alarms = stats.alarms_triggered, "[Session] Finished");
        Ok(TaskName::Session)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("🔒 Supervisor: All tasks spawned, monitoring...");

    let outcome = loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("🛑 Supervisor: Shutdown signal received");
                break Ok(());
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("🔒 Supervisor: Task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("🔒 Supervisor: Task failed with error: {:#}", e);
                        cancel_token.cancel();
                        break Err(e);
                    }
                    Some(Err(e)) => {
                        error!("🔒 Supervisor: Task panicked: {}", e);
                        cancel_token.cancel();
                        break Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("🔒 Supervisor: All tasks completed");
                        break Ok(());
                    }
                }
            }
        }
    };

    // Let the session tear down and the server drain before exiting.
    let drain = async {
        let mut failure = None;
        while let Some(result) = task_set.join_next().await {
            if let Ok(Err(e)) = result {
                failure.get_or_insert(e);
            }
        }
        failure
    };
    let late_failure = match tokio::time::timeout(SHUTDOWN_GRACE, drain).await {
        Ok(failure) => failure,
        Err(_) => {
            warn!("🔒 Supervisor: Tasks still running after {:?}, aborting", SHUTDOWN_GRACE);
            task_set.abort_all();
            None
        }
    };

    match (outcome, late_failure) {
        (Err(e), _) | (Ok(()), Some(e)) => Err(e),
        (Ok(()), None) => Ok(()),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn initial_threshold(args: &CliArgs, config: &MonitorConfig) -> Threshold {
    if let Some(threshold) = args.threshold {
        return threshold;
    }
    match Threshold::try_from_db(f64::from(config.monitor.threshold_db)) {
        Ok(threshold) => threshold,
        Err(e) => {
            warn!("{}; using {}", e, Threshold::default());
            Threshold::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.log_json);

    let mut monitor_config = MonitorConfig::load(args.config.as_deref());
    if let Some(addr) = &args.addr {
        monitor_config.server.addr = Some(addr.clone());
    }
    config::init(monitor_config);
    let config = config::get();

    let threshold = initial_threshold(&args, config);
    let settings = config.monitor_settings();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  volume-monitor");
    info!("  Ambient sound level monitor");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Threshold:     {}", threshold);
    info!("   Alarm window:  {}s ({:?} policy)", settings.reset_after.as_secs(), settings.reset_policy);
    info!("   Frame rate:    every {} ms", config.session.frame_interval_ms);
    info!("");

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if let Some(secs) = args.duration_secs {
        let deadline_token = cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            info!("⏱️  Run duration of {}s reached", secs);
            deadline_token.cancel();
        });
    }

    let context = SessionContext::new(ThresholdHandle::new(threshold));
    let source = build_source(&args, config)?;

    let cue = if config.cue.enabled {
        let (dispatcher, _player) = CueDispatcher::spawn(build_sink(config.cue.sink), config.tone_spec());
        info!("🔔 Cue: {} Hz for {} ms via {}", config.cue.frequency_hz, config.cue.duration_ms, config.cue.sink);
        dispatcher
    } else {
        info!("🔕 Cue: disabled");
        CueDispatcher::disabled()
    };

    info!("🔒 Supervisor: Initializing task monitoring");
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: HTTP Server
    if let Some(addr) = &config.server.addr {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("🌐 Status API on http://{}/api/v1", addr);
        spawn_http_server(&mut task_set, listener, ApiState::new(context.clone()), cancel_token.clone());
    }

    // Task 2: Monitoring session
    spawn_session(&mut task_set, source, context.clone(), cue, cancel_token.clone());

    // Task 3: Readable level display
    let levels = context.subscribe_levels();
    let report_every = config.session.report_interval();
    let reporter_cancel = cancel_token.clone();
    task_set.spawn(async move {
        run_reporter(levels, report_every, reporter_cancel).await;
        Ok(TaskName::Reporter)
    });

    // Task 4: Threshold picker on stdin
    if !args.no_stdin {
        let control_context = context.clone();
        let control_cancel = cancel_token.clone();
        task_set.spawn(async move {
            run_stdin_control(control_context, control_cancel).await;
            Ok(TaskName::ThresholdControl)
        });
    }

    // Task 5: Threshold hot reload
    if !args.no_watch {
        if let Some(path) = config::resolve_config_path(args.config.as_deref()) {
            let handle = context.threshold().clone();
            let watcher_cancel = cancel_token.clone();
            task_set.spawn(async move {
                config::watcher::run_config_watcher(path, handle, None, watcher_cancel).await;
                Ok(TaskName::ConfigWatcher)
            });
        }
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("");
    info!("✓ volume-monitor shutdown complete");
    Ok(())
}
