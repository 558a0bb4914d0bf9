//! Threshold picker on stdin.
//!
//! Accepted lines:
//!
//! ```text
//! 45              select 45 dB
//! threshold 45    same
//! t 45            same
//! list            show the selectable thresholds
//! status          print the current level line
//! help
//! ```

use std::io::BufRead;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::session::SessionContext;
use crate::types::{Threshold, ThresholdError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetThreshold(Threshold),
    List,
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

pub fn parse_command(line: &str) -> Result<ControlCommand, ControlError> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err(ControlError::Empty);
    };
    let rest: Vec<&str> = parts.collect();

    match head.to_ascii_lowercase().as_str() {
        "list" | "ls" => Ok(ControlCommand::List),
        "status" | "s" => Ok(ControlCommand::Status),
        "help" | "?" => Ok(ControlCommand::Help),
        "threshold" | "t" => {
            let value = rest.join(" ");
            Ok(ControlCommand::SetThreshold(value.parse()?))
        }
        _ if head.starts_with(|c: char| c.is_ascii_digit()) => {
            Ok(ControlCommand::SetThreshold(line.trim().parse()?))
        }
        other => Err(ControlError::Unknown(other.to_string())),
    }
}

fn selectable_list() -> String {
    Threshold::selectable()
        .map(|t| format!("{:.0}", t.db()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply one parsed command.
pub fn apply_command(command: ControlCommand, context: &SessionContext) {
    match command {
        ControlCommand::SetThreshold(next) => {
            let previous = context.threshold().set(next);
            if previous != next {
                info!(from = %previous, to = %next, "🎚️  Threshold changed");
            }
        }
        ControlCommand::List => {
            info!("Selectable thresholds (dB): {}", selectable_list());
            info!("Current threshold: {}", context.threshold().get());
        }
        ControlCommand::Status => {
            info!("{}", context.latest_level().status_line());
        }
        ControlCommand::Help => {
            info!("Commands: <dB> | threshold <dB> | t <dB> | list | status | help");
        }
    }
}

/// Line buffer between the reader thread and [`run_control`].
const LINE_BUFFER: usize = 16;

/// Read `input` line by line on a dedicated OS thread.
///
/// Blocking reads never run on the runtime, so shutdown does not wait for
/// the next line. The thread ends at EOF, on a read error or once the
/// receiver is dropped.
pub fn spawn_line_reader<R>(input: R) -> std::io::Result<mpsc::Receiver<std::io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("threshold-control".to_string())
        .spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Apply lines from `lines` until the reader closes or `cancel` fires.
pub async fn run_control(
    mut lines: mpsc::Receiver<std::io::Result<String>>,
    context: SessionContext,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.recv() => line,
        };

        match line {
            Some(Ok(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => apply_command(command, &context),
                    Err(e) => warn!("Ignoring '{}': {}", line.trim(), e),
                }
            }
            None => {
                info!("[ThresholdControl] stdin closed");
                break;
            }
            Some(Err(e)) => {
                warn!("[ThresholdControl] stdin read error: {}", e);
                break;
            }
        }
    }
}

/// [`run_control`] on the process's stdin.
pub async fn run_stdin_control(context: SessionContext, cancel: CancellationToken) {
    match spawn_line_reader(std::io::BufReader::new(std::io::stdin())) {
        Ok(lines) => run_control(lines, context, cancel).await,
        Err(e) => warn!("[ThresholdControl] could not start stdin reader: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ThresholdHandle;

    fn db(value: f64) -> Threshold {
        Threshold::try_from_db(value).unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse_command("45").unwrap(), ControlCommand::SetThreshold(db(45.0)));
        assert_eq!(parse_command("threshold 50").unwrap(), ControlCommand::SetThreshold(db(50.0)));
        assert_eq!(parse_command("t 20 dB").unwrap(), ControlCommand::SetThreshold(db(20.0)));
        assert_eq!(parse_command("  LIST ").unwrap(), ControlCommand::List);
        assert_eq!(parse_command("status").unwrap(), ControlCommand::Status);
    }

    #[test]
    fn test_parse_rejects_unselectable_threshold() {
        assert!(matches!(parse_command("42"), Err(ControlError::Threshold(_))));
        assert!(matches!(parse_command("t 75"), Err(ControlError::Threshold(_))));
        assert!(matches!(parse_command("louder"), Err(ControlError::Unknown(_))));
        assert!(matches!(
            parse_command("t loud"),
            Err(ControlError::Threshold(ThresholdError::NotANumber(_)))
        ));
    }

    #[tokio::test]
    async fn test_control_applies_lines_in_order() {
        let context = SessionContext::new(ThresholdHandle::default());
        let input = std::io::Cursor::new(b"t 40\nbogus\n42\n\n60\n".to_vec());

        let lines = spawn_line_reader(input).unwrap();
        run_control(lines, context.clone(), CancellationToken::new()).await;

        // `42` is rejected; the last valid line wins.
        assert_eq!(context.threshold().get(), db(60.0));
    }

    #[tokio::test]
    async fn test_control_stops_on_cancel_while_input_stays_open() {
        let context = SessionContext::new(ThresholdHandle::default());
        // Keep the sender alive: the input never reaches EOF.
        let (_tx, lines) = mpsc::channel(LINE_BUFFER);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            run_control(lines, context.clone(), cancel),
        )
        .await
        .expect("control loop should return once cancelled");
        assert_eq!(context.threshold().get(), Threshold::default());
    }

    /// Input whose reads block until the paired sender is dropped.
    struct BlockedInput(std::sync::mpsc::Receiver<()>);

    impl std::io::Read for BlockedInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn test_runtime_shuts_down_while_input_is_blocked() {
        let (release, blocked) = std::sync::mpsc::channel::<()>();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let context = SessionContext::new(ThresholdHandle::default());
            let lines = spawn_line_reader(std::io::BufReader::new(BlockedInput(blocked))).unwrap();
            let cancel = CancellationToken::new();
            let task = tokio::spawn(run_control(lines, context, cancel.clone()));
            cancel.cancel();
            task.await.unwrap();
        });
        // Returns even though the reader thread is still parked in `read`.
        drop(runtime);
        drop(release);
    }
}
