//! Worker process spawning and lifetime management.
//!
//! Spawns the long-lived worker once per session with piped stdio and
//! `kill_on_drop(true)` so the process never outlives the client. Two
//! companion tasks complete the transport:
//! - [`monitor_exit`] owns the [`Child`]: it cancels the session token when
//!   the process dies on its own, and kills the process when the token fires
//!   first. Killing an already-exited worker is a no-op, which makes session
//!   termination idempotent.
//! - [`monitor_stderr`] drains the worker's diagnostic stream into the log.
//!   Stderr output is a side channel; it is never parsed as protocol.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{AppError, Result};

/// Active stdio connection to a spawned worker process.
///
/// The session wires `stdin` to the writer task, `stdout` to the reader
/// task, `stderr` to [`monitor_stderr`], and hands `child` to
/// [`monitor_exit`].
#[derive(Debug)]
pub struct WorkerConnection {
    /// Child process handle — kept alive so `kill_on_drop` works.
    pub child: Child,
    /// Worker's stdin for outbound request lines.
    pub stdin: ChildStdin,
    /// Worker's stdout carrying response lines.
    pub stdout: ChildStdout,
    /// Worker's stderr, surfaced as diagnostic log output.
    pub stderr: ChildStderr,
}

/// Spawn the worker process with piped stdio.
///
/// # Errors
///
/// - `AppError::Transport("failed to spawn worker: …")` — OS spawn failure
///   (missing binary, permission denied).
/// - `AppError::Transport("failed to capture worker …")` — a stdio handle
///   could not be taken from the child.
pub fn spawn_worker(cmd: &str, args: &[String]) -> Result<WorkerConnection> {
    let mut command = Command::new(cmd);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| AppError::Transport(format!("failed to spawn worker: {err}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture worker stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture worker stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Transport("failed to capture worker stderr".into()))?;

    info!(cmd, "worker process spawned");

    Ok(WorkerConnection {
        child,
        stdin,
        stdout,
        stderr,
    })
}

/// Spawn a background task that owns the child process for the rest of the
/// session.
///
/// Two exit paths:
/// - The worker exits on its own: the exit status is logged and the session
///   token is cancelled so teardown abandons outstanding calls.
/// - The token fires first (explicit shutdown or session timeout): the
///   worker is killed and reaped. `start_kill` on an already-exited process
///   is ignored, so repeated teardown is a no-op rather than an error.
#[must_use]
pub fn monitor_exit(
    session_id: String,
    mut child: Child,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = child.wait() => {
                match result {
                    Ok(status) => {
                        info!(
                            session_id,
                            exit_code = status.code(),
                            "worker process exited"
                        );
                    }
                    Err(err) => {
                        warn!(session_id, %err, "error waiting for worker process");
                    }
                }
                cancel.cancel();
            }
            () = cancel.cancelled() => {
                if let Err(err) = child.start_kill() {
                    // Process already gone; nothing to do.
                    debug!(session_id, %err, "kill skipped, worker already exited");
                }
                match child.wait().await {
                    Ok(status) => {
                        info!(
                            session_id,
                            exit_code = status.code(),
                            "worker process terminated"
                        );
                    }
                    Err(err) => {
                        warn!(session_id, %err, "error reaping worker process");
                    }
                }
            }
        }
    })
}

/// Spawn a background task that logs the worker's stderr line by line.
#[must_use]
pub fn monitor_stderr(
    session_id: String,
    stderr: ChildStderr,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    break;
                }

                line = lines.next_line() => {
                    match line {
                        Ok(Some(text)) => {
                            warn!(session_id, line = %text, "worker stderr");
                        }
                        Ok(None) => {
                            debug!(session_id, "worker stderr closed");
                            break;
                        }
                        Err(err) => {
                            warn!(session_id, %err, "error reading worker stderr");
                            break;
                        }
                    }
                }
            }
        }
    })
}
