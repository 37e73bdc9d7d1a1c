//! Writer task for the worker's stdin.
//!
//! Receives outbound [`Request`]s from a tokio [`mpsc`] channel, serializes
//! each to a compact single-line JSON string, and writes the
//! newline-terminated bytes to the worker's input stream.
//!
//! A failed write means the worker's stdin is gone; the task cancels the
//! session token so teardown runs, and exits. Once the task is gone the
//! channel closes and later sends fail immediately at the issuing side
//! without ever reaching the correlation table.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::rpc::message::Request;
use crate::{AppError, Result};

/// Writer task — serializes outbound requests and writes them to `stdin`.
///
/// Exits cleanly when `cancel` fires or when `msg_rx` closes (all senders
/// dropped).
///
/// # Errors
///
/// - [`AppError::Rpc`]`("failed to serialize outbound request: …")` if
///   serialization fails (should not occur for [`Request`]).
/// - [`AppError::Transport`]`("write failed: …")` if the write to `stdin`
///   fails (e.g. the worker process has exited). The session token is
///   cancelled before returning.
pub async fn run_writer<W>(
    session_id: String,
    stdin: W,
    mut msg_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut stdin = stdin;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "writer: cancellation received, stopping");
                break;
            }

            msg = msg_rx.recv() => {
                match msg {
                    None => {
                        debug!(session_id, "writer: request channel closed, stopping");
                        break;
                    }
                    Some(request) => {
                        let mut bytes = serde_json::to_vec(&request).map_err(|e| {
                            AppError::Rpc(format!(
                                "failed to serialize outbound request: {e}"
                            ))
                        })?;

                        // One message per line.
                        bytes.push(b'\n');

                        if let Err(e) = stdin.write_all(&bytes).await {
                            warn!(session_id, error = %e, "writer: write to stdin failed");
                            cancel.cancel();
                            return Err(AppError::Transport(format!("write failed: {e}")));
                        }

                        if let Err(e) = stdin.flush().await {
                            warn!(session_id, error = %e, "writer: flush failed");
                            cancel.cancel();
                            return Err(AppError::Transport(format!("flush failed: {e}")));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
