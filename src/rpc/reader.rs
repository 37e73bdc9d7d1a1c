//! Reader task for the worker's stdout.
//!
//! Drives a [`FramedRead`] over the worker's output stream using
//! [`WireCodec`], parses each complete line as a JSON-RPC response, and
//! resolves the matching entry in the [`CorrelationTable`]. Malformed lines
//! and orphan responses are logged and skipped; neither terminates the
//! stream. EOF or an unrecoverable I/O error cancels the session token so
//! the teardown path abandons whatever calls are still outstanding.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::rpc::codec::WireCodec;
use crate::rpc::correlation::CorrelationTable;
use crate::rpc::message::{id_key, Response};
use crate::{AppError, Result};

/// Parse one line from the worker stream into a [`Response`].
///
/// # Return value
///
/// - `Ok(Some(response))` — the line is a response carrying an identifier.
/// - `Ok(None)` — the line is empty, or is a worker-initiated request or
///   notification (skipped; logged at `DEBUG`).
/// - `Err(AppError::Framing)` — the line is not valid JSON.
///
/// # Errors
///
/// Returns [`AppError::Framing`]`("malformed json: …")` when the line does
/// not parse. Callers treat this as a diagnostic, not a stream failure.
pub fn parse_inbound_line(session_id: &str, line: &str) -> Result<Option<Response>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| AppError::Framing(format!("malformed json: {e}")))?;

    // Worker-initiated requests and notifications carry a `method`; the
    // client only correlates responses, so these are skipped.
    if value.get("method").is_some() {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_owned();
        debug!(
            session_id,
            method, "reader: skipping worker-initiated message"
        );
        return Ok(None);
    }

    let response: Response = serde_json::from_value(value)
        .map_err(|e| AppError::Framing(format!("malformed response: {e}")))?;

    Ok(Some(response))
}

/// Reader task — decodes response lines from `stdout` and resolves the table.
///
/// Runs until EOF, an unrecoverable I/O error, or cancellation. On EOF and
/// I/O error the session token is cancelled so the supervisor abandons any
/// still-pending calls; on cancellation the task exits quietly (teardown is
/// already in progress).
///
/// # Errors
///
/// Returns `Ok(())` on every exit path; recoverable problems are logged and
/// the stream continues.
pub async fn run_reader<R>(
    session_id: String,
    stdout: R,
    table: CorrelationTable,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stdout, WireCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None => {
                        // EOF — worker stdout closed.
                        debug!(session_id, "reader: EOF detected");
                        cancel.cancel();
                        break;
                    }

                    Some(Err(AppError::Framing(ref msg))) => {
                        // Oversized line or similar — log and continue.
                        warn!(
                            session_id,
                            error = msg.as_str(),
                            "reader: framing error, skipping line"
                        );
                    }

                    Some(Err(e)) => {
                        // I/O error on the underlying stream — non-recoverable.
                        warn!(session_id, error = %e, "reader: IO error, stopping");
                        cancel.cancel();
                        break;
                    }

                    Some(Ok(line)) => {
                        match parse_inbound_line(&session_id, &line) {
                            Ok(Some(response)) => {
                                dispatch_response(&session_id, &table, response).await;
                            }
                            Ok(None) => {
                                // Empty line or non-response message.
                            }
                            Err(e) => {
                                warn!(
                                    session_id,
                                    error = %e,
                                    raw_line = %line,
                                    "reader: parse error, skipping line"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Resolve `response` against the table; log orphans and malformed ids.
async fn dispatch_response(session_id: &str, table: &CorrelationTable, response: Response) {
    let Some(key) = response.id.as_ref().and_then(id_key) else {
        warn!(
            session_id,
            "reader: response without usable identifier, discarding"
        );
        return;
    };

    let reply = match response.error {
        Some(err) => Err(AppError::Worker(err)),
        None => Ok(response.result.unwrap_or(Value::Null)),
    };

    if !table.resolve(&key, reply).await {
        // Unknown or already-resolved identifier. Never fatal.
        warn!(session_id, id = %key, "reader: orphan response, discarding");
    }
}
