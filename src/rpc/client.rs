//! Call issuance and response awaiting.
//!
//! The client owns identifier generation (an atomic monotonic counter, so
//! identifiers are unique for the session's lifetime and never reused while
//! pending), registers a continuation in the [`CorrelationTable`], hands the
//! encoded request to the writer task, and suspends until the reader task
//! resolves the continuation.
//!
//! Multiple calls may be outstanding at once; responses correlate by
//! identifier, never by arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::rpc::correlation::CorrelationTable;
use crate::rpc::message::Request;
use crate::{AppError, Result};

/// Issues calls to the worker and awaits their correlated responses.
#[derive(Debug)]
pub struct RpcClient {
    session_id: String,
    outbound: mpsc::Sender<Request>,
    table: CorrelationTable,
    seq: AtomicU64,
    call_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl RpcClient {
    /// Create a client over an outbound request channel and a shared table.
    ///
    /// `call_timeout` of `None` disables the per-call bound; a hung call is
    /// then resolved only by session teardown.
    #[must_use]
    pub fn new(
        session_id: String,
        outbound: mpsc::Sender<Request>,
        table: CorrelationTable,
        call_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_id,
            outbound,
            table,
            seq: AtomicU64::new(0),
            call_timeout,
            cancel,
        }
    }

    /// Issue `method` with `params` and await the matching response.
    ///
    /// # Errors
    ///
    /// - [`AppError::Transport`] — the session is already terminated or the
    ///   worker's stdin is closed; the call never reaches the table.
    /// - [`AppError::Worker`] — the worker answered with a structured error
    ///   object. The call reached the worker; the failure is protocol-level.
    /// - [`AppError::SessionTerminated`] — the session was torn down while
    ///   the call was outstanding.
    /// - [`AppError::Timeout`] — the configured per-call bound elapsed; the
    ///   pending entry is discarded so a late response becomes an orphan.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        if self.cancel.is_cancelled() || self.outbound.is_closed() {
            return Err(AppError::Transport(
                "session terminated; worker unavailable".into(),
            ));
        }

        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.table.register(&id, tx).await?;

        debug!(session_id = %self.session_id, id, method, "call issued");

        let request = Request::new(id.clone(), method, params);
        if self.outbound.send(request).await.is_err() {
            // Writer task is gone; undo the registration so the entry does
            // not linger until teardown.
            self.table.discard(&id).await;
            return Err(AppError::Transport("worker stdin closed".into()));
        }

        let received = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(inner) => inner,
                Err(_elapsed) => {
                    self.table.discard(&id).await;
                    return Err(AppError::Timeout(format!(
                        "no response to '{method}' within {limit:?}"
                    )));
                }
            },
            None => rx.await,
        };

        match received {
            Ok(reply) => reply,
            // Continuation dropped without resolution; only teardown paths
            // discard registered entries.
            Err(_) => Err(AppError::SessionTerminated(
                "call discarded during teardown".into(),
            )),
        }
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.table.pending_count().await
    }

    /// Next correlation identifier: `call-1`, `call-2`, …
    fn next_id(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("call-{n}")
    }
}
