//! Registry of outstanding calls awaiting a worker response.
//!
//! Each issued call registers a `oneshot` continuation keyed by its
//! correlation identifier. The reader task resolves entries as responses
//! arrive; teardown abandons whatever is left by resolving every entry with
//! [`AppError::SessionTerminated`], so no caller hangs past the session.
//!
//! A call is in exactly one of three states: registered (issued, response
//! pending), matched (entry removed, continuation resolved with the response
//! payload), or abandoned (entry removed at teardown, continuation resolved
//! with a termination failure). Responses whose identifier has no entry are
//! orphans; the reader logs and discards them.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::debug;

use crate::{AppError, Result};

/// Payload delivered to a caller's continuation: the response's result on
/// success, or a failure ([`AppError::Worker`] for protocol-level errors,
/// [`AppError::SessionTerminated`] for abandonment).
pub type CallReply = Result<Value>;

/// One outstanding call, owned by the table from issuance until matched or
/// abandoned.
#[derive(Debug)]
struct PendingCall {
    /// When the call was issued; logged when the entry resolves.
    issued_at: Instant,
    /// Continuation resolved with the call's outcome.
    tx: oneshot::Sender<CallReply>,
}

/// Session-scoped table mapping correlation identifiers to continuations.
///
/// Cloning is cheap and shares the underlying map; the session hands one
/// clone to the reader task and one to the [`RpcClient`](super::RpcClient)
/// so both sides operate on the same registry without global state.
#[derive(Debug, Clone, Default)]
pub struct CorrelationTable {
    calls: Arc<Mutex<HashMap<String, PendingCall>>>,
}

impl CorrelationTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation for `id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rpc` if `id` already has a pending entry.
    /// Identifiers must be unique among currently pending calls.
    pub async fn register(&self, id: &str, tx: oneshot::Sender<CallReply>) -> Result<()> {
        let mut calls = self.calls.lock().await;
        if calls.contains_key(id) {
            return Err(AppError::Rpc(format!(
                "correlation id '{id}' is already pending"
            )));
        }
        calls.insert(
            id.to_owned(),
            PendingCall {
                issued_at: Instant::now(),
                tx,
            },
        );
        Ok(())
    }

    /// Resolve the entry for `id` with `reply`, removing it from the table.
    ///
    /// Returns `false` when `id` has no pending entry (an orphan response);
    /// the caller decides how to log it. A continuation whose receiver was
    /// already dropped is counted as resolved.
    pub async fn resolve(&self, id: &str, reply: CallReply) -> bool {
        let entry = {
            let mut calls = self.calls.lock().await;
            calls.remove(id)
        };

        let Some(entry) = entry else {
            return false;
        };

        debug!(
            id,
            elapsed_ms = entry.issued_at.elapsed().as_millis(),
            "call resolved"
        );

        if entry.tx.send(reply).is_err() {
            debug!(id, "call receiver dropped before resolution");
        }
        true
    }

    /// Remove the entry for `id` without resolving its continuation.
    ///
    /// Used when the outbound write fails after registration, or when a
    /// per-call timeout fires: the caller already has its error and a later
    /// response for this identifier must be treated as an orphan.
    pub async fn discard(&self, id: &str) -> bool {
        let mut calls = self.calls.lock().await;
        calls.remove(id).is_some()
    }

    /// Abandon every outstanding call, resolving each continuation with
    /// [`AppError::SessionTerminated`] carrying `reason`.
    ///
    /// Returns the number of calls abandoned. Safe to call repeatedly; later
    /// invocations find an empty table.
    pub async fn abandon_all(&self, reason: &str) -> usize {
        let drained: Vec<(String, PendingCall)> = {
            let mut calls = self.calls.lock().await;
            calls.drain().collect()
        };

        let count = drained.len();
        for (id, entry) in drained {
            debug!(
                id,
                elapsed_ms = entry.issued_at.elapsed().as_millis(),
                reason,
                "abandoning pending call"
            );
            if entry.tx.send(Err(AppError::SessionTerminated(reason.to_owned()))).is_err() {
                debug!(id, "abandoned call receiver already dropped");
            }
        }
        count
    }

    /// Number of calls currently pending.
    pub async fn pending_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}
