//! Session lifecycle: worker launch, handshake, call dispatch, teardown.
//!
//! A session is one lifetime of a worker process plus its correlation state
//! and result cache. [`Session::launch`] spawns the worker and wires the
//! reader, writer, stderr and exit monitors, the whole-session timer, and a
//! teardown supervisor to a single [`CancellationToken`];
//! [`Session::attach`] runs the same wire loop over any stream pair, which
//! is how the scripted in-memory worker in the integration tests drives the
//! identical code path.
//!
//! Teardown — explicit [`Session::shutdown`], session timeout, worker exit,
//! or stream failure — is one cleanup operation: terminate the worker,
//! resolve every outstanding call with a termination failure, clear the
//! cache. All paths funnel through the token, and each step tolerates
//! repetition, so terminating an already-dead session is a no-op.

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{canonical_key, ResultCache};
use crate::config::SessionConfig;
use crate::rpc::correlation::CorrelationTable;
use crate::rpc::message::{
    ToolDescriptor, ToolListing, METHOD_EXECUTE_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS,
    PROTOCOL_VERSION,
};
use crate::rpc::{client::RpcClient, reader, spawner, writer};
use crate::{AppError, Result};

/// Outbound channel depth between call issuers and the writer task.
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// One worker process plus its correlation state and cache.
#[derive(Debug)]
pub struct Session {
    id: String,
    config: SessionConfig,
    client: RpcClient,
    table: CorrelationTable,
    cache: Option<ResultCache>,
    tools: Mutex<Vec<ToolDescriptor>>,
    cancel: CancellationToken,
}

impl Session {
    /// Spawn the configured worker process and complete the handshake.
    ///
    /// The handshake sends `initialize` with the configured client identity,
    /// then `tools/list` to discover the worker's capability surface.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the worker fails to spawn, or any
    /// error from the handshake calls. On handshake failure the worker is
    /// terminated before the error is returned.
    pub async fn launch(config: SessionConfig) -> Result<Self> {
        let conn = spawner::spawn_worker(&config.worker_cmd, &config.worker_args)?;
        let spawner::WorkerConnection {
            child,
            stdin,
            stdout,
            stderr,
        } = conn;

        let session = Self::wire(config, stdout, stdin);
        let _exit = spawner::monitor_exit(session.id.clone(), child, session.cancel.clone());
        let _stderr = spawner::monitor_stderr(session.id.clone(), stderr, session.cancel.clone());

        session.complete_handshake().await?;
        Ok(session)
    }

    /// Run a session over an arbitrary stream pair instead of a spawned
    /// process.
    ///
    /// The wire loop, correlation, caching, timers, and teardown behave
    /// exactly as in [`Session::launch`]; only the process transport is
    /// absent. Useful for in-memory transports.
    ///
    /// # Errors
    ///
    /// Returns any error from the handshake calls. On handshake failure the
    /// session is torn down before the error is returned.
    pub async fn attach<R, W>(config: SessionConfig, stdout: R, stdin: W) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let session = Self::wire(config, stdout, stdin);
        session.complete_handshake().await?;
        Ok(session)
    }

    /// Session identifier (UUID v4, unique per worker lifetime).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tools advertised by the worker during the handshake.
    pub async fn tools(&self) -> Vec<ToolDescriptor> {
        self.tools.lock().await.clone()
    }

    /// Whether the session has been torn down.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_calls(&self) -> usize {
        self.table.pending_count().await
    }

    /// Invoke a named tool on the worker, consulting the cache first.
    ///
    /// A live cached entry short-circuits the worker entirely; otherwise the
    /// call goes out and a successful result is stored under the canonical
    /// key. Failed results are never cached, so re-issuing a previously
    /// failing call always reaches the worker again.
    ///
    /// # Errors
    ///
    /// - [`AppError::Worker`] — the worker reported a structured failure.
    /// - [`AppError::Transport`] — the session is terminated or the worker
    ///   is unreachable.
    /// - [`AppError::SessionTerminated`] — the session was torn down while
    ///   this call was outstanding.
    /// - [`AppError::Timeout`] — the configured per-call bound elapsed.
    pub async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        let key = self
            .cache
            .as_ref()
            .map(|_| canonical_key(name, &params));

        if let (Some(cache), Some(key)) = (&self.cache, key.as_deref()) {
            if let Some(hit) = cache.get(key).await {
                debug!(session_id = %self.id, tool = name, "cache hit, short-circuiting call");
                return Ok(hit);
            }
        }

        let result = self
            .client
            .call(METHOD_EXECUTE_TOOL, json!({ "name": name, "input": params }))
            .await?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, result.clone()).await;
        }

        Ok(result)
    }

    /// Issue a raw call to the worker, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Same surface as [`Session::execute_tool`], minus caching.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.client.call(method, params).await
    }

    /// Tear the session down: terminate the worker, abandon outstanding
    /// calls, clear the cache.
    ///
    /// Idempotent — calling it on an already-terminated session is a no-op.
    pub async fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(session_id = %self.id, "session teardown requested");
        }
        self.cancel.cancel();

        let abandoned = self.table.abandon_all("session terminated").await;
        if abandoned > 0 {
            warn!(session_id = %self.id, abandoned, "abandoned outstanding calls at teardown");
        }

        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    /// Wire the session tasks over a stream pair and start the clocks.
    fn wire<R, W>(config: SessionConfig, stdout: R, stdin: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = uuid::Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let table = CorrelationTable::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        let client = RpcClient::new(
            id.clone(),
            outbound_tx,
            table.clone(),
            config.call_timeout(),
            cancel.clone(),
        );

        let cache = config
            .cache
            .enabled
            .then(|| ResultCache::new(config.cache_ttl()));

        // Reader: worker stdout → correlation table.
        {
            let (rid, rtable, rcancel) = (id.clone(), table.clone(), cancel.clone());
            tokio::spawn(async move {
                if let Err(err) = reader::run_reader(rid, stdout, rtable, rcancel).await {
                    error!(%err, "reader task failed");
                }
            });
        }

        // Writer: outbound channel → worker stdin.
        {
            let (wid, wcancel) = (id.clone(), cancel.clone());
            tokio::spawn(async move {
                if let Err(err) = writer::run_writer(wid, stdin, outbound_rx, wcancel).await {
                    error!(%err, "writer task failed");
                }
            });
        }

        // Whole-session lifetime bound.
        {
            let (tid, tcancel) = (id.clone(), cancel.clone());
            let timeout = config.session_timeout();
            tokio::spawn(async move {
                tokio::select! {
                    () = tcancel.cancelled() => {}
                    () = tokio::time::sleep(timeout) => {
                        warn!(session_id = %tid, ?timeout, "session timeout elapsed, tearing down");
                        tcancel.cancel();
                    }
                }
            });
        }

        // Teardown supervisor: covers the paths that cancel the token
        // without going through `shutdown` (timeout, worker exit, stream
        // failure). Abandoning twice finds an empty table.
        {
            let (sid, stable, scancel) = (id.clone(), table.clone(), cancel.clone());
            let scache = cache.clone();
            tokio::spawn(async move {
                scancel.cancelled().await;
                let abandoned = stable.abandon_all("session terminated").await;
                if abandoned > 0 {
                    warn!(session_id = %sid, abandoned, "abandoned outstanding calls at teardown");
                }
                if let Some(cache) = scache {
                    cache.clear().await;
                }
            });
        }

        Self {
            id,
            config,
            client,
            table,
            cache,
            tools: Mutex::new(Vec::new()),
            cancel,
        }
    }

    /// `initialize` + `tools/list`; tears the session down on failure.
    async fn complete_handshake(&self) -> Result<()> {
        match self.handshake_calls().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shutdown().await;
                Err(err)
            }
        }
    }

    async fn handshake_calls(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": self.config.client.name,
                "version": self.config.client.version,
            },
            "capabilities": {},
        });
        self.client.call(METHOD_INITIALIZE, params).await?;
        info!(session_id = %self.id, "worker initialized");

        let raw = self.client.call(METHOD_LIST_TOOLS, json!({})).await?;
        let listing: ToolListing = serde_json::from_value(raw)
            .map_err(|e| AppError::Rpc(format!("invalid tools/list result: {e}")))?;

        debug!(
            session_id = %self.id,
            tool_count = listing.tools.len(),
            "capability surface discovered"
        );
        *self.tools.lock().await = listing.tools;
        Ok(())
    }
}
