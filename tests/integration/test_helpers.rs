//! Scripted in-memory worker used by the RPC flow tests.
//!
//! Runs the real session wire loop (codec, reader, writer, correlation,
//! cache) over a [`tokio::io::duplex`] pair instead of a spawned process.
//! The worker answers the handshake like the real thing and follows a
//! per-test [`WorkerScript`] for `tools/execute`, counting every execute
//! request so tests can assert how many calls actually reached the wire.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use toolwire::{Session, SessionConfig};

/// How the scripted worker answers `tools/execute`.
pub enum ExecuteBehavior {
    /// Respond with `{"echo": <input>}`.
    EchoInput,
    /// Respond with a structured error object.
    Fail { code: i64, message: String },
    /// Never respond; the call stays pending.
    Ignore,
    /// Hold responses until two execute requests have arrived, then answer
    /// them in reverse arrival order.
    ReversePairs,
}

/// Per-test behavior of the scripted worker.
pub struct WorkerScript {
    pub execute: ExecuteBehavior,
    /// Emit a response with an unknown identifier before each execute
    /// response.
    pub orphan_before_execute: bool,
    /// Emit a non-JSON line before each execute response.
    pub garbage_before_execute: bool,
    /// Answer `initialize` with an error object instead of a result.
    pub fail_initialize: bool,
}

impl Default for WorkerScript {
    fn default() -> Self {
        Self {
            execute: ExecuteBehavior::EchoInput,
            orphan_before_execute: false,
            garbage_before_execute: false,
            fail_initialize: false,
        }
    }
}

/// Start the scripted worker over `io`; returns the execute-request counter.
pub fn start_scripted_worker(io: DuplexStream, script: WorkerScript) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let executes = Arc::clone(&counter);

    tokio::spawn(async move {
        let (read_half, mut write_half) = tokio::io::split(io);
        let mut lines = BufReader::new(read_half).lines();
        let mut held: Vec<Value> = Vec::new();

        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(request) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let id = request.get("id").cloned().unwrap_or(Value::Null);
            let method = request.get("method").and_then(Value::as_str).unwrap_or("");

            let mut out: Vec<Value> = Vec::new();
            match method {
                "initialize" => {
                    if script.fail_initialize {
                        out.push(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32000, "message": "refusing to initialize"},
                        }));
                    } else {
                        out.push(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "result": {
                                "protocolVersion": "2024-11-05",
                                "serverInfo": {"name": "scripted-worker", "version": "0.0.1"},
                            },
                        }));
                    }
                }
                "tools/list" => {
                    out.push(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "tools": [
                                {"name": "lookup", "description": "scripted lookup", "parameters": {}},
                            ],
                        },
                    }));
                }
                "tools/execute" => {
                    executes.fetch_add(1, Ordering::SeqCst);

                    if script.garbage_before_execute {
                        let _ = write_half.write_all(b"this is not json\n").await;
                    }
                    if script.orphan_before_execute {
                        out.push(json!({
                            "jsonrpc": "2.0",
                            "id": "call-999",
                            "result": {"orphan": true},
                        }));
                    }

                    let input = request
                        .pointer("/params/input")
                        .cloned()
                        .unwrap_or(Value::Null);

                    match &script.execute {
                        ExecuteBehavior::EchoInput => {
                            out.push(json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": {"echo": input},
                            }));
                        }
                        ExecuteBehavior::Fail { code, message } => {
                            out.push(json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "error": {"code": code, "message": message, "data": {"retryable": false}},
                            }));
                        }
                        ExecuteBehavior::Ignore => {}
                        ExecuteBehavior::ReversePairs => {
                            held.push(json!({
                                "jsonrpc": "2.0",
                                "id": id,
                                "result": {"echo": input},
                            }));
                            if held.len() == 2 {
                                // Latest arrival answered first.
                                while let Some(response) = held.pop() {
                                    out.push(response);
                                }
                            }
                        }
                    }
                }
                _ => {}
            }

            for response in out {
                let mut bytes = serde_json::to_vec(&response).unwrap();
                bytes.push(b'\n');
                if write_half.write_all(&bytes).await.is_err() {
                    return;
                }
            }
        }
    });

    counter
}

/// Attach a session to a scripted worker with the default configuration.
pub async fn scripted_session(script: WorkerScript) -> (Session, Arc<AtomicUsize>) {
    scripted_session_with(SessionConfig::for_worker("scripted-worker", vec![]), script).await
}

/// Attach a session to a scripted worker with a custom configuration.
pub async fn scripted_session_with(
    config: SessionConfig,
    script: WorkerScript,
) -> (Session, Arc<AtomicUsize>) {
    let (client_io, server_io) = duplex(64 * 1024);
    let counter = start_scripted_worker(server_io, script);

    let (read_half, write_half) = tokio::io::split(client_io);
    let session = Session::attach(config, read_half, write_half)
        .await
        .expect("session attach must succeed");

    (session, counter)
}
