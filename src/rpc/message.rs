//! Wire message shapes for the worker protocol.
//!
//! The worker speaks JSON-RPC 2.0 over newline-delimited JSON: one message
//! per line, requests and responses correlated solely by identifier equality.
//! Response identifiers may arrive as JSON strings or numbers; both forms
//! correlate against the string keys used by the
//! [`CorrelationTable`](crate::rpc::correlation::CorrelationTable).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::WorkerError;

/// Protocol tag carried by every request and response.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision advertised during the `initialize` handshake.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method name for the session handshake.
pub const METHOD_INITIALIZE: &str = "initialize";

/// Method name for capability discovery.
pub const METHOD_LIST_TOOLS: &str = "tools/list";

/// Method name for invoking a named tool.
pub const METHOD_EXECUTE_TOOL: &str = "tools/execute";

/// Outbound request (client → worker).
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Protocol tag, always [`JSONRPC_VERSION`].
    pub jsonrpc: &'static str,
    /// Correlation identifier, unique among currently pending calls.
    pub id: String,
    /// Method name.
    pub method: String,
    /// Method parameters, forwarded verbatim.
    pub params: Value,
}

impl Request {
    /// Build a request for `method` with the given correlation identifier.
    #[must_use]
    pub fn new(id: String, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.to_owned(),
            params,
        }
    }
}

/// Inbound response (worker → client).
///
/// Exactly one of `result` / `error` is expected to be present; a response
/// carrying `error` is delivered to the caller as a failed result.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Correlation identifier echoing the request. String or number.
    pub id: Option<Value>,
    /// Success payload.
    pub result: Option<Value>,
    /// Structured failure relayed from the worker.
    pub error: Option<WorkerError>,
}

/// Capability descriptor returned by the worker's `tools/list`.
///
/// The client treats the surface as opaque: parameters are forwarded
/// verbatim and never validated here.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    /// Tool name, used as the `name` parameter of `tools/execute`.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Parameter schema, opaque to the client.
    #[serde(default)]
    pub parameters: Value,
}

/// Result payload of `tools/list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolListing {
    /// Tools exposed by the worker.
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// Normalize a response identifier into the table's string key form.
///
/// JSON-RPC permits string and numeric identifiers; the client only issues
/// strings, but a worker echoing `7` and one echoing `"7"` both correlate.
/// Returns `None` for identifiers of any other JSON type.
#[must_use]
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
