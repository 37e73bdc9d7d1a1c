//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Structured error object returned by the worker inside a response.
///
/// Distinct from [`AppError::Transport`]: a `WorkerError` means the call
/// reached the worker and the worker answered with a protocol-level error.
/// Results carrying a `WorkerError` are never cached.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkerError {
    /// Machine-readable error code (e.g. `-32602` for invalid params).
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Optional method-specific error payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Display for WorkerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)
    }
}

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Worker process spawn failure or closed stdio stream.
    Transport(String),
    /// Line framing failure (oversized or undecodable line).
    Framing(String),
    /// Protocol misuse on the client side (duplicate identifier,
    /// serialization failure).
    Rpc(String),
    /// Structured error object relayed from the worker.
    Worker(WorkerError),
    /// Call abandoned because the session was torn down while it was
    /// outstanding.
    SessionTerminated(String),
    /// Per-call timeout elapsed before a matching response arrived.
    Timeout(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Framing(msg) => write!(f, "framing: {msg}"),
            Self::Rpc(msg) => write!(f, "rpc: {msg}"),
            Self::Worker(err) => write!(f, "worker: {err}"),
            Self::SessionTerminated(msg) => write!(f, "session terminated: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
