//! JSON-RPC stream handling for the worker process.
//!
//! This module owns the wire loop between the session and its worker: a
//! writer task serializing outbound requests to the worker's stdin, a reader
//! task framing and decoding the worker's stdout, and a correlation table
//! that matches each decoded response back to the caller awaiting it.
//!
//! Submodules:
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based framing for
//!   newline-delimited JSON messages.
//! - `message`: outbound request and inbound response wire shapes.
//! - `correlation`: registry of outstanding calls keyed by identifier.
//! - `reader`: async read task that decodes responses and resolves the table.
//! - `writer`: async write task that serializes outbound requests.
//! - `spawner`: worker process spawning, stderr capture, and exit monitoring.
//! - `client`: call issuance, identifier generation, and response awaiting.

pub mod client;
pub mod codec;
pub mod correlation;
pub mod message;
pub mod reader;
pub mod spawner;
pub mod writer;

pub use client::RpcClient;
pub use correlation::CorrelationTable;
