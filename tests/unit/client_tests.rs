//! Unit tests for call issuance failure paths in [`RpcClient`].
//!
//! Covers:
//! - a call on a terminated session fails immediately without registering
//! - a call with a closed outbound channel fails with a transport error and
//!   leaves no pending entry behind
//! - correlation identifiers increase monotonically

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use toolwire::rpc::correlation::CorrelationTable;
use toolwire::rpc::RpcClient;
use toolwire::AppError;

fn client_with(
    capacity: usize,
    cancel: CancellationToken,
) -> (RpcClient, CorrelationTable, mpsc::Receiver<toolwire::rpc::message::Request>) {
    let table = CorrelationTable::new();
    let (tx, rx) = mpsc::channel(capacity);
    let client = RpcClient::new("test-session".into(), tx, table.clone(), None, cancel);
    (client, table, rx)
}

#[tokio::test]
async fn call_on_terminated_session_fails_without_registering() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (client, table, _rx) = client_with(8, cancel);

    let err = client
        .call("tools/execute", json!({}))
        .await
        .expect_err("call on a terminated session must fail");

    assert!(matches!(err, AppError::Transport(_)));
    assert_eq!(
        table.pending_count().await,
        0,
        "the call must never reach the correlation table"
    );
}

#[tokio::test]
async fn call_with_closed_outbound_channel_fails_and_cleans_up() {
    let cancel = CancellationToken::new();
    let (client, table, rx) = client_with(8, cancel);
    drop(rx); // Writer task gone: stdin closed.

    let err = client
        .call("tools/execute", json!({}))
        .await
        .expect_err("call with a closed channel must fail");

    assert!(matches!(err, AppError::Transport(_)));
    assert_eq!(
        table.pending_count().await,
        0,
        "the failed call must not leave a pending entry"
    );
}

#[tokio::test]
async fn identifiers_are_monotonic_and_unique() {
    let cancel = CancellationToken::new();
    let (client, _table, mut rx) = client_with(8, cancel);

    // Issue two calls without awaiting their replies.
    let c = std::sync::Arc::new(client);
    let c1 = std::sync::Arc::clone(&c);
    let h1 = tokio::spawn(async move { c1.call("tools/list", json!({})).await });
    let first = rx.recv().await.expect("first request on the wire");
    let c2 = std::sync::Arc::clone(&c);
    let h2 = tokio::spawn(async move { c2.call("tools/list", json!({})).await });
    let second = rx.recv().await.expect("second request on the wire");

    assert_eq!(first.id, "call-1");
    assert_eq!(second.id, "call-2");
    assert_ne!(first.id, second.id);

    h1.abort();
    h2.abort();
}
