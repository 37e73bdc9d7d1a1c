//! Integration tests for the worker process transport over real processes.
//!
//! Uses `sh` as a stand-in worker: the counting script answers request N
//! with identifier `call-N`, which matches the client's monotonic issuance
//! and lets a full launch/handshake/execute/teardown cycle run against an
//! actual child process.

use serde_json::json;

use toolwire::rpc::spawner::spawn_worker;
use toolwire::{AppError, Session, SessionConfig};

/// Answers every request line with a result carrying the matching id.
const COUNTING_WORKER: &str = r#"n=0; while IFS= read -r line; do n=$((n+1)); printf '{"jsonrpc":"2.0","id":"call-%d","result":{"tools":[]}}\n' "$n"; done"#;

fn sh_worker(script: &str) -> SessionConfig {
    SessionConfig::for_worker("sh", vec!["-c".into(), script.into()])
}

#[tokio::test]
async fn missing_binary_fails_with_a_transport_error() {
    let err = spawn_worker("toolwire-no-such-binary", &[]).expect_err("spawn must fail");
    assert!(matches!(err, AppError::Transport(_)));
}

#[tokio::test]
async fn spawned_worker_exposes_its_stdio() {
    let conn = spawn_worker("cat", &[]).expect("spawning cat must succeed");
    // Handles were captured; kill_on_drop reaps the child.
    drop(conn);
}

#[tokio::test]
async fn session_over_a_real_process_completes_the_handshake() {
    let session = Session::launch(sh_worker(COUNTING_WORKER))
        .await
        .expect("launch must succeed");

    assert!(session.tools().await.is_empty(), "script advertises no tools");

    let result = session
        .execute_tool("anything", json!({"x": 1}))
        .await
        .expect("execute must succeed");
    assert_eq!(result, json!({"tools": []}));

    session.shutdown().await;
}

#[tokio::test]
async fn termination_is_idempotent_and_blocks_new_calls() {
    let session = Session::launch(sh_worker(COUNTING_WORKER))
        .await
        .expect("launch must succeed");

    session.shutdown().await;
    session.shutdown().await;
    assert!(session.is_terminated());

    let err = session
        .execute_tool("anything", json!({}))
        .await
        .expect_err("calls after termination must fail");
    assert!(matches!(err, AppError::Transport(_)));
}

#[tokio::test]
async fn worker_exit_during_handshake_fails_the_launch() {
    // The script consumes the initialize request and exits without answering;
    // stdout EOF tears the session down and abandons the pending call.
    let err = Session::launch(sh_worker("read line; exit 0"))
        .await
        .expect_err("launch must fail when the worker dies mid-handshake");

    assert!(matches!(
        err,
        AppError::SessionTerminated(_) | AppError::Transport(_)
    ));
}
