//! Unit tests for error display formats and variant distinctions.

use serde_json::json;

use toolwire::errors::WorkerError;
use toolwire::AppError;

#[test]
fn transport_error_display_starts_with_transport_prefix() {
    let err = AppError::Transport("worker stdin closed".into());
    assert_eq!(err.to_string(), "transport: worker stdin closed");
}

#[test]
fn worker_error_display_carries_code_and_message() {
    let err = AppError::Worker(WorkerError {
        code: -32602,
        message: "missing required parameter 'state'".into(),
        data: None,
    });
    assert_eq!(
        err.to_string(),
        "worker: code -32602: missing required parameter 'state'"
    );
}

#[test]
fn session_terminated_display() {
    let err = AppError::SessionTerminated("session terminated".into());
    assert!(err.to_string().starts_with("session terminated:"));
}

#[test]
fn worker_failure_is_distinct_from_transport_failure() {
    let worker = AppError::Worker(WorkerError {
        code: 1,
        message: "boom".into(),
        data: None,
    });
    let transport = AppError::Transport("boom".into());
    assert_ne!(worker.to_string(), transport.to_string());
}

#[test]
fn io_error_converts_to_app_error() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
    assert!(err.to_string().starts_with("io:"));
}

#[test]
fn worker_error_roundtrips_through_json() {
    let original = WorkerError {
        code: -32000,
        message: "value out of range".into(),
        data: Some(json!({"field": "days", "max": 7})),
    };

    let encoded = serde_json::to_value(&original).expect("serialize");
    let decoded: WorkerError = serde_json::from_value(encoded).expect("deserialize");

    assert_eq!(decoded, original);
}

#[test]
fn worker_error_without_data_omits_the_field() {
    let err = WorkerError {
        code: 1,
        message: "no data".into(),
        data: None,
    };
    let encoded = serde_json::to_value(&err).expect("serialize");
    assert!(
        encoded.get("data").is_none(),
        "absent data must not serialize as null"
    );
}

#[test]
fn app_error_implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Rpc("x".into()));
}
