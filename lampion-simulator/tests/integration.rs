//! Integration tests for the Runtime API simulator.
//!
//! These drive the endpoints over real HTTP, the way a runtime client
//! would.

use std::time::Duration;

use lampion_simulator::{InvocationBuilder, InvocationOutcome, Simulator};

fn next_url(simulator: &Simulator) -> String {
    format!("{}/2018-06-01/runtime/invocation/next", simulator.url())
}

fn response_url(simulator: &Simulator, request_id: &str) -> String {
    format!(
        "{}/2018-06-01/runtime/invocation/{}/response",
        simulator.url(),
        request_id
    )
}

fn error_url(simulator: &Simulator, request_id: &str) -> String {
    format!(
        "{}/2018-06-01/runtime/invocation/{}/error",
        simulator.url(),
        request_id
    )
}

#[tokio::test]
async fn test_next_delivers_payload_and_headers() {
    let simulator = Simulator::start().await.unwrap();
    let request_id = simulator
        .enqueue(
            InvocationBuilder::new(r#"{"n":1}"#)
                .trace_id("Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700"),
        )
        .await
        .unwrap();

    let response = reqwest::get(next_url(&simulator)).await.unwrap();

    assert_eq!(response.status(), 200);
    let headers = response.headers().clone();
    assert_eq!(headers["Lambda-Runtime-Aws-Request-Id"], request_id.as_str());
    assert_eq!(
        headers["Lambda-Runtime-Trace-Id"],
        "Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700"
    );
    let deadline_ms: i64 = headers["Lambda-Runtime-Deadline-Ms"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(deadline_ms > chrono::Utc::now().timestamp_millis());

    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], br#"{"n":1}"#);
}

#[tokio::test]
async fn test_response_post_resolves_outcome() {
    let simulator = Simulator::start().await.unwrap();
    let request_id = simulator.enqueue_payload("{}").await.unwrap();

    let client = reqwest::Client::new();
    reqwest::get(next_url(&simulator)).await.unwrap();

    let post = client
        .post(response_url(&simulator, &request_id))
        .body(r#"{"ok":true}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);

    let outcome = simulator
        .wait_for_outcome(&request_id, Duration::from_secs(1))
        .await
        .unwrap();
    match outcome {
        InvocationOutcome::Response { payload } => assert_eq!(&payload[..], br#"{"ok":true}"#),
        InvocationOutcome::Error { .. } => panic!("expected a success outcome"),
    }
}

#[tokio::test]
async fn test_error_post_records_header_verbatim() {
    let simulator = Simulator::start().await.unwrap();
    let request_id = simulator.enqueue_payload("{}").await.unwrap();

    let client = reqwest::Client::new();
    reqwest::get(next_url(&simulator)).await.unwrap();

    let post = client
        .post(error_url(&simulator, &request_id))
        .header("Lambda-Runtime-Function-Error-Type", "Runtime.UnhandledError")
        .body(r#"{"errorMessage":"boom","errorType":"Runtime.UnhandledError"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);

    let outcome = simulator
        .wait_for_outcome(&request_id, Duration::from_secs(1))
        .await
        .unwrap();
    match outcome {
        InvocationOutcome::Error {
            error_type,
            payload,
        } => {
            assert_eq!(error_type, "Runtime.UnhandledError");
            let report: serde_json::Value = serde_json::from_slice(&payload).unwrap();
            assert_eq!(report["errorMessage"], "boom");
        }
        InvocationOutcome::Response { .. } => panic!("expected an error outcome"),
    }
}

#[tokio::test]
async fn test_request_id_mismatch_is_rejected() {
    let simulator = Simulator::start().await.unwrap();
    let request_id = simulator.enqueue_payload("{}").await.unwrap();

    let client = reqwest::Client::new();
    reqwest::get(next_url(&simulator)).await.unwrap();

    let mismatched = client
        .post(response_url(&simulator, "not-the-request-id"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(mismatched.status(), 400);

    // The invocation is still in flight and can be resolved correctly.
    let post = client
        .post(response_url(&simulator, &request_id))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);
}

#[tokio::test]
async fn test_post_without_in_flight_invocation_is_rejected() {
    let simulator = Simulator::start().await.unwrap();

    let post = reqwest::Client::new()
        .post(response_url(&simulator, "req-0"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 400);
}

#[tokio::test]
async fn test_init_error_is_recorded() {
    let simulator = Simulator::start().await.unwrap();

    let post = reqwest::Client::new()
        .post(format!("{}/2018-06-01/runtime/init/error", simulator.url()))
        .header("Lambda-Runtime-Function-Error-Type", "Runtime.InitError")
        .body(r#"{"errorMessage":"no database","errorType":"Runtime.InitError"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);

    let errors = simulator.init_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, "Runtime.InitError");
}
