//! Runtime API server endpoints.
//!
//! Implements the four endpoints a Lambda runtime speaks, backed by an
//! in-process queue: `invocation/next` long-polls the queue, the response
//! and error endpoints resolve the invocation currently in flight, and
//! `init/error` records initialization failures for inspection.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error};

use crate::invocation::{InitErrorRecord, InvocationOutcome, QueuedInvocation};

/// State shared by the Runtime API endpoints.
pub struct RuntimeApiState {
    /// Channel the simulator enqueues invocations on.
    queue_rx: RwLock<mpsc::Receiver<QueuedInvocation>>,
    /// The invocation delivered to the runtime but not yet resolved.
    in_flight: RwLock<Option<InFlightInvocation>>,
    /// Errors reported to `init/error`.
    init_errors: Mutex<Vec<InitErrorRecord>>,
}

struct InFlightInvocation {
    request_id: String,
    outcome_tx: Option<oneshot::Sender<InvocationOutcome>>,
}

impl RuntimeApiState {
    pub fn new(queue_rx: mpsc::Receiver<QueuedInvocation>) -> Self {
        Self {
            queue_rx: RwLock::new(queue_rx),
            in_flight: RwLock::new(None),
            init_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn init_errors(&self) -> Vec<InitErrorRecord> {
        self.init_errors.lock().clone()
    }
}

/// Create the Runtime API router.
pub fn runtime_api_router(state: Arc<RuntimeApiState>) -> Router {
    Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(get_next_invocation),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(post_invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(post_invocation_error),
        )
        .route("/2018-06-01/runtime/init/error", post(post_init_error))
        .with_state(state)
}

/// GET /runtime/invocation/next
///
/// Blocks until an invocation is available, then delivers it with its
/// metadata headers.
async fn get_next_invocation(State(state): State<Arc<RuntimeApiState>>) -> impl IntoResponse {
    debug!("Runtime requesting next invocation");

    let invocation = {
        let mut rx = state.queue_rx.write().await;
        match rx.recv().await {
            Some(invocation) => invocation,
            None => {
                return Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from("Invocation queue closed"))
                    .unwrap();
            }
        }
    };

    {
        let mut in_flight = state.in_flight.write().await;
        *in_flight = Some(InFlightInvocation {
            request_id: invocation.request_id.clone(),
            outcome_tx: invocation.outcome_tx,
        });
    }

    debug!(request_id = %invocation.request_id, "Delivering invocation to runtime");

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header("Lambda-Runtime-Aws-Request-Id", &invocation.request_id)
        .header(
            "Lambda-Runtime-Invoked-Function-Arn",
            &invocation.function_arn,
        )
        .header(
            "Lambda-Runtime-Deadline-Ms",
            invocation.deadline_ms.to_string(),
        );
    if let Some(trace_id) = &invocation.trace_id {
        response = response.header("Lambda-Runtime-Trace-Id", trace_id);
    }
    if let Some(client_context) = &invocation.client_context {
        response = response.header("Lambda-Runtime-Client-Context", client_context);
    }
    if let Some(cognito_identity) = &invocation.cognito_identity {
        response = response.header("Lambda-Runtime-Cognito-Identity", cognito_identity);
    }

    response.body(Body::from(invocation.payload)).unwrap()
}

/// POST /runtime/invocation/{request_id}/response
async fn post_invocation_response(
    State(state): State<Arc<RuntimeApiState>>,
    Path(request_id): Path<String>,
    body: Bytes,
) -> impl IntoResponse {
    debug!(request_id = %request_id, "Runtime posting response");

    resolve(
        &state,
        &request_id,
        InvocationOutcome::Response { payload: body },
    )
    .await
}

/// POST /runtime/invocation/{request_id}/error
async fn post_invocation_error(
    State(state): State<Arc<RuntimeApiState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Recorded verbatim so tests can assert on what the runtime actually
    // sent; an omitted header becomes the empty string.
    let error_type = headers
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    debug!(request_id = %request_id, error_type = %error_type, "Runtime posting error");

    resolve(
        &state,
        &request_id,
        InvocationOutcome::Error {
            error_type,
            payload: body,
        },
    )
    .await
}

async fn resolve(
    state: &RuntimeApiState,
    request_id: &str,
    outcome: InvocationOutcome,
) -> StatusCode {
    let mut in_flight = state.in_flight.write().await;

    match in_flight.take() {
        Some(invocation) if invocation.request_id == request_id => {
            if let Some(tx) = invocation.outcome_tx {
                let _ = tx.send(outcome);
            }
            StatusCode::ACCEPTED
        }
        Some(invocation) => {
            error!(
                expected = %invocation.request_id,
                received = %request_id,
                "Request ID mismatch"
            );
            // Put the invocation back; the runtime may still resolve it.
            *in_flight = Some(invocation);
            StatusCode::BAD_REQUEST
        }
        None => {
            error!(request_id = %request_id, "No invocation in flight");
            StatusCode::BAD_REQUEST
        }
    }
}

/// POST /runtime/init/error
async fn post_init_error(
    State(state): State<Arc<RuntimeApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let error_type = headers
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    error!(
        error_type = %error_type,
        body = %String::from_utf8_lossy(&body),
        "Runtime initialization error"
    );

    state.init_errors.lock().push(InitErrorRecord {
        error_type,
        payload: body,
    });

    StatusCode::ACCEPTED
}
