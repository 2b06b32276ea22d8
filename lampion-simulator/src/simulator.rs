//! In-process simulator surface used by tests and the CLI.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::invocation::{InitErrorRecord, InvocationOutcome, QueuedInvocation};
use crate::server::{runtime_api_router, RuntimeApiState};

/// Queue depth before `enqueue` applies backpressure.
const QUEUE_CAPACITY: usize = 64;

/// Default invocation deadline handed to the runtime.
const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("Simulator server is no longer running")]
    ServerGone,

    #[error("Unknown request id: {0}")]
    UnknownRequestId(String),

    #[error("Invocation dropped before an outcome was posted")]
    OutcomeDropped,

    #[error("No outcome within {0:?}")]
    Timeout(Duration),
}

/// Builds an invocation with custom metadata before enqueueing.
pub struct InvocationBuilder {
    payload: Bytes,
    deadline: Duration,
    function_arn: String,
    trace_id: Option<String>,
    client_context: Option<String>,
    cognito_identity: Option<String>,
}

impl InvocationBuilder {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            deadline: DEFAULT_DEADLINE,
            function_arn: "arn:aws:lambda:us-east-1:000000000000:function:simulated".to_string(),
            trace_id: None,
            client_context: None,
            cognito_identity: None,
        }
    }

    /// How long the runtime gets before the deadline header expires.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn function_arn(mut self, arn: impl Into<String>) -> Self {
        self.function_arn = arn.into();
        self
    }

    pub fn trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Raw JSON for the `Lambda-Runtime-Client-Context` header.
    pub fn client_context(mut self, json: impl Into<String>) -> Self {
        self.client_context = Some(json.into());
        self
    }

    /// Raw JSON for the `Lambda-Runtime-Cognito-Identity` header.
    pub fn cognito_identity(mut self, json: impl Into<String>) -> Self {
        self.cognito_identity = Some(json.into());
        self
    }
}

/// A running Runtime API simulator bound to a local port.
///
/// Invocations are enqueued here and delivered to whichever runtime polls
/// `invocation/next`; outcomes are recorded per request id for assertions.
pub struct Simulator {
    addr: SocketAddr,
    queue_tx: mpsc::Sender<QueuedInvocation>,
    pending: Mutex<HashMap<String, oneshot::Receiver<InvocationOutcome>>>,
    state: Arc<RuntimeApiState>,
    server: JoinHandle<()>,
}

impl Simulator {
    /// Starts a simulator on an ephemeral localhost port.
    pub async fn start() -> Result<Self, SimulatorError> {
        Self::bind("127.0.0.1", 0).await
    }

    /// Starts a simulator on the given host and port (0 picks a free port).
    pub async fn bind(host: &str, port: u16) -> Result<Self, SimulatorError> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let state = Arc::new(RuntimeApiState::new(queue_rx));
        let router = runtime_api_router(state.clone());

        let server = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                tracing::error!(%err, "Simulator server exited");
            }
        });

        info!(addr = %addr, "Runtime API simulator listening");

        Ok(Self {
            addr,
            queue_tx,
            pending: Mutex::new(HashMap::new()),
            state,
            server,
        })
    }

    /// The `host:port` value a runtime should use as
    /// `AWS_LAMBDA_RUNTIME_API`.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Base URL of the simulator.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Enqueues an invocation with default metadata.
    pub async fn enqueue_payload(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<String, SimulatorError> {
        self.enqueue(InvocationBuilder::new(payload)).await
    }

    /// Enqueues a built invocation and returns its request id.
    pub async fn enqueue(&self, builder: InvocationBuilder) -> Result<String, SimulatorError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let deadline_ms =
            Utc::now().timestamp_millis() + i64::try_from(builder.deadline.as_millis()).unwrap_or(i64::MAX);

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let invocation = QueuedInvocation {
            request_id: request_id.clone(),
            function_arn: builder.function_arn,
            payload: builder.payload,
            deadline_ms,
            trace_id: builder.trace_id,
            client_context: builder.client_context,
            cognito_identity: builder.cognito_identity,
            outcome_tx: Some(outcome_tx),
        };

        self.pending.lock().insert(request_id.clone(), outcome_rx);
        self.queue_tx
            .send(invocation)
            .await
            .map_err(|_| SimulatorError::ServerGone)?;

        Ok(request_id)
    }

    /// Awaits the outcome the runtime posts for a request id.
    pub async fn wait_for_outcome(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<InvocationOutcome, SimulatorError> {
        let outcome_rx = self
            .pending
            .lock()
            .remove(request_id)
            .ok_or_else(|| SimulatorError::UnknownRequestId(request_id.to_string()))?;

        match tokio::time::timeout(timeout, outcome_rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(SimulatorError::OutcomeDropped),
            Err(_) => Err(SimulatorError::Timeout(timeout)),
        }
    }

    /// Errors the runtime reported to `init/error`.
    pub fn init_errors(&self) -> Vec<InitErrorRecord> {
        self.state.init_errors()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.server.abort();
    }
}
