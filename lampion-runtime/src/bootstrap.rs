//! The poll/invoke/report loop.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::client::{NextInvocation, RuntimeApiClient};
use crate::context::Context;
use crate::env::{InitializationType, LambdaEnvironment};
use crate::error::{BootstrapError, ErrorReport, ERROR_TYPE_INIT};
use crate::handler::{Handler, WrappedHandler};
use crate::serializer::PayloadSerializer;
use crate::snapstart::WarmupRegistry;

/// Drives the poll/invoke/report cycle against the Runtime API.
///
/// Exactly one invocation is in flight at a time: the handler is awaited to
/// completion and its outcome posted before the next poll is issued.
pub struct Bootstrap<H, S, Event, Output> {
    client: RuntimeApiClient,
    env: Arc<LambdaEnvironment>,
    handler: WrappedHandler<H, S, Event, Output>,
    pre_invoke: Option<Bytes>,
    warmup: WarmupRegistry,
}

impl<H, S, Event, Output> Bootstrap<H, S, Event, Output>
where
    H: Handler<Event, Output>,
    S: PayloadSerializer,
    Event: DeserializeOwned,
    Output: Serialize,
{
    pub fn new(env: LambdaEnvironment, handler: H, serializer: S) -> Self {
        let client = RuntimeApiClient::new(&env.runtime_api);
        Self {
            client,
            env: Arc::new(env),
            handler: WrappedHandler::new(handler, serializer),
            pre_invoke: None,
            warmup: WarmupRegistry::default(),
        }
    }

    /// Registers a single payload invoked once before the loop starts,
    /// independent of SnapStart. The result is discarded; this exists to
    /// touch cold code paths ahead of the first real invocation.
    pub fn with_pre_invoke(mut self, payload: impl Into<Bytes>) -> Self {
        self.pre_invoke = Some(payload.into());
        self
    }

    /// Registers warm-up payloads replayed under SnapStart initialization
    /// before the snapshot is taken.
    pub fn with_warmup(mut self, warmup: WarmupRegistry) -> Self {
        self.warmup = warmup;
        self
    }

    /// Runs pre-initialization, then polls for invocations until the
    /// Runtime API becomes unreachable.
    ///
    /// Per-invocation failures are reported to the invocation's error
    /// endpoint and the loop continues; only runtime-API failures end the
    /// loop. Callers should treat an `Err` as fatal and exit.
    pub async fn run(mut self) -> Result<(), BootstrapError> {
        self.pre_initialize().await;

        info!(
            function = %self.env.function_name,
            version = %self.env.function_version,
            "Entering invocation loop"
        );
        loop {
            let invocation = self.client.next_invocation().await?;
            self.handle(invocation).await?;
        }
    }

    /// Warm-up work performed before the first poll. Failures here are
    /// logged and swallowed; they must not block the snapshot or the loop.
    async fn pre_initialize(&mut self) {
        if let Some(payload) = self.pre_invoke.take() {
            let ctx = Context::warmup(self.env.clone(), "pre-invoke");
            if let Err(err) = self.handler.invoke(payload, ctx).await {
                warn!(%err, "Pre-invoke warm-up failed");
            }
        }

        if self.env.initialization_type == InitializationType::SnapStart && !self.warmup.is_empty()
        {
            info!(
                replay_count = self.warmup.replay_count(),
                "Replaying warm-up payloads before snapshot"
            );
            self.warmup.replay(&mut self.handler, &self.env).await;
        }
    }

    async fn handle(&mut self, invocation: NextInvocation) -> Result<(), BootstrapError> {
        let NextInvocation { headers, payload } = invocation;
        let request_id = headers.request_id.clone();

        if let Some(trace_id) = &headers.trace_id {
            self.env.propagate_trace_id(trace_id);
        }
        let ctx = Context::new(headers, self.env.clone());

        match self.handler.invoke(payload, ctx).await {
            Ok(response) => self.client.post_response(&request_id, response).await,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    error_type = %err.error_type,
                    "Handler invocation failed"
                );
                self.client
                    .post_invocation_error(&request_id, &err.error_type, &err.report)
                    .await
            }
        }
    }
}

/// Reports a failure that occurred while constructing the handler, before a
/// [`Bootstrap`] could start. The platform tears the execution environment
/// down after this call, so callers should exit once it returns.
pub async fn report_init_error(
    env: &LambdaEnvironment,
    message: &str,
) -> Result<(), BootstrapError> {
    let client = RuntimeApiClient::new(&env.runtime_api);
    let report = ErrorReport::new(ERROR_TYPE_INIT, message);
    client.post_init_error(ERROR_TYPE_INIT, &report).await
}
