//! SnapStart warm-up replay.
//!
//! Before the platform checkpoints a SnapStart execution environment, the
//! hosting application can register representative payloads to be replayed
//! through the full handler pipeline, forcing lazy initialization (code
//! paths, connection pools, caches) to happen ahead of the snapshot.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::Context;
use crate::env::LambdaEnvironment;
use crate::handler::{Handler, WrappedHandler};
use crate::serializer::PayloadSerializer;

/// Default number of times each registered payload is replayed.
pub const DEFAULT_REPLAY_COUNT: usize = 5;

/// Representative payloads replayed before a SnapStart snapshot is taken.
#[derive(Debug, Clone)]
pub struct WarmupRegistry {
    payloads: Vec<Bytes>,
    replay_count: usize,
}

impl Default for WarmupRegistry {
    fn default() -> Self {
        Self {
            payloads: Vec::new(),
            replay_count: DEFAULT_REPLAY_COUNT,
        }
    }
}

impl WarmupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a payload to replay before the snapshot.
    pub fn register(mut self, payload: impl Into<Bytes>) -> Self {
        self.payloads.push(payload.into());
        self
    }

    /// Overrides how many times each payload is replayed.
    pub fn with_replay_count(mut self, count: usize) -> Self {
        self.replay_count = count;
        self
    }

    pub fn replay_count(&self) -> usize {
        self.replay_count
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Replays every registered payload `replay_count` times, sequentially.
    ///
    /// Replay failures are logged and swallowed: a failed warm-up pass must
    /// not prevent the snapshot from being taken.
    pub(crate) async fn replay<H, S, Event, Output>(
        &self,
        handler: &mut WrappedHandler<H, S, Event, Output>,
        env: &Arc<LambdaEnvironment>,
    ) where
        H: Handler<Event, Output>,
        S: PayloadSerializer,
        Event: DeserializeOwned,
        Output: Serialize,
    {
        for (index, payload) in self.payloads.iter().enumerate() {
            for round in 0..self.replay_count {
                let ctx = Context::warmup(env.clone(), &format!("warmup-{index}-{round}"));
                match handler.invoke(payload.clone(), ctx).await {
                    Ok(_) => debug!(index, round, "Warm-up replay complete"),
                    Err(err) => warn!(index, round, %err, "Warm-up replay failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::BoxError;
    use crate::handler::{event_handler_fn, WrappedHandler};
    use crate::serializer::JsonSerializer;

    #[tokio::test]
    async fn test_each_payload_replayed_default_five_times() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();
        let mut wrapped = WrappedHandler::new(
            event_handler_fn(move |n: u32| {
                let calls = handler_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, BoxError>(n)
                }
            }),
            JsonSerializer,
        );

        let env = Arc::new(LambdaEnvironment::default());
        let warmup = WarmupRegistry::new().register("1").register("2");
        warmup.replay(&mut wrapped, &env).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2 * DEFAULT_REPLAY_COUNT);
    }

    #[tokio::test]
    async fn test_replay_count_configurable_and_failures_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = calls.clone();
        let mut wrapped = WrappedHandler::new(
            event_handler_fn(move |_: u32| {
                let calls = handler_calls.clone();
                async move {
                    // Every other replay fails; the pass must keep going.
                    if calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                        return Err::<u32, BoxError>("warm-up failure".into());
                    }
                    Ok(0)
                }
            }),
            JsonSerializer,
        );

        let env = Arc::new(LambdaEnvironment::default());
        let warmup = WarmupRegistry::new().register("1").with_replay_count(3);
        warmup.replay(&mut wrapped, &env).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
