//! Client runtime for the AWS Lambda Runtime API.
//!
//! Lampion polls the Runtime API for invocations, hands each event to a
//! typed handler function, and reports the outcome back to the platform.
//! Handlers come in three shapes (`f(event, ctx)`, `f(event)`, `f()`); the
//! adapter constructors in [`handler`] pick the shape at compile time.
//!
//! ```no_run
//! use lampion_runtime::{handler_fn, BootstrapError, BoxError, Context};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), BootstrapError> {
//!     lampion_runtime::run(handler_fn(greet)).await
//! }
//!
//! async fn greet(name: String, _ctx: Context) -> Result<String, BoxError> {
//!     Ok(format!("Hello, {name}!"))
//! }
//! ```
//!
//! The loop is strictly sequential: one invocation is polled, handled, and
//! reported before the next poll is issued. Handler failures are reported to
//! the invocation's error endpoint and the loop continues; failures to reach
//! the Runtime API itself are fatal.

pub mod bootstrap;
pub mod client;
pub mod context;
pub mod env;
pub mod error;
pub mod handler;
pub mod log;
pub mod serializer;
pub mod snapstart;

pub use bootstrap::{report_init_error, Bootstrap};
pub use context::{
    ClientApplication, ClientContext, CognitoIdentity, Context, RuntimeApiHeaders,
};
pub use env::{InitializationType, LambdaEnvironment};
pub use error::{BootstrapError, BoxError, ErrorReport, InvocationError};
pub use handler::{
    event_handler_fn, handler_fn, unit_handler_fn, Handler, NoEvent, WrappedHandler,
};
pub use log::LogSink;
pub use serializer::{JsonSerializer, PayloadSerializer};
pub use snapstart::WarmupRegistry;

/// Reads the environment the platform provides, wires the JSON serializer,
/// and runs the bootstrap loop until the Runtime API becomes unreachable.
///
/// The returned error is fatal by definition; `main` should propagate it so
/// the process exits and the platform recycles the execution environment.
pub async fn run<H, Event, Output>(handler: H) -> Result<(), BootstrapError>
where
    H: Handler<Event, Output>,
    Event: serde::de::DeserializeOwned,
    Output: serde::Serialize,
{
    let env = LambdaEnvironment::from_env()?;
    let bootstrap = Bootstrap::new(env, handler, JsonSerializer);
    bootstrap.run().await.map_err(|err| {
        tracing::error!(%err, "Bootstrap loop terminated");
        err
    })
}
