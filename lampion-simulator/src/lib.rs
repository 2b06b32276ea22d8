//! Local AWS Lambda Runtime API simulator.
//!
//! Implements the server side of the Runtime API so a runtime client can be
//! exercised without an execution environment: invocations are enqueued
//! in-process, delivered via long-polling on `invocation/next`, and their
//! outcomes recorded for inspection.
//!
//! ```no_run
//! use std::time::Duration;
//! use lampion_simulator::Simulator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let simulator = Simulator::start().await?;
//! // Point AWS_LAMBDA_RUNTIME_API at simulator.endpoint(), start the
//! // runtime under test, then:
//! let request_id = simulator.enqueue_payload(r#"{"hello":"world"}"#).await?;
//! let outcome = simulator
//!     .wait_for_outcome(&request_id, Duration::from_secs(5))
//!     .await?;
//! assert!(!outcome.is_error());
//! # Ok(())
//! # }
//! ```
//!
//! Endpoints served:
//!
//! - `GET  /2018-06-01/runtime/invocation/next` (long-poll)
//! - `POST /2018-06-01/runtime/invocation/{request_id}/response`
//! - `POST /2018-06-01/runtime/invocation/{request_id}/error`
//! - `POST /2018-06-01/runtime/init/error`

pub mod invocation;
pub mod server;
pub mod simulator;

pub use invocation::{InitErrorRecord, InvocationOutcome, QueuedInvocation};
pub use server::{runtime_api_router, RuntimeApiState};
pub use simulator::{InvocationBuilder, Simulator, SimulatorError};
