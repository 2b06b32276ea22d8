//! Error taxonomy for the bootstrap loop.
//!
//! Failures fall into two classes with very different consequences:
//! [`BootstrapError`] is fatal (the loop cannot make progress without the
//! Runtime API), while [`InvocationError`] is scoped to a single invocation
//! and reported to that invocation's error endpoint before the loop moves on.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Type-erased error handlers may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error class reported when user code fails during an invocation.
pub const ERROR_TYPE_UNHANDLED: &str = "Runtime.UnhandledError";

/// Error class reported when a payload cannot be (de)serialized at the
/// handler boundary.
pub const ERROR_TYPE_SERIALIZATION: &str = "Runtime.SerializationError";

/// Error class reported when initialization fails before the loop starts.
pub const ERROR_TYPE_INIT: &str = "Runtime.InitError";

/// Fatal bootstrap failures. Once one of these surfaces, no further
/// invocations can be served and the process should exit.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Runtime API protocol violation: {0}")]
    Protocol(String),

    #[error("Runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Runtime API returned {status} for {endpoint}")]
    Api { endpoint: String, status: StatusCode },

    #[error("Initialization failed: {0}")]
    Init(String),
}

/// A failure scoped to a single invocation. The loop reports it to the
/// invocation's error endpoint and continues polling.
#[derive(Debug, Error)]
#[error("{error_type}: {}", .report.error_message)]
pub struct InvocationError {
    /// Value of the `Lambda-Runtime-Function-Error-Type` header.
    pub error_type: String,
    /// Structured body posted to the error endpoint.
    pub report: ErrorReport,
}

impl InvocationError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        let error_type = error_type.into();
        Self {
            report: ErrorReport::new(error_type.clone(), message),
            error_type,
        }
    }

    /// An error raised by the user's handler function.
    pub fn unhandled(err: BoxError) -> Self {
        Self::new(ERROR_TYPE_UNHANDLED, err.to_string())
    }

    /// A payload that could not be (de)serialized at the handler boundary.
    pub fn serialization<E: std::error::Error>(err: E) -> Self {
        Self::new(ERROR_TYPE_SERIALIZATION, err.to_string())
    }
}

/// Error body posted to the invocation and init error endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            error_type: error_type.into(),
            stack_trace: None,
        }
    }
}
