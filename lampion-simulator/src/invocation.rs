//! Invocation hand-off types shared by the server and the simulator surface.

use bytes::Bytes;
use tokio::sync::oneshot;

/// A queued invocation awaiting delivery to the runtime under test.
pub struct QueuedInvocation {
    pub request_id: String,
    pub function_arn: String,
    pub payload: Bytes,
    /// Deadline as Unix-epoch milliseconds, surfaced verbatim in the
    /// `Lambda-Runtime-Deadline-Ms` header.
    pub deadline_ms: i64,
    pub trace_id: Option<String>,
    pub client_context: Option<String>,
    pub cognito_identity: Option<String>,
    pub outcome_tx: Option<oneshot::Sender<InvocationOutcome>>,
}

/// How the runtime under test resolved an invocation.
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    /// POSTed to the response endpoint.
    Response { payload: Bytes },
    /// POSTed to the error endpoint. `error_type` is the verbatim
    /// `Lambda-Runtime-Function-Error-Type` header value, empty when the
    /// runtime omitted it.
    Error { error_type: String, payload: Bytes },
}

impl InvocationOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The response or error body.
    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Response { payload } | Self::Error { payload, .. } => payload,
        }
    }
}

/// An error reported to `POST /runtime/init/error`.
#[derive(Debug, Clone)]
pub struct InitErrorRecord {
    pub error_type: String,
    pub payload: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let ok = InvocationOutcome::Response {
            payload: Bytes::from_static(b"{}"),
        };
        let err = InvocationOutcome::Error {
            error_type: "Runtime.UnhandledError".to_string(),
            payload: Bytes::from_static(b"{}"),
        };

        assert!(!ok.is_error());
        assert!(err.is_error());
        assert_eq!(&ok.payload()[..], b"{}");
    }
}
