//! Per-invocation context built from Runtime API response headers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::env::LambdaEnvironment;
use crate::error::BootstrapError;

/// Headers the Runtime API sets on `invocation/next` responses.
pub const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
pub const HEADER_DEADLINE_MS: &str = "Lambda-Runtime-Deadline-Ms";
pub const HEADER_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const HEADER_TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
pub const HEADER_CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
pub const HEADER_COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";

/// Warm-up invocations get the platform's default function timeout.
const WARMUP_DEADLINE_MS: i64 = 3_000;

/// Transient parse of one poll response's headers. Recreated every poll.
#[derive(Debug, Clone)]
pub struct RuntimeApiHeaders {
    pub request_id: String,
    /// Invocation deadline as Unix-epoch milliseconds.
    pub deadline_ms: i64,
    pub invoked_function_arn: String,
    pub trace_id: Option<String>,
    pub client_context_json: Option<String>,
    pub cognito_identity_json: Option<String>,
}

impl RuntimeApiHeaders {
    /// A response without a request id or a parseable deadline cannot be
    /// reported back, so either is a protocol error.
    pub fn parse(headers: &HeaderMap) -> Result<Self, BootstrapError> {
        let request_id = required(headers, HEADER_REQUEST_ID)?;
        let deadline_ms = required(headers, HEADER_DEADLINE_MS)?
            .parse::<i64>()
            .map_err(|_| {
                BootstrapError::Protocol(format!("invalid {HEADER_DEADLINE_MS} header"))
            })?;

        Ok(Self {
            request_id,
            deadline_ms,
            invoked_function_arn: header_str(headers, HEADER_FUNCTION_ARN).unwrap_or_default(),
            trace_id: header_str(headers, HEADER_TRACE_ID),
            client_context_json: header_str(headers, HEADER_CLIENT_CONTEXT),
            cognito_identity_json: header_str(headers, HEADER_COGNITO_IDENTITY),
        })
    }
}

fn required(headers: &HeaderMap, name: &str) -> Result<String, BootstrapError> {
    header_str(headers, name)
        .ok_or_else(|| BootstrapError::Protocol(format!("missing {name} header")))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Per-invocation metadata handed to the handler. Lifetime = one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: String,
    deadline_ms: i64,
    invoked_function_arn: String,
    trace_id: Option<String>,
    env: Arc<LambdaEnvironment>,
    client_context_json: Option<String>,
    cognito_identity_json: Option<String>,
    client_context: OnceCell<Option<ClientContext>>,
    cognito_identity: OnceCell<Option<CognitoIdentity>>,
}

impl Context {
    pub fn new(headers: RuntimeApiHeaders, env: Arc<LambdaEnvironment>) -> Self {
        Self {
            request_id: headers.request_id,
            deadline_ms: headers.deadline_ms,
            invoked_function_arn: headers.invoked_function_arn,
            trace_id: headers.trace_id,
            env,
            client_context_json: headers.client_context_json,
            cognito_identity_json: headers.cognito_identity_json,
            client_context: OnceCell::new(),
            cognito_identity: OnceCell::new(),
        }
    }

    /// Synthetic context for warm-up invocations that never touch the
    /// platform.
    pub(crate) fn warmup(env: Arc<LambdaEnvironment>, request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            deadline_ms: Utc::now().timestamp_millis() + WARMUP_DEADLINE_MS,
            invoked_function_arn: String::new(),
            trace_id: None,
            env,
            client_context_json: None,
            cognito_identity_json: None,
            client_context: OnceCell::new(),
            cognito_identity: OnceCell::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn invoked_function_arn(&self) -> &str {
        &self.invoked_function_arn
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// The invocation deadline as Unix-epoch milliseconds.
    pub fn deadline_ms(&self) -> i64 {
        self.deadline_ms
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.deadline_ms).unwrap_or_default()
    }

    /// Time left before the platform terminates this invocation.
    ///
    /// Recomputed on every call: the deadline is a fixed point in time and
    /// callers use this to budget remaining work.
    pub fn remaining_time(&self) -> Duration {
        let now = Utc::now().timestamp_millis();
        Duration::from_millis((self.deadline_ms - now).max(0) as u64)
    }

    /// The environment shared by all invocations of this process.
    pub fn env(&self) -> &LambdaEnvironment {
        &self.env
    }

    /// Client context supplied by the calling SDK, parsed from its JSON
    /// header on first access and cached for the invocation lifetime.
    /// A malformed header yields `None`, not a failed invocation.
    pub fn client_context(&self) -> Option<&ClientContext> {
        self.client_context
            .get_or_init(|| parse_header_json(&self.request_id, self.client_context_json.as_deref()))
            .as_ref()
    }

    /// Cognito identity of the caller, parsed lazily like
    /// [`Context::client_context`].
    pub fn cognito_identity(&self) -> Option<&CognitoIdentity> {
        self.cognito_identity
            .get_or_init(|| {
                parse_header_json(&self.request_id, self.cognito_identity_json.as_deref())
            })
            .as_ref()
    }

    /// Writes a line to the function log stream the platform captures.
    pub fn log(&self, message: &str) {
        crate::log::write_line(&self.request_id, message);
    }
}

fn parse_header_json<T: serde::de::DeserializeOwned>(
    request_id: &str,
    json: Option<&str>,
) -> Option<T> {
    let json = json?;
    match serde_json::from_str(json) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(request_id = %request_id, %err, "Malformed identity header, ignoring");
            None
        }
    }
}

/// Client application information set by mobile SDKs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientApplication {
    #[serde(default)]
    pub installation_id: String,
    #[serde(default)]
    pub app_title: String,
    #[serde(default)]
    pub app_version_name: String,
    #[serde(default)]
    pub app_version_code: String,
    #[serde(default)]
    pub app_package_name: String,
}

/// Client context passed through the `Lambda-Runtime-Client-Context` header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    #[serde(default)]
    pub client: ClientApplication,
    #[serde(default)]
    pub custom: HashMap<String, String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

/// Cognito identity passed through the `Lambda-Runtime-Cognito-Identity`
/// header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitoIdentity {
    #[serde(default)]
    pub cognito_identity_id: String,
    #[serde(default)]
    pub cognito_identity_pool_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll_headers(request_id: &str, deadline_ms: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REQUEST_ID, request_id.parse().unwrap());
        headers.insert(HEADER_DEADLINE_MS, deadline_ms.to_string().parse().unwrap());
        headers.insert(
            HEADER_FUNCTION_ARN,
            "arn:aws:lambda:us-east-1:000000000000:function:test"
                .parse()
                .unwrap(),
        );
        headers
    }

    fn context_with(headers: RuntimeApiHeaders) -> Context {
        Context::new(headers, Arc::new(LambdaEnvironment::default()))
    }

    #[test]
    fn test_parse_poll_headers() {
        let parsed = RuntimeApiHeaders::parse(&poll_headers("req-1", 1_700_000_000_000)).unwrap();

        assert_eq!(parsed.request_id, "req-1");
        assert_eq!(parsed.deadline_ms, 1_700_000_000_000);
        assert!(parsed.invoked_function_arn.ends_with("function:test"));
        assert!(parsed.trace_id.is_none());
    }

    #[test]
    fn test_missing_request_id_is_protocol_error() {
        let mut headers = poll_headers("req-1", 1_700_000_000_000);
        headers.remove(HEADER_REQUEST_ID);

        assert!(matches!(
            RuntimeApiHeaders::parse(&headers),
            Err(BootstrapError::Protocol(_))
        ));
    }

    #[test]
    fn test_unparseable_deadline_is_protocol_error() {
        let mut headers = poll_headers("req-1", 0);
        headers.insert(HEADER_DEADLINE_MS, "soon".parse().unwrap());

        assert!(matches!(
            RuntimeApiHeaders::parse(&headers),
            Err(BootstrapError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_remaining_time_decreases_between_reads() {
        let deadline_ms = Utc::now().timestamp_millis() + 5_000;
        let ctx = context_with(
            RuntimeApiHeaders::parse(&poll_headers("req-1", deadline_ms)).unwrap(),
        );

        let first = ctx.remaining_time();
        tokio::time::sleep(Duration::from_millis(25)).await;
        let second = ctx.remaining_time();

        assert!(second < first, "{second:?} should be below {first:?}");
        assert!(first <= Duration::from_millis(5_000));
    }

    #[test]
    fn test_remaining_time_clamps_at_zero_past_deadline() {
        let deadline_ms = Utc::now().timestamp_millis() - 1_000;
        let ctx = context_with(
            RuntimeApiHeaders::parse(&poll_headers("req-1", deadline_ms)).unwrap(),
        );

        assert_eq!(ctx.remaining_time(), Duration::ZERO);
    }

    #[test]
    fn test_client_context_parsed_lazily() {
        let mut headers = RuntimeApiHeaders::parse(&poll_headers("req-1", 0)).unwrap();
        headers.client_context_json =
            Some(r#"{"client":{"appTitle":"demo"},"custom":{"tenant":"acme"}}"#.to_string());
        let ctx = context_with(headers);

        let client_context = ctx.client_context().unwrap();
        assert_eq!(client_context.client.app_title, "demo");
        assert_eq!(client_context.custom["tenant"], "acme");
        // Second access hits the cached parse.
        assert!(ctx.client_context().is_some());
    }

    #[test]
    fn test_malformed_client_context_yields_none() {
        let mut headers = RuntimeApiHeaders::parse(&poll_headers("req-1", 0)).unwrap();
        headers.client_context_json = Some("{not json".to_string());
        let ctx = context_with(headers);

        assert!(ctx.client_context().is_none());
        assert!(ctx.cognito_identity().is_none());
    }

    #[test]
    fn test_cognito_identity_wire_names() {
        let mut headers = RuntimeApiHeaders::parse(&poll_headers("req-1", 0)).unwrap();
        headers.cognito_identity_json = Some(
            r#"{"cognitoIdentityId":"id-1","cognitoIdentityPoolId":"pool-1"}"#.to_string(),
        );
        let ctx = context_with(headers);

        let identity = ctx.cognito_identity().unwrap();
        assert_eq!(identity.cognito_identity_id, "id-1");
        assert_eq!(identity.cognito_identity_pool_id, "pool-1");
    }
}
