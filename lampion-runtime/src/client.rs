//! HTTP client for the Lambda Runtime API.
//!
//! Implements the four documented endpoints the execution environment
//! exposes to runtimes. The `next` call long-polls: the request blocks
//! until the platform has an invocation to hand out, so the client is
//! built without a request timeout.

use bytes::Bytes;
use tracing::debug;

use crate::context::RuntimeApiHeaders;
use crate::error::{BootstrapError, ErrorReport};

/// The Runtime API version all endpoint paths are rooted at.
const API_VERSION: &str = "2018-06-01";

/// Header carrying the error class on error POSTs.
pub const HEADER_FUNCTION_ERROR_TYPE: &str = "Lambda-Runtime-Function-Error-Type";

/// One invocation as delivered by `GET /runtime/invocation/next`.
#[derive(Debug)]
pub struct NextInvocation {
    pub headers: RuntimeApiHeaders,
    pub payload: Bytes,
}

/// Client for the invocation endpoints of the Runtime API.
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    http: reqwest::Client,
    base: String,
}

impl RuntimeApiClient {
    /// `endpoint` is the `host:port` value of `AWS_LAMBDA_RUNTIME_API`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("http://{endpoint}/{API_VERSION}"),
        }
    }

    /// Long-polls the next invocation, blocking until one is available.
    pub async fn next_invocation(&self) -> Result<NextInvocation, BootstrapError> {
        let url = format!("{}/runtime/invocation/next", self.base);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BootstrapError::Api {
                endpoint: "invocation/next".to_string(),
                status: response.status(),
            });
        }

        let headers = RuntimeApiHeaders::parse(response.headers())?;
        let payload = response.bytes().await?;
        debug!(
            request_id = %headers.request_id,
            bytes = payload.len(),
            "Received invocation"
        );
        Ok(NextInvocation { headers, payload })
    }

    /// Reports a successful invocation result.
    pub async fn post_response(
        &self,
        request_id: &str,
        payload: Bytes,
    ) -> Result<(), BootstrapError> {
        let url = format!("{}/runtime/invocation/{request_id}/response", self.base);
        let response = self.http.post(&url).body(payload).send().await?;
        ensure_accepted("invocation response", response)
    }

    /// Reports a failed invocation.
    pub async fn post_invocation_error(
        &self,
        request_id: &str,
        error_type: &str,
        report: &ErrorReport,
    ) -> Result<(), BootstrapError> {
        let url = format!("{}/runtime/invocation/{request_id}/error", self.base);
        let response = self
            .http
            .post(&url)
            .header(HEADER_FUNCTION_ERROR_TYPE, error_type)
            .json(report)
            .send()
            .await?;
        ensure_accepted("invocation error", response)
    }

    /// Reports a failure that happened before the loop could start. The
    /// platform tears the environment down after this call.
    pub async fn post_init_error(
        &self,
        error_type: &str,
        report: &ErrorReport,
    ) -> Result<(), BootstrapError> {
        let url = format!("{}/runtime/init/error", self.base);
        let response = self
            .http
            .post(&url)
            .header(HEADER_FUNCTION_ERROR_TYPE, error_type)
            .json(report)
            .send()
            .await?;
        ensure_accepted("init error", response)
    }
}

fn ensure_accepted(endpoint: &str, response: reqwest::Response) -> Result<(), BootstrapError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(BootstrapError::Api {
            endpoint: endpoint.to_string(),
            status: response.status(),
        })
    }
}
