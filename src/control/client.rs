//! Runtime API client for polling and error reports.
//!
//! Each call uses its own connection: idle pooling is disabled so nothing is
//! shared between invocations. The successful response path does not go
//! through this client; it is written by [`ResponseWriter`](crate::writer::ResponseWriter)
//! with chunked framing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::RequestBuilder;

use super::{
    Endpoints, ErrorPayload, ERROR_TYPE_HEADER, MAX_XRAY_CAUSE_SIZE, REQUEST_ID_HEADER,
    XRAY_ERROR_CAUSE_HEADER,
};
use crate::config::RuntimeConfig;
use crate::error::{CommunicationError, InitError, InvocationError};
use crate::handler::{FunctionMetadata, Invocation, LambdaContext, JSON_CONTENT_TYPE};

/// True if an X-Ray cause is small enough to send as a header.
#[inline]
pub fn include_xray_cause(cause: &str) -> bool {
    cause.len() < MAX_XRAY_CAUSE_SIZE
}

/// HTTP client for the runtime API.
pub struct RuntimeApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    poll_timeout: Duration,
    function: Arc<FunctionMetadata>,
}

impl RuntimeApiClient {
    /// Create a client for the configured runtime API.
    pub fn new(config: &RuntimeConfig) -> Result<Self, CommunicationError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            http,
            endpoints: Endpoints::new(&config.runtime_api, &config.api_version),
            poll_timeout: config.poll_timeout,
            function: Arc::new(FunctionMetadata::default()),
        })
    }

    /// Attach function metadata to every context built by this client.
    pub fn with_function_metadata(mut self, function: FunctionMetadata) -> Self {
        self.function = Arc::new(function);
        self
    }

    #[inline]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Block until the host hands out the next invocation.
    ///
    /// No retry: a non-2xx status or transport failure is returned as is.
    pub async fn next_invocation(&self) -> Result<Invocation, InvocationError> {
        let url = self.endpoints.url(&self.endpoints.next_invocation_path());

        let response = self
            .http
            .get(&url)
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(InvocationError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvocationError::Status(status.as_u16()));
        }

        let headers = response.headers().clone();
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|id| !id.is_empty())
            .ok_or(InvocationError::MissingRequestId)?
            .to_string();

        let payload = response
            .bytes()
            .await
            .map_err(InvocationError::Transport)?;

        tracing::debug!(
            "Received invocation {} ({} bytes)",
            request_id,
            payload.len()
        );

        let context = LambdaContext::from_headers(request_id.clone(), &headers, self.function.clone());
        Ok(Invocation {
            request_id,
            payload,
            context,
        })
    }

    /// Report a failed invocation.
    ///
    /// `xray_cause` is sent only if it is smaller than 1 MiB.
    pub async fn post_error(
        &self,
        request_id: &str,
        payload: &ErrorPayload,
        error_type: &str,
        xray_cause: Option<&str>,
    ) -> Result<(), CommunicationError> {
        let url = self.endpoints.url(&self.endpoints.invocation_error_path(request_id));

        let mut request = self.error_request(&url, payload, error_type)?;

        if let Some(cause) = xray_cause {
            if !include_xray_cause(cause) {
                tracing::debug!(
                    "Dropping X-Ray cause of {} bytes for request {}",
                    cause.len(),
                    request_id
                );
            } else {
                match HeaderValue::from_str(cause) {
                    Ok(value) => request = request.header(XRAY_ERROR_CAUSE_HEADER, value),
                    Err(_) => tracing::warn!("X-Ray cause is not a valid header value, omitting it"),
                }
            }
        }

        self.send_report(request, &url).await
    }

    /// Report a failure that happened before the first poll.
    pub async fn post_init_error(
        &self,
        payload: &ErrorPayload,
        error_type: &str,
    ) -> Result<(), InitError> {
        let url = self.endpoints.url(&self.endpoints.init_error_path());

        let request = self
            .error_request(&url, payload, error_type)
            .map_err(InitError::Report)?;
        self.send_report(request, &url)
            .await
            .map_err(InitError::Report)
    }

    fn error_request(
        &self,
        url: &str,
        payload: &ErrorPayload,
        error_type: &str,
    ) -> Result<RequestBuilder, CommunicationError> {
        let body = serde_json::to_vec(payload)?;

        Ok(self
            .http
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ERROR_TYPE_HEADER, error_type)
            .body(body))
    }

    async fn send_report(&self, request: RequestBuilder, url: &str) -> Result<(), CommunicationError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(CommunicationError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
