//! Control plane module - runtime API endpoints and reports.
//!
//! The host exposes a small HTTP API. This crate only ever acts as a client:
//!
//! ```text
//! GET  /{version}/runtime/invocation/next          -> next event
//! POST /{version}/runtime/invocation/{id}/response -> chunked result
//! POST /{version}/runtime/invocation/{id}/error    -> JSON error report
//! POST /{version}/runtime/init/error               -> JSON error report
//! ```
//!
//! # Example
//!
//! ```
//! use lambda_runtime_client::control::Endpoints;
//!
//! let endpoints = Endpoints::new("127.0.0.1:9001", "2018-06-01");
//! assert_eq!(
//!     endpoints.response_path("abc"),
//!     "/2018-06-01/runtime/invocation/abc/response"
//! );
//! ```

mod client;
mod report;

pub use client::{include_xray_cause, RuntimeApiClient};
pub use report::{ErrorPayload, XRayErrorCause, XRayException, XRayStackFrame};

/// Request id of the invocation.
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
/// Invocation deadline, milliseconds since the Unix epoch.
pub const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
/// ARN used to invoke the function.
pub const FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
/// X-Ray trace id.
pub const TRACE_ID_HEADER: &str = "Lambda-Runtime-Trace-Id";
/// Mobile client context (JSON).
pub const CLIENT_CONTEXT_HEADER: &str = "Lambda-Runtime-Client-Context";
/// Cognito identity (JSON).
pub const COGNITO_IDENTITY_HEADER: &str = "Lambda-Runtime-Cognito-Identity";

/// Error-type tag, as a header on error reports and a trailer on streams.
pub const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";
/// Base64-encoded error message trailer on streams.
pub const ERROR_BODY_TRAILER: &str = "Lambda-Runtime-Function-Error-Body";
/// Optional X-Ray error cause on error reports.
pub const XRAY_ERROR_CAUSE_HEADER: &str = "Lambda-Runtime-Function-XRay-Error-Cause";
/// Response mode header on the response request.
pub const RESPONSE_MODE_HEADER: &str = "Lambda-Runtime-Function-Response-Mode";
/// The only response mode this crate sends.
pub const STREAMING_RESPONSE_MODE: &str = "streaming";

/// X-Ray cause headers must be strictly smaller than this (1 MiB).
pub const MAX_XRAY_CAUSE_SIZE: usize = 1024 * 1024;

/// Environment variable exposing the current trace id to user code.
pub const TRACE_ID_ENV: &str = "_X_AMZN_TRACE_ID";

/// Runtime API paths and URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
    prefix: String,
}

impl Endpoints {
    /// Create endpoints for `host` (`host:port`) and API version.
    pub fn new(host: impl Into<String>, api_version: &str) -> Self {
        Self {
            host: host.into(),
            prefix: format!("/{}/runtime", api_version),
        }
    }

    /// `host:port` of the runtime API, also used as the `Host` header.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn next_invocation_path(&self) -> String {
        format!("{}/invocation/next", self.prefix)
    }

    pub fn response_path(&self, request_id: &str) -> String {
        format!("{}/invocation/{}/response", self.prefix, request_id)
    }

    pub fn invocation_error_path(&self, request_id: &str) -> String {
        format!("{}/invocation/{}/error", self.prefix, request_id)
    }

    pub fn init_error_path(&self) -> String {
        format!("{}/init/error", self.prefix)
    }

    /// Absolute URL for a path returned by the methods above.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.host, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let endpoints = Endpoints::new("localhost:9001", "2018-06-01");

        assert_eq!(
            endpoints.next_invocation_path(),
            "/2018-06-01/runtime/invocation/next"
        );
        assert_eq!(
            endpoints.invocation_error_path("r1"),
            "/2018-06-01/runtime/invocation/r1/error"
        );
        assert_eq!(endpoints.init_error_path(), "/2018-06-01/runtime/init/error");
        assert_eq!(
            endpoints.url(&endpoints.next_invocation_path()),
            "http://localhost:9001/2018-06-01/runtime/invocation/next"
        );
        assert_eq!(endpoints.host(), "localhost:9001");
    }
}
