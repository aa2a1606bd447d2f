//! Invocation and context types.
//!
//! Every poll yields an [`Invocation`]: the request id, the raw event payload
//! and a [`LambdaContext`] built from the runtime API response headers. The
//! context is handed to the handler alongside the decoded payload.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::control::{
    CLIENT_CONTEXT_HEADER, COGNITO_IDENTITY_HEADER, DEADLINE_HEADER, FUNCTION_ARN_HEADER,
    TRACE_ID_HEADER,
};

/// One unit of work fetched from the runtime API.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Request id from `Lambda-Runtime-Aws-Request-Id`.
    pub request_id: String,
    /// Raw event body.
    pub payload: Bytes,
    /// Per-request metadata.
    pub context: LambdaContext,
}

/// Static function metadata the host exposes through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub function_name: String,
    pub function_version: String,
    pub memory_limit_in_mb: Option<u32>,
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl FunctionMetadata {
    /// Read `AWS_LAMBDA_FUNCTION_*` and `AWS_LAMBDA_LOG_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            function_name: lookup("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            function_version: lookup("AWS_LAMBDA_FUNCTION_VERSION").unwrap_or_default(),
            memory_limit_in_mb: lookup("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")
                .and_then(|m| m.parse().ok()),
            log_group_name: lookup("AWS_LAMBDA_LOG_GROUP_NAME").unwrap_or_default(),
            log_stream_name: lookup("AWS_LAMBDA_LOG_STREAM_NAME").unwrap_or_default(),
        }
    }
}

/// Context passed to handlers.
///
/// Cheap to clone; function metadata is shared.
#[derive(Debug, Clone)]
pub struct LambdaContext {
    request_id: String,
    deadline_ms: u64,
    invoked_function_arn: String,
    trace_id: Option<String>,
    client_context: Option<Value>,
    identity: Option<Value>,
    function: Arc<FunctionMetadata>,
}

impl LambdaContext {
    /// Create a bare context (for testing without a runtime API).
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline_ms: 0,
            invoked_function_arn: String::new(),
            trace_id: None,
            client_context: None,
            identity: None,
            function: Arc::new(FunctionMetadata::default()),
        }
    }

    /// Build a context from next-invocation response headers.
    pub(crate) fn from_headers(
        request_id: impl Into<String>,
        headers: &HeaderMap,
        function: Arc<FunctionMetadata>,
    ) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let json = |name: &str| {
            text(name).and_then(|raw| match serde_json::from_str::<Value>(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!("Ignoring malformed {} header: {}", name, e);
                    None
                }
            })
        };

        Self {
            request_id: request_id.into(),
            deadline_ms: text(DEADLINE_HEADER)
                .and_then(|d| d.parse().ok())
                .unwrap_or(0),
            invoked_function_arn: text(FUNCTION_ARN_HEADER).unwrap_or_default(),
            trace_id: text(TRACE_ID_HEADER),
            client_context: json(CLIENT_CONTEXT_HEADER),
            identity: json(COGNITO_IDENTITY_HEADER),
            function,
        }
    }

    /// Set the deadline (milliseconds since the Unix epoch).
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    /// Set the trace id.
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[inline]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Deadline in milliseconds since the Unix epoch (0 if unknown).
    #[inline]
    pub fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    #[inline]
    pub fn invoked_function_arn(&self) -> &str {
        &self.invoked_function_arn
    }

    #[inline]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Client context sent by mobile SDK callers.
    #[inline]
    pub fn client_context(&self) -> Option<&Value> {
        self.client_context.as_ref()
    }

    /// Cognito identity of the caller.
    #[inline]
    pub fn identity(&self) -> Option<&Value> {
        self.identity.as_ref()
    }

    #[inline]
    pub fn function(&self) -> &FunctionMetadata {
        &self.function
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining_time(&self) -> Duration {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Duration::from_millis(self.deadline_ms.saturating_sub(now_ms))
    }
}
