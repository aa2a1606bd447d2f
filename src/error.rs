//! Error types for lambda-runtime-client.
//!
//! Every failure is classified into one of these kinds before the execution
//! loop talks to the runtime API:
//!
//! - [`ConfigError`] - bad handler identifier or missing environment, pre-loop
//! - [`InvocationError`] - could not fetch the next invocation
//! - [`HandlerError`] - user code failed, either [`ErrorKind::Recoverable`] or
//!   [`ErrorKind::Fatal`]
//! - [`CommunicationError`] - could not post a response or error report
//! - [`InitError`] - warm-up failed, or reporting it failed

use std::any::Any;

use thiserror::Error;

/// Boxed error accepted from user handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error-type tag for handlers missing from the registry.
pub const HANDLER_NOT_FOUND: &str = "Runtime.HandlerNotFound";

/// Error-type tag for a panic unwinding out of user code.
pub const HANDLER_PANIC: &str = "Runtime.HandlerPanic";

/// Error-type tag for payloads that do not match the handler's input type.
pub const UNMARSHAL_ERROR: &str = "Runtime.UnmarshalError";

/// Error-type tag for results that cannot be serialized to JSON.
pub const SERIALIZATION_ERROR: &str = "Runtime.SerializationError";

/// Error-type tag for a malformed handler identifier.
pub const MALFORMED_HANDLER: &str = "Runtime.MalformedHandlerName";

/// Configuration problems detected before the loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Handler identifier is not `FILE.METHOD` or `FILE.CLASS.METHOD`.
    #[error("invalid handler `{0}`: expected FILE.METHOD or FILE.CLASS.METHOD")]
    InvalidHandler(String),

    /// A required environment variable is missing or empty.
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Failure to obtain the next unit of work. Fatal to the loop.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The runtime API answered with a non-2xx status.
    #[error("runtime API returned status {0} for next invocation")]
    Status(u16),

    /// The 2xx response carried no request id.
    #[error("next invocation response has no request id header")]
    MissingRequestId,

    /// The request never completed.
    #[error("failed to fetch next invocation: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Failure to deliver a response or error report to the runtime API.
#[derive(Debug, Error)]
pub enum CommunicationError {
    /// The runtime API rejected the report.
    #[error("runtime API returned status {status} for {url}")]
    Status { url: String, status: u16 },

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Socket error on the streaming response connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report body could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure during warm-up, before the first poll.
#[derive(Debug, Error)]
pub enum InitError {
    /// Warm-up failed and was reported through the init error endpoint.
    #[error("initialization failed: {0}")]
    Failed(HandlerError),

    /// The init error report itself could not be delivered.
    #[error("failed to report init error: {0}")]
    Report(#[source] CommunicationError),
}

/// Whether the process may keep serving after a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Application fault: report it and poll again.
    Recoverable,
    /// Lookup fault or unrecognized fault: report it and exit.
    Fatal,
}

/// A classified handler failure.
///
/// `error_type` is sent verbatim in the `Lambda-Runtime-Function-Error-Type`
/// header (or trailer, for streamed responses).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    kind: ErrorKind,
    error_type: String,
    message: String,
    stack_trace: Vec<String>,
}

impl HandlerError {
    /// Create a recoverable error with an explicit tag.
    pub fn recoverable(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Recoverable, error_type, message)
    }

    /// Create a fatal error with an explicit tag.
    pub fn fatal(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, error_type, message)
    }

    fn new(kind: ErrorKind, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            error_type: error_type.into(),
            message: message.into(),
            stack_trace: Vec::new(),
        }
    }

    /// Lookup fault: no handler registered under `identifier`.
    ///
    /// Handlers that delegate to other callables can return this to signal a
    /// missing method or class; it is always fatal.
    pub fn not_found(identifier: &str) -> Self {
        Self::fatal(
            HANDLER_NOT_FOUND,
            format!("no handler registered for `{}`", identifier),
        )
    }

    /// Classify an error returned from user code.
    ///
    /// A [`HandlerError`] passes through unchanged, so user code can raise a
    /// fatal lookup fault explicitly. Anything else is recoverable and tagged
    /// `Function<TypeName>`, with its `source()` chain as the stack trace.
    pub fn from_fault<E>(err: E) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        let type_name = short_type_name(std::any::type_name::<E>());
        let boxed: BoxError = err.into();

        match boxed.downcast::<HandlerError>() {
            Ok(classified) => *classified,
            Err(other) => {
                let mut stack_trace = Vec::new();
                let mut source = other.source();
                while let Some(cause) = source {
                    stack_trace.push(cause.to_string());
                    source = cause.source();
                }

                Self {
                    kind: ErrorKind::Recoverable,
                    error_type: format!("Function<{}>", type_name),
                    message: other.to_string(),
                    stack_trace,
                }
            }
        }
    }

    /// Classify an error raised by a warm-up hook.
    ///
    /// Same as [`from_fault`](Self::from_fault), but tagged `Init<TypeName>`
    /// and always fatal: the process cannot serve without its warm-up.
    pub fn from_init_fault<E>(err: E) -> Self
    where
        E: Into<BoxError> + 'static,
    {
        let classified = Self::from_fault(err);
        let error_type = match classified.error_type.strip_prefix("Function<") {
            Some(rest) => format!("Init<{}", rest),
            None => classified.error_type.clone(),
        };

        Self {
            kind: ErrorKind::Fatal,
            error_type,
            ..classified
        }
    }

    /// Classify a panic payload caught while running user code.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };

        Self::fatal(HANDLER_PANIC, message)
    }

    /// Payload could not be decoded into the handler's input type.
    pub fn unmarshal(err: serde_json::Error) -> Self {
        Self::recoverable(UNMARSHAL_ERROR, err.to_string())
    }

    /// Handler output could not be encoded as JSON.
    pub fn serialization(err: serde_json::Error) -> Self {
        Self::recoverable(SERIALIZATION_ERROR, err.to_string())
    }

    /// Replace the stack trace.
    pub fn with_stack_trace(mut self, stack_trace: Vec<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }

    /// Get the classification.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True when the process must exit after reporting this error.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }

    /// Get the error-type tag.
    #[inline]
    pub fn error_type(&self) -> &str {
        &self.error_type
    }

    /// Get the human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the cause chain, outermost first.
    #[inline]
    pub fn stack_trace(&self) -> &[String] {
        &self.stack_trace
    }
}

/// Strip module path and generic arguments from a type name.
///
/// `std::io::error::Error` becomes `Error`, `&str` becomes `str`. Boxed trait
/// objects carry no useful concrete name, so they become `Error`.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    let name = base
        .rsplit("::")
        .next()
        .unwrap_or(base)
        .trim_start_matches('&');

    if name == "Box" {
        "Error"
    } else {
        name
    }
}

/// Main error type for runtime operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Communication(#[from] CommunicationError),

    #[error(transparent)]
    Init(#[from] InitError),
}

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
