//! Runtime builder and execution loop.
//!
//! The [`RuntimeBuilder`] registers handlers and an optional warm-up hook,
//! then [`start`](RuntimeBuilder::start) resolves the configured handler
//! before the first poll. The [`Runtime`] then loops strictly sequentially:
//!
//! ```text
//! Idle ─► Polling ─► Invoking ─► Responding ─► Idle
//!            │                       │
//!            └─ InvocationError      └─ Fatal / CommunicationError ─► exit
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lambda_runtime_client::{bootstrap, RuntimeBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::process::ExitCode {
//!     let builder = RuntimeBuilder::new()
//!         .handle("app.echo", |event: serde_json::Value, _ctx| async move {
//!             Ok::<_, std::io::Error>(event)
//!         });
//!
//!     bootstrap(builder).await
//! }
//! ```

use std::future::Future;
use std::process::ExitCode;

use bytes::Bytes;
use futures::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RuntimeConfig;
use crate::control::{ErrorPayload, RuntimeApiClient, XRayErrorCause, TRACE_ID_ENV};
use crate::error::{
    BoxError, CommunicationError, Error, HandlerError, InitError, Result, MALFORMED_HANDLER,
};
use crate::handler::{
    BoxFuture, FunctionMetadata, Handler, HandlerRegistry, HandlerSpec, LambdaContext,
    ResponseShape,
};
use crate::invoker::Invoker;
use crate::logging::init_logging;
use crate::transport::{Connector, TcpConnector};
use crate::writer::ResponseWriter;

type InitHook = Box<dyn FnOnce() -> BoxFuture<'static, std::result::Result<(), HandlerError>> + Send>;

/// Why the runtime stopped. Each reason maps to its own process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Polling for the next invocation failed.
    InvocationFailed,
    /// A fatal handler error was reported.
    FatalHandlerError,
    /// A response or error report could not be delivered.
    CommunicationFailed,
    /// Warm-up failed or the handler could not be resolved.
    InitFailed,
    /// Configuration was missing or malformed.
    ConfigInvalid,
}

impl ExitReason {
    /// Process exit status.
    pub fn code(self) -> u8 {
        match self {
            Self::InvocationFailed => 1,
            Self::FatalHandlerError => 2,
            Self::CommunicationFailed => 3,
            Self::InitFailed => 4,
            Self::ConfigInvalid => 5,
        }
    }
}

impl From<ExitReason> for ExitCode {
    fn from(reason: ExitReason) -> Self {
        ExitCode::from(reason.code())
    }
}

impl Error {
    /// The exit reason this error ends the process with.
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            Error::Config(_) => ExitReason::ConfigInvalid,
            Error::Invocation(_) => ExitReason::InvocationFailed,
            Error::Handler(_) => ExitReason::FatalHandlerError,
            Error::Communication(_) => ExitReason::CommunicationFailed,
            Error::Init(_) => ExitReason::InitFailed,
        }
    }
}

/// Builder for configuring and starting a [`Runtime`].
pub struct RuntimeBuilder {
    registry: HandlerRegistry,
    init_hook: Option<InitHook>,
    function: Option<FunctionMetadata>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            init_hook: None,
            function: None,
        }
    }

    /// Register a handler whose result is sent as JSON.
    pub fn handle<F, T, R, E, Fut>(mut self, identifier: &str, handler: F) -> Self
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.registry.register(identifier, handler);
        self
    }

    /// Register a handler whose result bytes are sent unchanged.
    pub fn handle_raw<F, T, B, E, Fut>(mut self, identifier: &str, handler: F) -> Self
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = std::result::Result<B, E>> + Send + 'static,
        B: Into<Bytes> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.registry.register_raw(identifier, handler);
        self
    }

    /// Register a handler that streams its result chunk by chunk.
    pub fn handle_stream<F, T, S, B, E, SE, Fut>(mut self, identifier: &str, handler: F) -> Self
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = std::result::Result<S, E>> + Send + 'static,
        S: Stream<Item = std::result::Result<B, SE>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError> + 'static,
        SE: Into<BoxError> + 'static,
    {
        self.registry.register_stream(identifier, handler);
        self
    }

    /// Register a prebuilt [`Handler`].
    pub fn handler<H: Handler>(mut self, identifier: &str, shape: ResponseShape, handler: H) -> Self {
        self.registry.register_handler(identifier, shape, handler);
        self
    }

    /// Run `hook` once before the first poll.
    ///
    /// A failure is reported to the init error endpoint, tagged
    /// `Init<TypeName>`, and the runtime does not start.
    pub fn init<F, Fut, E>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        self.init_hook = Some(Box::new(move || -> BoxFuture<'static, std::result::Result<(), HandlerError>> {
            let fut = hook();
            Box::pin(async move { fut.await.map_err(HandlerError::from_init_fault) })
        }));
        self
    }

    /// Use explicit function metadata instead of reading the environment.
    pub fn function_metadata(mut self, function: FunctionMetadata) -> Self {
        self.function = Some(function);
        self
    }

    #[inline]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Resolve the handler, run the warm-up hook and connect over TCP.
    pub async fn start(self, config: RuntimeConfig) -> Result<Runtime<TcpConnector>> {
        let connector = TcpConnector::new(config.runtime_api.clone());
        self.start_with_connector(config, connector).await
    }

    /// Like [`start`](Self::start), with a custom connector for the response
    /// path.
    pub async fn start_with_connector<C: Connector>(
        self,
        config: RuntimeConfig,
        connector: C,
    ) -> Result<Runtime<C>> {
        let function = self.function.unwrap_or_else(FunctionMetadata::from_env);
        let client = RuntimeApiClient::new(&config)?.with_function_metadata(function);

        let spec = match HandlerSpec::parse(&config.handler) {
            Ok(spec) => spec,
            Err(e) => {
                let fault = HandlerError::fatal(MALFORMED_HANDLER, e.to_string());
                report_init_error(&client, &fault).await?;
                return Err(e.into());
            }
        };

        let invoker = match Invoker::new(&self.registry, spec) {
            Ok(invoker) => invoker,
            Err(fault) => {
                report_init_error(&client, &fault).await?;
                return Err(InitError::Failed(fault).into());
            }
        };

        if let Some(hook) = self.init_hook {
            if let Err(fault) = hook().await {
                report_init_error(&client, &fault).await?;
                return Err(InitError::Failed(fault).into());
            }
        }

        tracing::info!(
            "Runtime ready: handler {} ({:?}) via {}",
            invoker.spec(),
            invoker.shape(),
            client.endpoints().host()
        );

        let writer = ResponseWriter::new(connector, client.endpoints().clone());
        Ok(Runtime {
            client,
            invoker,
            writer,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn report_init_error(
    client: &RuntimeApiClient,
    fault: &HandlerError,
) -> std::result::Result<(), InitError> {
    tracing::error!("Initialization failed: {}", fault);
    client
        .post_init_error(&ErrorPayload::from(fault), fault.error_type())
        .await
}

/// A started runtime bound to one handler.
pub struct Runtime<C> {
    client: RuntimeApiClient,
    invoker: Invoker,
    writer: ResponseWriter<C>,
}

impl<C: Connector> Runtime<C> {
    #[inline]
    pub fn handler(&self) -> &HandlerSpec {
        self.invoker.spec()
    }

    /// Poll, invoke and respond for a single invocation.
    ///
    /// Returns `Ok` when the loop may continue, including after a
    /// recoverable handler error has been reported.
    pub async fn run_once(&self) -> Result<()> {
        let invocation = self.client.next_invocation().await?;
        let request_id = invocation.request_id.clone();

        export_trace_id(invocation.context.trace_id());

        match self.invoker.invoke(invocation).await {
            Ok(result) => match self.writer.send(&request_id, result).await {
                // The trailer already carried this fault to the host.
                Err(Error::Handler(fault)) if !fault.is_fatal() => {
                    tracing::warn!("Invocation {} stream failed: {}", request_id, fault);
                    Ok(())
                }
                other => other,
            },
            Err(fault) => {
                self.report(&request_id, &fault).await?;
                if fault.is_fatal() {
                    return Err(fault.into());
                }
                tracing::warn!("Invocation {} failed: {}", request_id, fault);
                Ok(())
            }
        }
    }

    /// Run until an error ends the loop.
    pub async fn run(self) -> ExitReason {
        loop {
            if let Err(e) = self.run_once().await {
                let reason = e.exit_reason();
                tracing::error!("Runtime exiting ({:?}): {}", reason, e);
                return reason;
            }
        }
    }

    async fn report(
        &self,
        request_id: &str,
        fault: &HandlerError,
    ) -> std::result::Result<(), CommunicationError> {
        let payload = ErrorPayload::from(fault);
        let cause = match XRayErrorCause::from_error(fault).to_json() {
            Ok(cause) => Some(cause),
            Err(e) => {
                tracing::debug!("Could not encode X-Ray cause: {}", e);
                None
            }
        };

        self.client
            .post_error(request_id, &payload, fault.error_type(), cause.as_deref())
            .await
    }
}

/// Expose the invocation's trace id to user code, or clear a stale one.
fn export_trace_id(trace_id: Option<&str>) {
    match trace_id {
        Some(id) => std::env::set_var(TRACE_ID_ENV, id),
        None => std::env::remove_var(TRACE_ID_ENV),
    }
}

/// Start logging, load configuration and run until exit.
///
/// The handler identifier comes from the first command-line argument if
/// present, else from `_HANDLER`.
pub async fn bootstrap(builder: RuntimeBuilder) -> ExitCode {
    init_logging();

    let config = match RuntimeConfig::from_env_with_handler(std::env::args().nth(1)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitReason::ConfigInvalid.into();
        }
    };

    match builder.start(config).await {
        Ok(runtime) => runtime.run().await.into(),
        Err(e) => {
            let reason = e.exit_reason();
            tracing::error!("Runtime failed to start ({:?}): {}", reason, e);
            reason.into()
        }
    }
}
