//! Handler registry for resolving handler identifiers.
//!
//! The registry maps identifiers (`file.method` or `file.Class.method`) to
//! statically typed handlers. It is built once at startup and resolved once
//! against the configured [`HandlerSpec`].
//!
//! # Example
//!
//! ```ignore
//! use lambda_runtime_client::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("app.echo", |event: serde_json::Value, _ctx| async move {
//!     Ok::<_, std::io::Error>(event)
//! });
//!
//! let spec = "app.echo".parse()?;
//! let resolved = registry.resolve(&spec)?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::Stream;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{HandlerSpec, InvocationResult, LambdaContext};
use crate::error::{BoxError, HandlerError};

/// Result type for handler calls.
pub type HandlerResult = std::result::Result<InvocationResult, HandlerError>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle an invocation with the raw event payload.
    fn call(&self, payload: Bytes, ctx: LambdaContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that decodes the JSON payload before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, payload: Bytes, ctx: LambdaContext) -> BoxFuture<'static, HandlerResult> {
        let event: T = match serde_json::from_slice(&payload) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(HandlerError::unmarshal(e)) }),
        };

        Box::pin((self.handler)(event, ctx))
    }
}

/// How a registered handler shapes its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Buffered, JSON-encoded.
    Json,
    /// Buffered, bytes passed through.
    Raw,
    /// Streamed chunks.
    Stream,
}

/// A handler resolved from the registry.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub handler: Arc<dyn Handler>,
    pub shape: ResponseShape,
}

struct HandlerEntry {
    handler: Arc<dyn Handler>,
    shape: ResponseShape,
}

/// Registry mapping handler identifiers to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler whose output is JSON-encoded.
    ///
    /// Errors returned by the handler are recoverable unless they are a
    /// fatal [`HandlerError`].
    pub fn register<F, T, R, E, Fut>(&mut self, identifier: &str, handler: F)
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let typed = TypedHandler::new(move |event: T, ctx: LambdaContext| {
            let fut = handler(event, ctx);
            async move {
                fut.await
                    .map_err(HandlerError::from_fault)
                    .and_then(|value| {
                        InvocationResult::json(&value).map_err(HandlerError::serialization)
                    })
            }
        });
        self.insert(identifier, ResponseShape::Json, typed);
    }

    /// Register a handler whose output bytes are sent as-is.
    pub fn register_raw<F, T, B, E, Fut>(&mut self, identifier: &str, handler: F)
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<B, E>> + Send + 'static,
        B: Into<Bytes> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let typed = TypedHandler::new(move |event: T, ctx: LambdaContext| {
            let fut = handler(event, ctx);
            async move {
                fut.await
                    .map(InvocationResult::raw)
                    .map_err(HandlerError::from_fault)
            }
        });
        self.insert(identifier, ResponseShape::Raw, typed);
    }

    /// Register a handler that produces a stream of chunks.
    ///
    /// The response is declared as `text/event-stream`.
    pub fn register_stream<F, T, S, B, E, SE, Fut>(&mut self, identifier: &str, handler: F)
    where
        F: Fn(T, LambdaContext) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<S, E>> + Send + 'static,
        S: Stream<Item = Result<B, SE>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError> + 'static,
        SE: Into<BoxError> + 'static,
    {
        let typed = TypedHandler::new(move |event: T, ctx: LambdaContext| {
            let fut = handler(event, ctx);
            async move {
                fut.await
                    .map(InvocationResult::stream)
                    .map_err(HandlerError::from_fault)
            }
        });
        self.insert(identifier, ResponseShape::Stream, typed);
    }

    /// Register a prebuilt handler.
    pub fn register_handler<H: Handler>(&mut self, identifier: &str, shape: ResponseShape, handler: H) {
        self.insert(identifier, shape, handler);
    }

    fn insert<H: Handler>(&mut self, identifier: &str, shape: ResponseShape, handler: H) {
        let previous = self.handlers.insert(
            identifier.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                shape,
            },
        );
        if previous.is_some() {
            tracing::warn!("Handler {} registered twice; keeping the last one", identifier);
        }
    }

    /// Get a handler by identifier.
    pub fn get_handler(&self, identifier: &str) -> Option<&dyn Handler> {
        self.handlers.get(identifier).map(|e| e.handler.as_ref())
    }

    /// Get the response shape for an identifier.
    pub fn get_response_shape(&self, identifier: &str) -> Option<ResponseShape> {
        self.handlers.get(identifier).map(|e| e.shape)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Resolve the configured handler.
    ///
    /// # Errors
    ///
    /// A missing entry is a lookup fault: a fatal [`HandlerError`] tagged
    /// `Runtime.HandlerNotFound`.
    pub fn resolve(&self, spec: &HandlerSpec) -> Result<ResolvedHandler, HandlerError> {
        let entry = self.handlers.get(spec.identifier()).ok_or_else(|| {
            let err = HandlerError::not_found(spec.identifier());
            let registered = self.identifiers().join(", ");
            let message = format!("{} (registered: [{}])", err.message(), registered);
            HandlerError::fatal(err.error_type(), message)
        })?;

        Ok(ResolvedHandler {
            handler: entry.handler.clone(),
            shape: entry.shape,
        })
    }
}
