//! Handler module - identifiers, registry and result shapes.
//!
//! Provides:
//! - [`HandlerSpec`] - parsed `FILE.METHOD` / `FILE.CLASS.METHOD` identifier
//! - [`HandlerRegistry`] - maps identifiers to typed handlers
//! - [`InvocationResult`] - buffered or streamed handler output
//! - [`LambdaContext`] - per-invocation metadata passed to handlers
//!
//! # Example
//!
//! ```ignore
//! use lambda_runtime_client::handler::HandlerRegistry;
//! use futures::stream;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // Buffered JSON response
//! registry.register("app.echo", |event: serde_json::Value, _ctx| async move {
//!     Ok::<_, std::io::Error>(event)
//! });
//!
//! // Streamed response
//! registry.register_stream("app.Feed.tail", |n: usize, _ctx| async move {
//!     let lines = (0..n).map(|i| Ok::<_, std::io::Error>(format!("data: {}\n\n", i)));
//!     Ok::<_, std::io::Error>(stream::iter(lines))
//! });
//! ```

mod context;
mod registry;
mod response;
mod spec;

pub use context::{FunctionMetadata, Invocation, LambdaContext};
pub use registry::{
    BoxFuture, Handler, HandlerRegistry, HandlerResult, ResolvedHandler, ResponseShape,
    TypedHandler,
};
pub use response::{ChunkStream, InvocationResult, EVENT_STREAM_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use spec::HandlerSpec;
