//! # lambda-runtime-client
//!
//! Custom runtime client for a serverless function host.
//!
//! The crate polls the host's runtime API for invocations, dispatches each
//! one to a statically registered handler, and reports the outcome back.
//!
//! ## Architecture
//!
//! - **Control plane** (HTTP, `reqwest`): poll the next invocation, post error
//!   reports and init errors
//! - **Response path** (raw TCP): every successful result is POSTed with
//!   chunked transfer encoding, either as one chunk or streamed chunk by
//!   chunk; a mid-stream failure ends the body with error trailers
//!
//! ## Example
//!
//! ```ignore
//! use futures::stream;
//! use lambda_runtime_client::{bootstrap, RuntimeBuilder};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::process::ExitCode {
//!     let builder = RuntimeBuilder::new()
//!         .handle("app.echo", |event: serde_json::Value, _ctx| async move {
//!             Ok::<_, std::io::Error>(event)
//!         })
//!         .handle_stream("app.Feed.tail", |n: usize, _ctx| async move {
//!             let lines = (0..n).map(|i| Ok::<_, std::io::Error>(format!("data: {}\n\n", i)));
//!             Ok::<_, std::io::Error>(stream::iter(lines))
//!         });
//!
//!     bootstrap(builder).await
//! }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod handler;
pub mod invoker;
pub mod logging;
pub mod protocol;
pub mod runtime;
pub mod transport;
pub mod writer;

pub use config::RuntimeConfig;
pub use error::{Error, ErrorKind, HandlerError, Result};
pub use handler::{InvocationResult, LambdaContext};
pub use runtime::{bootstrap, ExitReason, Runtime, RuntimeBuilder};
