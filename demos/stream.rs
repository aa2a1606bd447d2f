//! Stream function - example of streaming chunks to the caller.
//!
//! This example demonstrates:
//! - Creating a streaming handler with `handle_stream`
//! - Producing chunks lazily from an async stream
//! - Failing mid-stream, which ends the body with error trailers
//!
//! # Running against a runtime API
//!
//! ```sh
//! AWS_LAMBDA_RUNTIME_API=127.0.0.1:9001 \
//!     cargo run --example stream -- app.Generator.generate
//! ```
//!
//! Invoke with `{"count": 5}` for five events, or `{"count": 5, "fail_at": 3}`
//! to see the stream cut short.

use std::time::Duration;

use futures::StreamExt;
use lambda_runtime_client::{bootstrap, LambdaContext, RuntimeBuilder};
use serde::{Deserialize, Serialize};

/// Input structure for the generate handler.
#[derive(Deserialize, Debug)]
struct GenerateInput {
    count: usize,
    #[serde(default)]
    fail_at: Option<usize>,
}

/// Event sent in each chunk.
#[derive(Serialize, Debug)]
struct Event {
    index: usize,
    data: String,
}

#[derive(Debug, thiserror::Error)]
#[error("generator stopped at index {0}")]
struct GeneratorStopped(usize);

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let builder = RuntimeBuilder::new().handle_stream(
        "app.Generator.generate",
        |input: GenerateInput, ctx: LambdaContext| async move {
            tracing::info!(
                "Generating {} events for {} ({:?} left)",
                input.count,
                ctx.request_id(),
                ctx.remaining_time()
            );

            let fail_at = input.fail_at;
            let events = futures::stream::iter(0..input.count).then(move |index| async move {
                // Simulate some work
                tokio::time::sleep(Duration::from_millis(10)).await;

                if fail_at == Some(index) {
                    return Err(GeneratorStopped(index));
                }

                let event = Event {
                    index,
                    data: format!("Chunk {}", index),
                };
                let json = serde_json::to_string(&event).unwrap_or_default();
                Ok(format!("data: {}\n\n", json))
            });

            Ok::<_, std::io::Error>(events)
        },
    );

    bootstrap(builder).await
}
