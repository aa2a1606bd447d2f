//! Echo function - simple buffered response example.
//!
//! This example demonstrates:
//! - Registering a handler with typed input/output
//! - Running the poll/invoke/respond loop with `bootstrap`
//!
//! # Running against a runtime API
//!
//! ```sh
//! AWS_LAMBDA_RUNTIME_API=127.0.0.1:9001 \
//!     cargo run --example echo -- app.echo
//! ```

use lambda_runtime_client::{bootstrap, LambdaContext, RuntimeBuilder};
use serde::{Deserialize, Serialize};

/// Input structure for the echo handler.
#[derive(Deserialize, Debug)]
struct EchoInput {
    message: String,
}

/// Output structure for the echo handler.
#[derive(Serialize, Debug)]
struct EchoOutput {
    echo: String,
    request_id: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::process::ExitCode {
    let builder = RuntimeBuilder::new()
        .handle("app.echo", |data: EchoInput, ctx: LambdaContext| async move {
            Ok::<_, std::io::Error>(EchoOutput {
                echo: data.message,
                request_id: ctx.request_id().to_string(),
            })
        })
        .init(|| async {
            tracing::info!("Echo function warming up");
            Ok::<_, std::io::Error>(())
        });

    bootstrap(builder).await
}
