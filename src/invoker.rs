//! Handler invocation and fault classification.
//!
//! The [`Invoker`] holds the handler resolved at startup and turns every call
//! into either an [`InvocationResult`] or a classified [`HandlerError`]:
//!
//! - errors returned by user code are recoverable (unless already fatal)
//! - a panic unwinding out of user code is fatal, whether it happens while
//!   building the future, while awaiting it, or while producing stream chunks

use std::panic::AssertUnwindSafe;

use futures::{FutureExt, StreamExt};

use crate::error::HandlerError;
use crate::handler::{
    HandlerRegistry, HandlerResult, HandlerSpec, Invocation, InvocationResult, ResolvedHandler,
    ResponseShape,
};

/// Calls the configured handler.
pub struct Invoker {
    spec: HandlerSpec,
    resolved: ResolvedHandler,
}

impl Invoker {
    /// Resolve `spec` against the registry.
    ///
    /// # Errors
    ///
    /// Returns a fatal `Runtime.HandlerNotFound` error if nothing is
    /// registered under the identifier.
    pub fn new(registry: &HandlerRegistry, spec: HandlerSpec) -> Result<Self, HandlerError> {
        let resolved = registry.resolve(&spec)?;
        Ok(Self { spec, resolved })
    }

    #[inline]
    pub fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    #[inline]
    pub fn shape(&self) -> ResponseShape {
        self.resolved.shape
    }

    /// Run the handler for one invocation.
    pub async fn invoke(&self, invocation: Invocation) -> HandlerResult {
        let Invocation {
            request_id,
            payload,
            context,
        } = invocation;

        tracing::debug!(
            "Invoking {} (namespace: {:?}) for request {}",
            self.spec,
            self.spec.namespace(),
            request_id
        );

        let handler = &self.resolved.handler;
        let call = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload, context))) {
            Ok(fut) => fut,
            Err(panic) => return Err(HandlerError::from_panic(panic)),
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => Ok(guard_stream(result)),
            Ok(Err(err)) => Err(err),
            Err(panic) => Err(HandlerError::from_panic(panic)),
        }
    }
}

/// Turn panics raised while producing chunks into fatal stream items.
fn guard_stream(result: InvocationResult) -> InvocationResult {
    match result {
        InvocationResult::Streamed {
            chunks,
            content_type,
        } => {
            let chunks = AssertUnwindSafe(chunks)
                .catch_unwind()
                .map(|item| match item {
                    Ok(chunk) => chunk,
                    Err(panic) => Err(HandlerError::from_panic(panic)),
                })
                .boxed();
            InvocationResult::Streamed {
                chunks,
                content_type,
            }
        }
        buffered => buffered,
    }
}
