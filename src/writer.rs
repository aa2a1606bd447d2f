//! Response writer for the success path.
//!
//! Every successful invocation result is POSTed to
//! `/invocation/{id}/response` as a chunked body over a fresh connection:
//!
//! ```text
//! Buffered ─► head ─► [one chunk] ─► 0\r\n\r\n ─► close
//! Streamed ─► head ─► chunk ─► chunk ─► ... ─► 0\r\n\r\n ─► close
//!                                   └─ fault ─► error trailer ─► close
//! ```
//!
//! A fault raised by the chunk stream ends the body with error trailers and
//! is handed back to the caller for classification.

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::control::Endpoints;
use crate::error::{CommunicationError, Error, HandlerError, Result};
use crate::handler::{ChunkStream, InvocationResult};
use crate::protocol::{encode_response_head, ChunkedEncoder};
use crate::transport::Connector;

/// Writes invocation results to the runtime API.
pub struct ResponseWriter<C> {
    connector: C,
    endpoints: Endpoints,
}

impl<C: Connector> ResponseWriter<C> {
    pub fn new(connector: C, endpoints: Endpoints) -> Self {
        Self {
            connector,
            endpoints,
        }
    }

    #[inline]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Send `result` as the response of `request_id`.
    ///
    /// The connection is shut down whatever the outcome. The host's HTTP
    /// status for the POST is not read (the request is sent with
    /// `Connection: close`), so `Ok(())` means the body was written, not
    /// that the host accepted it.
    ///
    /// # Errors
    ///
    /// - [`Error::Communication`] if connecting or writing fails
    /// - [`Error::Handler`] if the chunk stream yielded a fault; the error
    ///   trailer has already been written when this is returned
    pub async fn send(&self, request_id: &str, result: InvocationResult) -> Result<()> {
        let stream = self
            .connector
            .connect()
            .await
            .map_err(CommunicationError::Io)?;

        let path = self.endpoints.response_path(request_id);
        let head = encode_response_head(self.endpoints.host(), &path, result.content_type());

        let mut encoder = ChunkedEncoder::new(stream);
        let outcome = write_response(&mut encoder, head, result).await;

        if let Err(e) = encoder.get_mut().shutdown().await {
            tracing::debug!("Response connection shutdown failed: {}", e);
        }

        if outcome.is_ok() {
            tracing::debug!(
                "Sent response for {} ({} chunks, {} bytes)",
                request_id,
                encoder.chunks_written(),
                encoder.bytes_written()
            );
        }
        outcome
    }
}

async fn write_response<W>(
    encoder: &mut ChunkedEncoder<W>,
    head: Bytes,
    result: InvocationResult,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    encoder
        .get_mut()
        .write_all(&head)
        .await
        .map_err(CommunicationError::Io)?;

    match result {
        InvocationResult::Buffered { body, .. } => {
            encoder
                .write_chunk(&body)
                .await
                .map_err(CommunicationError::Io)?;
        }
        InvocationResult::Streamed { chunks, .. } => {
            if let Err(fault) = write_stream(encoder, chunks).await? {
                return Err(Error::Handler(fault));
            }
        }
    }

    encoder.finish().await.map_err(CommunicationError::Io)?;
    Ok(())
}

/// Copy chunks until the stream ends or faults.
///
/// The outer result is a transport failure; the inner one is a fault from
/// the stream, already written as trailers.
async fn write_stream<W>(
    encoder: &mut ChunkedEncoder<W>,
    mut chunks: ChunkStream,
) -> std::result::Result<std::result::Result<(), HandlerError>, CommunicationError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = chunks.next().await {
        match item {
            Ok(chunk) => encoder.write_chunk(&chunk).await?,
            Err(fault) => {
                tracing::warn!(
                    "Response stream failed after {} chunks: {}",
                    encoder.chunks_written(),
                    fault
                );
                // Best effort: the fault is what the caller needs to see.
                if let Err(e) = encoder
                    .finish_with_error(fault.error_type(), fault.message())
                    .await
                {
                    tracing::debug!("Could not write error trailer: {}", e);
                }
                return Ok(Err(fault));
            }
        }
    }
    Ok(Ok(()))
}
