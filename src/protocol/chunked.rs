//! HTTP/1.1 chunked transfer encoding with error trailers.
//!
//! ```text
//! data chunk:   <len hex>\r\n<data>\r\n
//! success end:  0\r\n\r\n
//! error end:    0\r\n
//!               Lambda-Runtime-Function-Error-Type: <tag>\r\n
//!               Lambda-Runtime-Function-Error-Body: <base64 message>\r\n
//!               \r\n
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::control::{ERROR_BODY_TRAILER, ERROR_TYPE_HEADER};

/// Terminating chunk of a successful body.
pub const TERMINATOR: &[u8] = b"0\r\n\r\n";

/// Frame one data chunk.
///
/// An empty `data` would read as the terminator, so callers must skip it.
pub fn encode_chunk(data: &[u8]) -> Bytes {
    let size = format!("{:x}", data.len());
    let mut buf = BytesMut::with_capacity(size.len() + data.len() + 4);
    buf.put_slice(size.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Terminating chunk plus error trailers.
///
/// CR and LF are removed from the tag so it cannot break the trailer block.
/// The message travels base64-encoded.
pub fn encode_error_trailer(error_type: &str, message: &str) -> Bytes {
    let tag: String = error_type
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();
    let body = STANDARD.encode(message.as_bytes());

    let mut buf = BytesMut::with_capacity(tag.len() + body.len() + 80);
    buf.put_slice(b"0\r\n");
    buf.put_slice(ERROR_TYPE_HEADER.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(tag.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(ERROR_BODY_TRAILER.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(body.as_bytes());
    buf.put_slice(b"\r\n\r\n");
    buf.freeze()
}

/// Writes a chunked body to an async sink.
///
/// Every chunk is flushed as soon as it is written so the receiver sees it
/// without waiting for the end of the body. The encoder does not close the
/// underlying stream.
pub struct ChunkedEncoder<W> {
    inner: W,
    chunks_written: usize,
    bytes_written: usize,
}

impl<W: AsyncWrite + Unpin> ChunkedEncoder<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            chunks_written: 0,
            bytes_written: 0,
        }
    }

    /// Write and flush one chunk. Empty input writes nothing.
    pub async fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.inner.write_all(&encode_chunk(data)).await?;
        self.inner.flush().await?;

        self.chunks_written += 1;
        self.bytes_written += data.len();
        Ok(())
    }

    /// End the body successfully.
    pub async fn finish(&mut self) -> std::io::Result<()> {
        self.inner.write_all(TERMINATOR).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// End the body with error trailers.
    pub async fn finish_with_error(&mut self, error_type: &str, message: &str) -> std::io::Result<()> {
        self.inner
            .write_all(&encode_error_trailer(error_type, message))
            .await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Data chunks written so far.
    #[inline]
    pub fn chunks_written(&self) -> usize {
        self.chunks_written
    }

    /// Payload bytes written so far, framing excluded.
    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
