//! Handler result shapes.
//!
//! A handler decides at registration time whether it answers with a single
//! buffered body or with a lazily produced sequence of chunks. Both are sent
//! with chunked transfer-coding; the difference is how many data chunks go
//! on the wire and the declared content type.

use std::fmt;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;

use crate::error::{BoxError, HandlerError};

/// Content type for buffered results.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content type for streamed results.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Lazily produced response chunks. An `Err` item ends the stream.
pub type ChunkStream = BoxStream<'static, Result<Bytes, HandlerError>>;

/// Normalized handler output.
pub enum InvocationResult {
    /// Fully materialized body, sent as one chunk.
    Buffered { body: Bytes, content_type: String },
    /// One chunk per produced element.
    Streamed {
        chunks: ChunkStream,
        content_type: String,
    },
}

impl InvocationResult {
    /// JSON-encode a value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::raw(body))
    }

    /// Pass bytes through unchanged.
    pub fn raw(body: impl Into<Bytes>) -> Self {
        Self::Buffered {
            body: body.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }

    /// Wrap a stream of chunks. Item errors are classified like handler
    /// errors and end the response with an error trailer.
    pub fn stream<S, B, E>(chunks: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Bytes>,
        E: Into<BoxError> + 'static,
    {
        let chunks = chunks
            .map(|item| item.map(Into::into).map_err(HandlerError::from_fault))
            .boxed();

        Self::Streamed {
            chunks,
            content_type: EVENT_STREAM_CONTENT_TYPE.to_string(),
        }
    }

    /// Override the declared content type.
    ///
    /// The builder's registration methods pick a default; custom
    /// [`Handler`](crate::handler::Handler) implementations use this to send
    /// something else.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        match &mut self {
            Self::Buffered { content_type: ct, .. } | Self::Streamed { content_type: ct, .. } => {
                *ct = content_type.into();
            }
        }
        self
    }

    pub fn content_type(&self) -> &str {
        match self {
            Self::Buffered { content_type, .. } | Self::Streamed { content_type, .. } => {
                content_type
            }
        }
    }

    #[inline]
    pub fn is_streamed(&self) -> bool {
        matches!(self, Self::Streamed { .. })
    }
}

impl fmt::Debug for InvocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered { body, content_type } => f
                .debug_struct("Buffered")
                .field("len", &body.len())
                .field("content_type", content_type)
                .finish(),
            Self::Streamed { content_type, .. } => f
                .debug_struct("Streamed")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_json_result() {
        let result = InvocationResult::json(&serde_json::json!({"ok": true})).unwrap();

        assert!(!result.is_streamed());
        assert_eq!(result.content_type(), JSON_CONTENT_TYPE);
        match result {
            InvocationResult::Buffered { body, .. } => assert_eq!(&body[..], br#"{"ok":true}"#),
            other => panic!("expected buffered, got {:?}", other),
        }
    }

    #[test]
    fn test_raw_is_pass_through() {
        let result = InvocationResult::raw("already encoded");
        match result {
            InvocationResult::Buffered { body, .. } => assert_eq!(&body[..], b"already encoded"),
            other => panic!("expected buffered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_result() {
        let items: Vec<Result<&'static str, std::io::Error>> = vec![Ok("a"), Ok("b")];
        let result = InvocationResult::stream(stream::iter(items));

        assert!(result.is_streamed());
        assert_eq!(result.content_type(), EVENT_STREAM_CONTENT_TYPE);

        let InvocationResult::Streamed { chunks, .. } = result else {
            panic!("expected streamed");
        };
        let collected: Vec<_> = chunks.collect().await;
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].as_ref().unwrap(), &Bytes::from_static(b"a"));
    }

    #[tokio::test]
    async fn test_stream_errors_are_classified() {
        let items: Vec<Result<Bytes, std::io::Error>> = vec![Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "upstream closed",
        ))];
        let InvocationResult::Streamed { mut chunks, .. } =
            InvocationResult::stream(stream::iter(items))
        else {
            panic!("expected streamed");
        };

        let err = chunks.next().await.unwrap().unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.error_type(), "Function<Error>");
        assert_eq!(err.message(), "upstream closed");
    }

    #[test]
    fn test_with_content_type() {
        let result = InvocationResult::raw("<p/>").with_content_type("text/html");
        assert_eq!(result.content_type(), "text/html");
    }
}
