//! Transport module - connections for the response path.
//!
//! The response POST is written by hand over a raw byte stream. A
//! [`Connector`] hands out one fresh stream per response; production uses
//! [`TcpConnector`], tests can plug in in-memory pipes.

mod tcp;

use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::handler::BoxFuture;

pub use tcp::TcpConnector;

/// Opens byte streams to the runtime API.
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a new connection.
    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>>;
}
