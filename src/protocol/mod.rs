//! Protocol module - wire framing for the streamed response body.
//!
//! This module implements the HTTP/1.1 pieces the response path writes by hand:
//! - the request head of the response POST
//! - chunk framing and the success terminator
//! - the error trailer block that ends a failed stream

mod chunked;
mod request;

pub use chunked::{encode_chunk, encode_error_trailer, ChunkedEncoder, TERMINATOR};
pub use request::encode_response_head;
