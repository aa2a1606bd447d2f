//! Request head for the streamed response POST.

use bytes::{BufMut, Bytes, BytesMut};

use crate::control::{
    ERROR_BODY_TRAILER, ERROR_TYPE_HEADER, RESPONSE_MODE_HEADER, STREAMING_RESPONSE_MODE,
};

/// Build the request line and headers of a chunked response POST.
///
/// The connection is closed after the body; the response is never reused.
pub fn encode_response_head(host: &str, path: &str, content_type: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(256 + host.len() + path.len() + content_type.len());

    put_line(&mut buf, &format!("POST {} HTTP/1.1", path));
    put_header(&mut buf, "Host", host);
    put_header(&mut buf, "Content-Type", content_type);
    put_header(&mut buf, RESPONSE_MODE_HEADER, STREAMING_RESPONSE_MODE);
    put_header(&mut buf, "Transfer-Encoding", "chunked");
    put_header(
        &mut buf,
        "Trailer",
        &format!("{}, {}", ERROR_TYPE_HEADER, ERROR_BODY_TRAILER),
    );
    put_header(&mut buf, "Connection", "close");
    buf.put_slice(b"\r\n");

    buf.freeze()
}

fn put_line(buf: &mut BytesMut, line: &str) {
    buf.put_slice(line.as_bytes());
    buf.put_slice(b"\r\n");
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_slice(b"\r\n");
}
