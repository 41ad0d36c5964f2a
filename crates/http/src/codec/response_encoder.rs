//! HTTP response encoder
//!
//! Serializes a buffered response as status line, header fields, `Content-Length`
//! and body, in that order.

use crate::protocol::SendError;

use bytes::{BufMut, Bytes, BytesMut};

use http::{header, HeaderValue, Response, Version};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseEncoder;

impl ResponseEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Response<Bytes>> for ResponseEncoder {
    type Error = SendError;

    /// The `Content-Length` header always reflects the actual body length,
    /// overriding any value set by the handler.
    fn encode(&mut self, item: Response<Bytes>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, body) = item.into_parts();

        dst.reserve(INIT_HEADER_SIZE + body.len());
        match head.version {
            Version::HTTP_11 => {
                write!(
                    FastWrite(dst),
                    "HTTP/1.1 {} {}\r\n",
                    head.status.as_str(),
                    head.status.canonical_reason().unwrap_or("Unknown")
                )?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::unsupported_version(format!("{v:?}")));
            }
        }

        head.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        for (header_name, header_value) in &head.headers {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&body);
        Ok(())
    }
}

/// Writes into a `BytesMut` whose capacity has already been reserved.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn encode(response: Response<Bytes>) -> String {
        let mut dst = BytesMut::new();
        ResponseEncoder.encode(response, &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn encode_status_headers_then_body() {
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/html")
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .body(Bytes::from_static(b"<h1>news</h1>"))
            .unwrap();

        assert_eq!(
            encode(response),
            "HTTP/1.1 200 OK\r\ncontent-type: text/html\r\naccess-control-allow-origin: *\r\ncontent-length: 13\r\n\r\n<h1>news</h1>"
        );
    }

    #[test]
    fn encode_overrides_wrong_content_length() {
        let response = Response::builder()
            .status(StatusCode::FOUND)
            .header(header::CONTENT_LENGTH, "99")
            .header(header::LOCATION, "/")
            .body(Bytes::new())
            .unwrap();

        assert_eq!(encode(response), "HTTP/1.1 302 Found\r\ncontent-length: 0\r\nlocation: /\r\n\r\n");
    }

    #[test]
    fn reject_http_2_response() {
        let response = Response::builder().version(Version::HTTP_2).body(Bytes::new()).unwrap();
        let mut dst = BytesMut::new();
        assert!(matches!(ResponseEncoder.encode(response, &mut dst), Err(SendError::UnsupportedVersion { .. })));
    }
}
