//! HTTP request head decoder
//!
//! Parses the request line and header fields with `httparse` and decides how many
//! body bytes follow, according to RFC 9112 section 6.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Buf, BytesMut};
use http::{HeaderName, HeaderValue, Method, Request, Uri};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request heads.
///
/// On success the head bytes are removed from the source buffer, leaving any body
/// bytes in place for the payload stage.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "GET / HTTP/1.1\r\n" is the shortest request line we can accept
        if src.len() < 14 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let method = req
                    .method
                    .ok_or(ParseError::InvalidMethod)
                    .and_then(|m| Method::from_bytes(m.as_bytes()).map_err(|_e| ParseError::InvalidMethod))?;
                let uri = req
                    .path
                    .ok_or(ParseError::InvalidUri)
                    .and_then(|p| Uri::try_from(p).map_err(|_e| ParseError::InvalidUri))?;

                let mut header_builder = Request::builder().method(method).uri(uri).version(version);
                for header in req.headers.iter() {
                    let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
                    header_builder = header_builder.header(name, value);
                }

                let header = RequestHeader::from(header_builder.body(()).map_err(ParseError::invalid_header)?);
                src.advance(body_offset);

                let payload_size = parse_payload(&header)?;
                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Determines the payload size from the `Content-Length` and `Transfer-Encoding` headers.
///
/// refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::Empty);
    }

    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Err(ParseError::unsupported_transfer_encoding("chunked request body"))
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value can't to_str"))?;

            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::Length(length))
        }

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers"))
        }
    }
}

/// Chunked must be the last encoding if present.
fn is_chunked(header_value: &HeaderValue) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    header_value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|bytes| bytes.trim_ascii() == CHUNKED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        let mut headers = HeaderMap::new();
        headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
        assert!(is_chunked(&headers[http::header::TRANSFER_ENCODING]));

        headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
        assert!(!is_chunked(&headers[http::header::TRANSFER_ENCODING]));

        headers.insert("Transfer-Encoding", "gzip".parse().unwrap());
        assert!(!is_chunked(&headers[http::header::TRANSFER_ENCODING]));
    }

    #[test]
    fn leaves_body_bytes_in_buffer() {
        let str = indoc! {r##"
        POST /news/register HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 3

        123"##};

        let mut bytes = BytesMut::from(str);

        let (header, payload_size) = HeaderDecoder.decode(&mut bytes).unwrap().unwrap();

        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(3));
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /news/info/42?draft=1 HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);

        let (header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();

        assert!(payload_size.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/news/info/42");
        assert_eq!(header.uri().query(), Some("draft=1"));

        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::ACCEPT), Some(&HeaderValue::from_static("*/*")));
        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_static("curl/7.79.1")));
    }

    #[test]
    fn partial_head_needs_more_data() {
        let mut buf = BytesMut::from("GET /home HTTP/1.1\r\nHost: local");
        assert!(HeaderDecoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn get_ignores_content_length() {
        let mut buf = BytesMut::from("GET /home HTTP/1.1\r\nContent-Length: 10\r\n\r\n");
        let (_header, payload_size) = HeaderDecoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);
    }

    #[test]
    fn rejects_chunked_body() {
        let mut buf = BytesMut::from("POST /login HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let result = HeaderDecoder.decode(&mut buf);
        assert!(matches!(result, Err(ParseError::UnsupportedTransferEncoding { .. })));
    }

    #[test]
    fn rejects_invalid_content_length() {
        let mut buf = BytesMut::from("POST /login HTTP/1.1\r\nContent-Length: ten\r\n\r\n");
        let result = HeaderDecoder.decode(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }
}
