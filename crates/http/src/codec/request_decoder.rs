//! HTTP request decoder
//!
//! Decoding happens in two phases:
//! 1. the request head is parsed by [`HeaderDecoder`]
//! 2. the body announced by `Content-Length` is buffered until complete
//!
//! Only then is a `Request<Bytes>` yielded, so consumers always see the whole
//! message.

use crate::codec::header_decoder::HeaderDecoder;
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};
use bytes::{Bytes, BytesMut};
use http::Request;
use tokio_util::codec::Decoder;
use tracing::trace;

/// Default upper bound for a request body
pub const DEFAULT_MAX_BODY_SIZE: u64 = 8 * 1024 * 1024;

/// A decoder that yields one fully buffered request per HTTP message
///
/// # State Machine
///
/// - `pending == None`: waiting for a request head
/// - `pending == Some((head, length))`: waiting for `length` body bytes
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    pending: Option<(RequestHeader, usize)>,
    max_body_size: u64,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder rejecting bodies larger than `max_body_size` bytes.
    pub fn with_max_body_size(max_body_size: u64) -> Self {
        Self { header_decoder: HeaderDecoder, pending: None, max_body_size }
    }

    fn body_length(&self, payload_size: PayloadSize) -> Result<usize, ParseError> {
        let length = match payload_size {
            PayloadSize::Empty => 0,
            PayloadSize::Length(length) => length,
        };
        ensure!(length <= self.max_body_size, ParseError::too_large_body(length, self.max_body_size));
        usize::try_from(length).map_err(|_e| ParseError::too_large_body(length, self.max_body_size))
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }
}

impl Decoder for RequestDecoder {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// - `Ok(Some(request))`: a complete request was decoded
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the stream is not a valid request, the connection should be closed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (header, length) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.header_decoder.decode(src)? {
                Some((header, payload_size)) => {
                    let length = self.body_length(payload_size)?;
                    (header, length)
                }
                None => return Ok(None),
            },
        };

        if src.len() < length {
            trace!(expected = length, received = src.len(), "waiting for request body");
            src.reserve(length - src.len());
            self.pending = Some((header, length));
            return Ok(None);
        }

        let body = src.split_to(length).freeze();
        Ok(Some(header.body(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn decode_request_without_body() {
        let mut buf = BytesMut::from("GET /news HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let request = RequestDecoder::new().decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.uri().path(), "/news");
        assert!(request.body().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_body_arriving_in_pieces() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /login HTTP/1.1\r\nContent-Length: 11\r\n\r\n{\"cpf\":");

        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"\"1\"}");
        let request = decoder.decode(&mut buf).unwrap().unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.body().as_ref(), b"{\"cpf\":\"1\"}");
    }

    #[test]
    fn decode_pipelined_requests() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nokGET /b HTTP/1.1\r\n\r\n");

        let first = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.uri().path(), "/a");
        assert_eq!(first.body().as_ref(), b"ok");

        let second = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.uri().path(), "/b");
    }

    #[test]
    fn reject_too_large_body() {
        let mut decoder = RequestDecoder::with_max_body_size(4);
        let mut buf = BytesMut::from("POST /login HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

        let result = decoder.decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeBody { current_size: 5, max_size: 4 })));
    }
}
