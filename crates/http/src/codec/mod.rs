//! HTTP codec module for decoding requests and encoding responses
//!
//! - [`RequestDecoder`]: decodes a request head, then buffers its body, yielding one
//!   complete `http::Request<Bytes>` per message
//! - [`ResponseEncoder`]: serializes an `http::Response<Bytes>` as status line,
//!   headers and body
//!
//! # Example
//!
//! ```no_run
//! use newsdesk_http::codec::{RequestDecoder, ResponseEncoder};
//! use tokio_util::codec::{Decoder, Encoder};
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::from("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let request = decoder.decode(&mut request_buffer);
//! ```

mod header_decoder;
mod request_decoder;
mod response_encoder;

pub use header_decoder::HeaderDecoder;
pub use request_decoder::{RequestDecoder, DEFAULT_MAX_BODY_SIZE};
pub use response_encoder::ResponseEncoder;
