//! The HTTP/1.1 wire layer of newsdesk
//!
//! This crate turns a byte stream into fully buffered [`http::Request`] values and
//! writes [`http::Response`] values back out. Bodies are buffered whole before the
//! handler sees the request.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::{Request, Response, StatusCode};
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use newsdesk_http::connection::HttpConnection;
//! use newsdesk_http::handler::make_handler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer);
//!             match connection.process(handler).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!("service has error, cause {}, connection shutdown", e),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<Bytes>, Infallible> {
//!     info!(path = request.uri().path(), "request received");
//!     Ok(Response::builder().status(StatusCode::OK).body(Bytes::from_static(b"Hello World!\r\n")).unwrap())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the keep-alive processing loop of one connection
//! - [`protocol`]: request head type and error types
//! - [`codec`]: request decoding and response encoding
//! - [`handler`]: the async handler trait the connection drives
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - `Transfer-Encoding: chunked` request bodies are rejected
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
