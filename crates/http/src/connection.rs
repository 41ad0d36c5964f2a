//! Connection handling
//!
//! [`HttpConnection`] drives one client connection: it decodes requests, hands
//! each one to a [`Handler`] and writes the response back, for as long as the
//! client keeps the connection open.

use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{Response, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::Handler;
use crate::protocol::HttpError;

/// An HTTP connection that decodes requests and sends responses
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_decoder(reader, writer, RequestDecoder::new())
    }

    pub fn with_decoder(reader: R, writer: W, decoder: RequestDecoder) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, decoder, 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
        }
    }

    /// Processes requests until the client closes the connection or sends
    /// something that is not a valid request.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
    {
        loop {
            match self.framed_read.next().await {
                Some(Ok(request)) => {
                    let keep_alive = is_keep_alive(&request);
                    let response_result = handler.call(request).await;
                    self.send_response(response_result).await?;
                    if !keep_alive {
                        info!("client asked to close the connection");
                        return Ok(());
                    }
                }

                Some(Err(e)) => {
                    error!("can't receive next request, cause {}", e);
                    let error_response = build_error_response(StatusCode::BAD_REQUEST);
                    self.framed_write.send(error_response).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn send_response<E>(&mut self, response_result: Result<Response<Bytes>, E>) -> Result<(), HttpError>
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        let response = match response_result {
            Ok(response) => response,
            Err(e) => {
                error!("handle response error, cause: {}", e.into());
                build_error_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };

        self.framed_write.send(response).await.map_err(HttpError::from)
    }
}

fn is_keep_alive<T>(request: &http::Request<T>) -> bool {
    let connection = request.headers().get(http::header::CONNECTION).map(http::HeaderValue::as_bytes);
    match request.version() {
        Version::HTTP_10 => connection.is_some_and(|value| value.eq_ignore_ascii_case(b"keep-alive")),
        _ => !connection.is_some_and(|value| value.eq_ignore_ascii_case(b"close")),
    }
}

fn build_error_response(status_code: StatusCode) -> Response<Bytes> {
    let mut response = Response::new(Bytes::new());
    *response.status_mut() = status_code;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use std::convert::Infallible;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn echo_path(request: http::Request<Bytes>) -> Result<Response<Bytes>, Infallible> {
        Ok(Response::new(Bytes::from(request.uri().path().to_owned())))
    }

    async fn run(input: &'static [u8]) -> (Result<(), HttpError>, String) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        client_write.write_all(input).await.unwrap();
        client_write.shutdown().await.unwrap();

        let connection = HttpConnection::new(server_read, server_write);
        let result = connection.process(Arc::new(make_handler(echo_path))).await;

        let mut output = Vec::new();
        client_read.read_to_end(&mut output).await.unwrap();
        (result, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn serve_two_keep_alive_requests() {
        let (result, output) = run(b"GET /home HTTP/1.1\r\n\r\nGET /news HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n/homeHTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n/news"
        );
    }

    #[tokio::test]
    async fn stop_after_connection_close() {
        let (result, output) = run(b"GET /home HTTP/1.1\r\nConnection: close\r\n\r\nGET /news HTTP/1.1\r\n\r\n").await;

        assert!(result.is_ok());
        assert_eq!(output, "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\n/home");
    }

    #[tokio::test]
    async fn answer_bad_request_on_parse_error() {
        let (result, output) = run(b"POST /login HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").await;

        assert!(result.is_err());
        assert_eq!(output, "HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\n\r\n");
    }
}
