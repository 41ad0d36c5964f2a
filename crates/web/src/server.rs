//! Serves a [`Router`] over TCP.
//!
//! Each accepted connection gets its own tokio task driving an
//! [`HttpConnection`]. Every decoded request is handed to [`Router::run`], which
//! always produces a response.

use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::ACCESS_CONTROL_ALLOW_ORIGIN;
use http::HeaderValue;
use newsdesk_http::codec::{RequestDecoder, DEFAULT_MAX_BODY_SIZE};
use newsdesk_http::connection::HttpConnection;
use newsdesk_http::handler::Handler;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ConfigError, LogConfig};
use crate::request::Request;
use crate::router::Router;

#[derive(Debug)]
pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<String>,
    cors_origin: String,
    max_body_size: u64,
    log: LogConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            router: None,
            address: None,
            cors_origin: "*".to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            log: LogConfig::default(),
        }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// `Access-Control-Allow-Origin` sent when a response keeps the default `*`.
    pub fn cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }

    pub fn max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Takes address, CORS origin, body limit and log level from `config`.
    pub fn config(self, config: &AppConfig) -> Self {
        self.address(config.server.address.clone())
            .cors_origin(config.app.cors_origin.clone())
            .max_body_size(config.server.max_body_size)
            .log(config.log.clone())
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?;
        let resolved = address
            .to_socket_addrs()
            .map_err(|source| ServerBuildError::InvalidAddress { address: address.clone(), source })?
            .collect::<Vec<_>>();

        let cors_origin = match self.cors_origin.as_str() {
            "*" => None,
            origin => Some(HeaderValue::from_str(origin).map_err(|_e| ServerBuildError::InvalidCorsOrigin {
                origin: self.cors_origin.clone(),
            })?),
        };
        self.log.level()?;

        Ok(Server { router, address: resolved, cors_origin, max_body_size: self.max_body_size, log: self.log })
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,

    #[error("address must be set")]
    MissingAddress,

    #[error("can't resolve address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cors origin '{origin}' is not a valid header value")]
    InvalidCorsOrigin { origin: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug)]
pub struct Server {
    router: Router,
    address: Vec<SocketAddr>,
    cors_origin: Option<HeaderValue>,
    max_body_size: u64,
    log: LogConfig,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn address(&self) -> &[SocketAddr] {
        &self.address
    }

    /// Runs one wire request through the router.
    pub fn respond(&self, request: http::Request<Bytes>) -> http::Response<Bytes> {
        let mut response = self.router.run(Request::from(request));
        if let Some(origin) = &self.cors_origin
            && response.header(&ACCESS_CONTROL_ALLOW_ORIGIN) == Some("*")
        {
            response = response.with_cors(origin.clone());
        }
        response.into_http()
    }

    /// Installs the log subscriber, binds and serves until the process ends.
    pub async fn start(self) {
        if let Err(e) = self.log.init() {
            eprintln!("can't initialise logging: {e}");
        }

        info!(address = ?self.address, base_url = self.router.base_url(), "start listening");
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        let server = Arc::new(self);
        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let decoder = RequestDecoder::with_max_body_size(server.max_body_size);
                let connection = HttpConnection::with_decoder(reader, writer, decoder);
                match connection.process(server).await {
                    Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(%remote_addr, "service has error, cause {}, connection shutdown", e),
                }
            });
        }
    }
}

#[async_trait]
impl Handler for Server {
    type Error = Infallible;

    async fn call(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>, Self::Error> {
        Ok(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::handler_fn;
    use crate::request::RequestContext;
    use crate::router::{get, post};
    use http::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn router() -> Router {
        Router::builder()
            .base_url("http://localhost:8080/newsdesk")
            .route(
                "/user/{cpf}",
                get(handler_fn(|req: &RequestContext<'_>| Ok::<_, HandlerError>(format!("user {}", req.var("cpf"))))),
            )
            .route(
                "/api/news",
                post(handler_fn(|req: &RequestContext<'_>| {
                    let title = req.request().body_var("title").and_then(|v| v.as_str()).unwrap_or_default();
                    Ok::<_, HandlerError>((StatusCode::CREATED, serde_json::json!({ "title": title })))
                })),
            )
            .build()
            .unwrap()
    }

    fn server() -> Server {
        Server::builder().router(router()).address("127.0.0.1:0").build().unwrap()
    }

    #[test]
    fn build_requires_router_and_address() {
        assert!(matches!(Server::builder().address("127.0.0.1:0").build(), Err(ServerBuildError::MissingRouter)));
        assert!(matches!(Server::builder().router(router()).build(), Err(ServerBuildError::MissingAddress)));
        assert!(matches!(
            Server::builder().router(router()).address("not an address").build(),
            Err(ServerBuildError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn build_from_config() {
        let mut config = AppConfig::default();
        config.server.address = "127.0.0.1:0".to_owned();
        config.log.level = "verbose".to_owned();

        let result = Server::builder().router(router()).config(&config).build();
        assert!(matches!(result, Err(ServerBuildError::Config(ConfigError::InvalidLogLevel { .. }))));
    }

    #[test]
    fn respond_adds_content_length_and_cors() {
        let server = Server::builder()
            .router(router())
            .address("127.0.0.1:0")
            .cors_origin("https://newsdesk.example")
            .build()
            .unwrap();

        let request = http::Request::get("/newsdesk/user/12345678901").body(Bytes::new()).unwrap();
        let response = server.respond(request);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://newsdesk.example");
        assert_eq!(response.headers()[http::header::CONTENT_LENGTH], "16");
        assert_eq!(response.body().as_ref(), b"user 12345678901");
    }

    #[tokio::test]
    async fn serve_over_connection() {
        let (client, server_io) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        let input = concat!(
            "POST /newsdesk/api/news HTTP/1.1\r\n",
            "Host: localhost\r\n",
            "Content-Type: application/json\r\n",
            "Content-Length: 24\r\n",
            "\r\n",
            "{\"title\":\"Election day\"}",
            "GET /newsdesk/missing HTTP/1.1\r\n",
            "Host: localhost\r\n",
            "Connection: close\r\n",
            "\r\n",
        );

        client_write.write_all(input.as_bytes()).await.unwrap();
        client_write.shutdown().await.unwrap();

        let connection = HttpConnection::new(server_read, server_write);
        connection.process(Arc::new(server())).await.unwrap();

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();

        assert!(output.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(output.contains("content-type: application/json\r\n"));
        assert!(output.contains(r#"{"title":"Election day"}"#));
        assert!(output.contains("HTTP/1.1 404 Not Found\r\n"));
        assert!(output.contains("<h1>404</h1>"));
    }
}
