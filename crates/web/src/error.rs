//! Error types of the request pipeline and the error page they render to.
//!
//! Every failure inside [`Router::run`](crate::Router::run) ends up as a
//! [`DispatchError`], which is converted into a [`Response`] carrying its status
//! code and a short message. Nothing escapes to the host.

use crate::response::Response;
use http::{Method, StatusCode};
use thiserror::Error;

/// An error raised by a terminal handler, carrying the status code and message the
/// client should see.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self { status, message: message.into() }
    }

    /// Builds an error from a raw numeric code.
    ///
    /// Codes outside `400..=599` do not describe a failure and fall back to 500.
    pub fn from_code<S: Into<String>>(code: u16, message: S) -> Self {
        let status = StatusCode::from_u16(code)
            .ok()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, message)
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Every way dispatching a single request can fail.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route matches path '{path}'")]
    NotFound { path: String },

    #[error("method {method} is not allowed for path '{path}'")]
    MethodNotAllowed { method: Method, path: String },

    #[error("middleware '{name}' is not configured")]
    MiddlewareNotConfigured { name: String },

    #[error("handler error: {source}")]
    Handler {
        #[from]
        source: HandlerError,
    },

    #[error("handler panicked: {reason}")]
    Panicked { reason: String },
}

impl DispatchError {
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn method_not_allowed<S: Into<String>>(method: Method, path: S) -> Self {
        Self::MethodNotAllowed { method, path: path.into() }
    }

    pub fn middleware_not_configured<S: Into<String>>(name: S) -> Self {
        Self::MiddlewareNotConfigured { name: name.into() }
    }

    pub fn panicked<S: Into<String>>(reason: S) -> Self {
        Self::Panicked { reason: reason.into() }
    }

    /// The status code sent to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::MiddlewareNotConfigured { .. } | DispatchError::Panicked { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DispatchError::Handler { source } => source.status(),
        }
    }

    /// The short message sent to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> &str {
        match self {
            DispatchError::NotFound { .. } => "Page not found",
            DispatchError::MethodNotAllowed { .. } => "Method not allowed",
            DispatchError::MiddlewareNotConfigured { .. } | DispatchError::Panicked { .. } => "Internal error",
            DispatchError::Handler { source } => source.message(),
        }
    }
}

/// Renders the body sent along with a failed request.
pub type ErrorRenderer = dyn Fn(StatusCode, &str) -> Response + Send + Sync;

/// The default error page: a small HTML document carrying the numeric code and
/// the message.
pub fn error_page(status: StatusCode, message: &str) -> Response {
    let code = status.as_u16();
    let message = html_escape::encode_safe(message);
    let body = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{code} | {message}</title></head>\n<body>\n<h1>{code}</h1>\n<p>{message}</p>\n</body>\n</html>\n"
    );
    Response::new(status, body)
}

/// Raised while building a [`Router`](crate::Router).
#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("route {method} '{template}' is registered twice")]
    DuplicateRoute { method: Method, template: String },

    #[error("route template '{template}' can't compile: {source}")]
    InvalidTemplate {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("base url '{url}' is invalid: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },
}
