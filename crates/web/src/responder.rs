//! Converts handler return values into a [`Response`].
//!
//! Handlers may return anything implementing [`Responder`]: a prepared
//! [`Response`], an HTML string, a JSON value, or one of those paired with a
//! status code. A missing value (`None`) is reported as a `404` handler error,
//! so the router renders it like any other error.

use crate::error::{error_page, HandlerError};
use crate::request::RequestContext;
use crate::response::Response;
use http::StatusCode;

const NOT_FOUND_MESSAGE: &str = "Page not found";

/// A type that can be turned into a [`Response`].
pub trait Responder: Sized {
    fn response_to(self, req: &RequestContext<'_>) -> Response;

    /// Like [`response_to`](Responder::response_to), but leaves failures to the
    /// caller's error rendering. Handlers are converted through this.
    fn try_response_to(self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        Ok(self.response_to(req))
    }
}

impl Responder for Response {
    fn response_to(self, _req: &RequestContext<'_>) -> Response {
        self
    }
}

/// Both arms must themselves be responders.
impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, req: &RequestContext<'_>) -> Response {
        match self {
            Ok(t) => t.response_to(req),
            Err(e) => e.response_to(req),
        }
    }

    fn try_response_to(self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        match self {
            Ok(t) => t.try_response_to(req),
            Err(e) => e.try_response_to(req),
        }
    }
}

/// `None` is a `404`. Through a handler it becomes a [`HandlerError`] and gets
/// the router's error page; converted directly it gets the default
/// [`error_page`].
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &RequestContext<'_>) -> Response {
        match self {
            Some(t) => t.response_to(req),
            None => error_page(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
        }
    }

    fn try_response_to(self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        match self {
            Some(t) => t.try_response_to(req),
            None => Err(HandlerError::not_found(NOT_FOUND_MESSAGE)),
        }
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &RequestContext<'_>) -> Response {
        let (status, responder) = self;
        let mut response = responder.response_to(req);
        response.set_status(status);
        response
    }

    fn try_response_to(self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        let (status, responder) = self;
        let mut response = responder.try_response_to(req)?;
        response.set_status(status);
        Ok(response)
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, req: &RequestContext<'_>) -> Response {
        (*self).response_to(req)
    }

    fn try_response_to(self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        (*self).try_response_to(req)
    }
}

impl Responder for () {
    fn response_to(self, _req: &RequestContext<'_>) -> Response {
        Response::new(StatusCode::OK, "")
    }
}

impl Responder for String {
    fn response_to(self, _req: &RequestContext<'_>) -> Response {
        Response::html(self)
    }
}

impl Responder for &'static str {
    fn response_to(self, _req: &RequestContext<'_>) -> Response {
        Response::html(self)
    }
}

impl Responder for serde_json::Value {
    fn response_to(self, _req: &RequestContext<'_>) -> Response {
        Response::json(StatusCode::OK, &self)
    }
}
