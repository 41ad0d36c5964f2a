//! The response produced by every request, successful or not.

use bytes::Bytes;
use http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use mime::Mime;
use tracing::warn;

/// An HTTP status code, headers and a body.
///
/// Every response starts with a `Content-Type` (`text/html` unless told otherwise)
/// and an `Access-Control-Allow-Origin: *` header. Headers can be changed until
/// the response is turned into its wire form by [`Response::into_http`], which
/// consumes it.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Creates a `text/html` response.
    pub fn new<B: Into<Bytes>>(status: StatusCode, body: B) -> Self {
        Self::with_content_type(status, body, &mime::TEXT_HTML)
    }

    pub fn with_content_type<B: Into<Bytes>>(status: StatusCode, body: B, content_type: &Mime) -> Self {
        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(CONTENT_TYPE, mime_value(content_type));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        Self { status, headers, body: body.into() }
    }

    pub fn html<B: Into<Bytes>>(body: B) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn text<B: Into<Bytes>>(status: StatusCode, body: B) -> Self {
        Self::with_content_type(status, body, &mime::TEXT_PLAIN_UTF_8)
    }

    pub fn json(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::with_content_type(status, value.to_string(), &mime::APPLICATION_JSON)
    }

    /// A `302 Found` pointing at `location`.
    pub fn redirect(location: &str) -> Self {
        let location = HeaderValue::from_str(location).unwrap_or_else(|e| {
            warn!(location, cause = %e, "redirect location is not a valid header value, using '/'");
            HeaderValue::from_static("/")
        });
        let mut response = Self::new(StatusCode::FOUND, Bytes::new());
        response.headers.insert(LOCATION, location);
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(&CONTENT_TYPE)
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a header value, keeping previous values of the same name.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.append(name, value);
        self
    }

    pub fn set_content_type(&mut self, content_type: &Mime) -> &mut Self {
        self.set_header(CONTENT_TYPE, mime_value(content_type))
    }

    /// Replaces the default `*` allowed origin.
    pub fn with_cors(mut self, origin: HeaderValue) -> Self {
        self.headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        self
    }

    /// Converts into the wire representation, adding `Content-Length`.
    pub fn into_http(self) -> http::Response<Bytes> {
        let Response { status, mut headers, body } = self;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut response = http::Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

fn mime_value(content_type: &Mime) -> HeaderValue {
    HeaderValue::from_str(content_type.as_ref()).unwrap_or_else(|_e| HeaderValue::from_static("application/octet-stream"))
}
