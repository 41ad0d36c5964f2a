//! The request snapshot and the context handed to handlers and middleware.
//!
//! - [`Request`]: method, URI, decoded query/form/JSON data and headers, built once
//!   per HTTP call and read-only afterwards
//! - [`PathVars`]: the variables bound from the matched route template
//! - [`RequestContext`]: what every middleware and handler receives

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, HeaderName, Method};
use mime::Mime;
use tracing::debug;

use crate::response::Response;

/// An incoming HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    raw_uri: String,
    path: String,
    query_params: HashMap<String, String>,
    post_vars: HashMap<String, String>,
    body_vars: serde_json::Map<String, serde_json::Value>,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target exactly as received, query string included.
    pub fn raw_uri(&self) -> &str {
        &self.raw_uri
    }

    /// The path used for route matching: no query string, no router prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Fields of an `application/x-www-form-urlencoded` body.
    pub fn post_vars(&self) -> &HashMap<String, String> {
        &self.post_vars
    }

    pub fn post_var(&self, name: &str) -> Option<&str> {
        self.post_vars.get(name).map(String::as_str)
    }

    /// Members of a JSON object body. Empty for anything else.
    pub fn body_vars(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.body_vars
    }

    pub fn body_var(&self, name: &str) -> Option<&serde_json::Value> {
        self.body_vars.get(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The first value of `name`, if it is valid visible ASCII.
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Looks a cookie up across every `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Removes the router prefix from the matching path.
    ///
    /// Only a leading `prefix` ending on a segment boundary is removed. The
    /// bare prefix becomes `/`.
    pub(crate) fn strip_prefix(&mut self, prefix: &str) {
        if prefix.is_empty() {
            return;
        }
        match self.path.strip_prefix(prefix) {
            Some("") => self.path = "/".to_owned(),
            Some(rest) if rest.starts_with('/') => self.path = rest.to_owned(),
            _ => {}
        }
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();

        let raw_uri = parts.uri.to_string();
        let path = match parts.uri.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };
        let query_params = parts.uri.query().map(decode_urlencoded).unwrap_or_default();
        let post_vars = if is_form(&parts.headers) { decode_urlencoded_bytes(&body) } else { HashMap::new() };
        let body_vars = decode_json_object(&body);

        Self { method: parts.method, raw_uri, path, query_params, post_vars, body_vars, headers: parts.headers, body }
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<Mime>().ok())
        .is_some_and(|mime| mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

// later duplicates of a key overwrite earlier ones
fn decode_urlencoded(input: &str) -> HashMap<String, String> {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(input) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            debug!(cause = %e, "can't decode url encoded data, using empty mapping");
            HashMap::new()
        }
    }
}

fn decode_urlencoded_bytes(input: &[u8]) -> HashMap<String, String> {
    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(input) {
        Ok(pairs) => pairs.into_iter().collect(),
        Err(e) => {
            debug!(cause = %e, "can't decode form body, using empty mapping");
            HashMap::new()
        }
    }
}

fn decode_json_object(body: &[u8]) -> serde_json::Map<String, serde_json::Value> {
    if body.is_empty() {
        return serde_json::Map::new();
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            debug!(kind = json_kind(&other), "json body is not an object, using empty mapping");
            serde_json::Map::new()
        }
        Err(e) => {
            debug!(cause = %e, "body is not json, using empty mapping");
            serde_json::Map::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Variables bound from a route template, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathVars {
    vars: Vec<(String, String)>,
}

impl PathVars {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: &str, value: &str) {
        self.vars.push((name.to_owned(), value.to_owned()));
    }

    /// Gets a bound value. A name used twice in one template resolves to its
    /// last capture.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathVars {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self { vars: iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect() }
    }
}

/// The request, its bound path variables and the application base URL.
///
/// Handlers ask for the variables they need by name; nothing is bound by
/// position.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    request: &'a Request,
    vars: &'a PathVars,
    base_url: &'a str,
}

impl<'a> RequestContext<'a> {
    pub fn new(request: &'a Request, vars: &'a PathVars, base_url: &'a str) -> Self {
        Self { request, vars, base_url }
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn path_vars(&self) -> &'a PathVars {
        self.vars
    }

    pub fn path_var(&self, name: &str) -> Option<&'a str> {
        self.vars.get(name)
    }

    /// The bound value of `name`, or `""` when the route doesn't declare it.
    pub fn var(&self, name: &str) -> &'a str {
        self.vars.get(name).unwrap_or_default()
    }

    pub fn base_url(&self) -> &'a str {
        self.base_url
    }

    /// A redirect to `route` below the application base URL.
    pub fn redirect(&self, route: &str) -> Response {
        let base = self.base_url.trim_end_matches('/');
        let route = route.trim_start_matches('/');
        Response::redirect(&format!("{base}/{route}"))
    }
}
