use http::header::{ORIGIN, REFERER};
use http::{HeaderValue, StatusCode};
use tracing::warn;

use super::{Middleware, Next};
use crate::error::DispatchError;
use crate::request::RequestContext;
use crate::response::Response;

/// Accepts only requests sent from the application's own pages: both the
/// `Origin` and `Referer` headers must equal the configured values. A missing
/// header counts as the empty string.
#[derive(Debug, Clone)]
pub struct RequireWebsiteOrigin {
    origin: String,
    referer: String,
}

impl RequireWebsiteOrigin {
    pub fn new(origin: impl Into<String>, referer: impl Into<String>) -> Self {
        Self { origin: origin.into(), referer: referer.into() }
    }
}

impl Middleware for RequireWebsiteOrigin {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        let origin = req.request().header(&ORIGIN).unwrap_or_default();
        let referer = req.request().header(&REFERER).unwrap_or_default();

        if origin == self.origin && referer == self.referer {
            return next.run(req);
        }

        warn!(origin, referer, path = req.request().path(), "request from foreign origin denied");
        let body = serde_json::json!({ "success": false, "data": "", "message": "Access denied." });
        let response = Response::json(StatusCode::UNAUTHORIZED, &body);
        Ok(match HeaderValue::from_str(origin) {
            Ok(origin) => response.with_cors(origin),
            Err(_) => response,
        })
    }
}
