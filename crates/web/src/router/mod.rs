//! Matches requests to routes and drives their middleware queue.
//!
//! ```
//! use newsdesk_web::middleware::{middleware_fn, Middlewares};
//! use newsdesk_web::router::{get, post, Router};
//! use newsdesk_web::{handler_fn, HandlerError, RequestContext};
//!
//! let middlewares = Middlewares::builder()
//!     .add("log", middleware_fn(|req, next| next.run(req)))
//!     .defaults(["log"])
//!     .build();
//!
//! let router = Router::builder()
//!     .base_url("http://localhost/newsdesk")
//!     .middlewares(middlewares)
//!     .route("/", get(handler_fn(|_req: &RequestContext<'_>| Ok::<_, HandlerError>("<h1>newsdesk</h1>"))))
//!     .route(
//!         "/user/{cpf}",
//!         post(handler_fn(|req: &RequestContext<'_>| Ok::<_, HandlerError>(format!("saved {}", req.var("cpf"))))),
//!     )
//!     .build()
//!     .unwrap();
//! # let _ = router;
//! ```

mod table;

pub use table::{compile_template, CompiledTemplate, Resolution, RouteTable};

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use http::{Method, Uri};
use tracing::{debug, error, info, warn};

use crate::error::{error_page, DispatchError, ErrorRenderer, RouterBuildError};
use crate::handler::RequestHandler;
use crate::middleware::{MiddlewareQueue, Middlewares};
use crate::request::{Request, RequestContext};
use crate::response::Response;

pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// A registered handler and the middleware named for it.
pub struct Route {
    middlewares: Vec<String>,
    handler: Box<dyn RequestHandler>,
}

impl Route {
    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("middlewares", &self.middlewares).finish_non_exhaustive()
    }
}

/// The application's routes, middleware registry and error page.
///
/// Read-only once built, so one instance serves every connection.
pub struct Router {
    table: RouteTable<Route>,
    middlewares: Middlewares,
    base_url: String,
    prefix: String,
    error_renderer: Box<ErrorRenderer>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path component of the base URL, stripped from request paths.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn middlewares(&self) -> &Middlewares {
        &self.middlewares
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolution<'_, Route> {
        self.table.resolve(method, path)
    }

    /// Produces the response for `request`. Never fails: every error,
    /// a panicking handler included, becomes an error page.
    pub fn run(&self, mut request: Request) -> Response {
        request.strip_prefix(&self.prefix);

        match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&request))) {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.error_response(&request, &e),
            Err(payload) => self.error_response(&request, &DispatchError::panicked(panic_reason(payload.as_ref()))),
        }
    }

    /// Matches `request` and runs its middleware queue. `request.path()` is
    /// expected to be already stripped of the prefix.
    pub fn dispatch(&self, request: &Request) -> Result<Response, DispatchError> {
        let (route, vars) = match self.table.resolve(request.method(), request.path()) {
            Resolution::Found { route, vars } => (route, vars),
            Resolution::MethodNotAllowed => {
                return Err(DispatchError::method_not_allowed(request.method().clone(), request.path()));
            }
            Resolution::NotFound => return Err(DispatchError::not_found(request.path())),
        };

        debug!(method = %request.method(), path = request.path(), vars = vars.len(), "route matched");
        let context = RequestContext::new(request, &vars, &self.base_url);
        let mut queue = MiddlewareQueue::new(&self.middlewares, &route.middlewares, route.handler.as_ref());
        queue.next(&context)
    }

    fn error_response(&self, request: &Request, e: &DispatchError) -> Response {
        match e {
            DispatchError::NotFound { .. } | DispatchError::MethodNotAllowed { .. } => {
                info!(method = %request.method(), uri = request.raw_uri(), "{}", e)
            }
            DispatchError::Handler { .. } => warn!(method = %request.method(), uri = request.raw_uri(), "{}", e),
            DispatchError::MiddlewareNotConfigured { .. } | DispatchError::Panicked { .. } => {
                error!(method = %request.method(), uri = request.raw_uri(), "{}", e)
            }
        }
        (self.error_renderer)(e.status(), e.public_message())
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("base_url", &self.base_url)
            .field("routes", &self.table.len())
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(reason) = payload.downcast_ref::<&str>() {
        (*reason).to_owned()
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        reason.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

pub struct RouterBuilder {
    base_url: String,
    routes: Vec<(String, RouteItemBuilder)>,
    middlewares: Middlewares,
    error_renderer: Box<ErrorRenderer>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            routes: Vec::new(),
            middlewares: Middlewares::default(),
            error_renderer: Box::new(error_page),
        }
    }

    /// The application's public URL. Its path becomes the route prefix.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn middlewares(mut self, middlewares: Middlewares) -> Self {
        self.middlewares = middlewares;
        self
    }

    /// Replaces the default HTML error page.
    pub fn error_renderer<F>(mut self, renderer: F) -> Self
    where
        F: Fn(http::StatusCode, &str) -> Response + Send + Sync + 'static,
    {
        self.error_renderer = Box::new(renderer);
        self
    }

    /// Registers `item` under `template`. Routes are matched in the order
    /// they are registered here.
    pub fn route(mut self, template: impl Into<String>, item: RouteItemBuilder) -> Self {
        self.routes.push((template.into(), item));
        self
    }

    pub fn build(self) -> Result<Router, RouterBuildError> {
        let prefix = route_prefix(&self.base_url)?;

        for name in self.middlewares.defaults() {
            if !self.middlewares.contains(name) {
                warn!(middleware = name.as_str(), "default middleware is not configured");
            }
        }

        let mut table = RouteTable::new();
        for (template, item) in self.routes {
            for name in &item.middlewares {
                if !self.middlewares.contains(name) {
                    warn!(method = %item.method, template = %template, middleware = name.as_str(), "route middleware is not configured");
                }
            }
            let route = Route { middlewares: item.middlewares, handler: item.handler };
            table.register(item.method, &template, route)?;
        }
        debug!(routes = table.len(), prefix = %prefix, "router built");

        Ok(Router {
            table,
            middlewares: self.middlewares,
            base_url: self.base_url,
            prefix,
            error_renderer: self.error_renderer,
        })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("base_url", &self.base_url)
            .field("routes", &self.routes)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

fn route_prefix(base_url: &str) -> Result<String, RouterBuildError> {
    let uri: Uri = base_url
        .parse()
        .map_err(|source| RouterBuildError::InvalidBaseUrl { url: base_url.to_owned(), source })?;
    Ok(uri.path().trim_end_matches('/').to_owned())
}

macro_rules! method_route {
    ($method:ident, $method_name:ident) => {
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouteItemBuilder {
            RouteItemBuilder { method: Method::$method_name, middlewares: Vec::new(), handler: Box::new(handler) }
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);

/// One method of a route, with the middleware it runs behind.
pub struct RouteItemBuilder {
    method: Method,
    middlewares: Vec<String>,
    handler: Box<dyn RequestHandler>,
}

impl fmt::Debug for RouteItemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteItemBuilder")
            .field("method", &self.method)
            .field("middlewares", &self.middlewares)
            .finish_non_exhaustive()
    }
}

impl RouteItemBuilder {
    /// Appends a middleware name. Names run in the order they are added,
    /// after the registry defaults.
    pub fn with(mut self, middleware: impl Into<String>) -> Self {
        self.middlewares.push(middleware.into());
        self
    }
}
