//! Named middleware and the per-request queue that runs them.
//!
//! A route lists middleware by name. For every request the router builds a
//! [`MiddlewareQueue`] holding the registry defaults followed by the route's own
//! names, plus the route handler. Each call to [`MiddlewareQueue::next`] pops one
//! name and runs that middleware with a [`Next`] continuation; once the queue is
//! empty the handler runs. A middleware that returns without calling
//! [`Next::run`] ends the request there.
//!
//! ```
//! use newsdesk_web::middleware::{middleware_fn, Middlewares};
//! use newsdesk_web::Response;
//!
//! let middlewares = Middlewares::builder()
//!     .add("log", middleware_fn(|req, next| {
//!         tracing::info!(path = req.request().path(), "incoming request");
//!         next.run(req)
//!     }))
//!     .add("deny", middleware_fn(|_req, _next| Ok(Response::redirect("/"))))
//!     .defaults(["log"])
//!     .build();
//! assert!(middlewares.contains("deny"));
//! ```

mod auth;
mod authorization;
mod origin;
mod session;

pub use auth::{RequireAdministrator, RequireLogin, RequireLogout};
pub use authorization::{RequireAuthorization, TokenClaims};
pub use origin::RequireWebsiteOrigin;
pub use session::{MemorySessionStore, Privilege, SessionError, SessionStore, SessionUser, SESSION_COOKIE};

#[cfg(test)]
pub use session::MockSessionStore;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::DispatchError;
use crate::handler::RequestHandler;
use crate::request::RequestContext;
use crate::response::Response;

/// A step that may inspect the request, answer it, or pass it on.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        (**self).handle(req, next)
    }
}

/// Adapts a closure into a [`Middleware`].
#[derive(Debug)]
pub struct FnMiddleware<F> {
    f: F,
}

pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&RequestContext<'_>, Next<'_, '_>) -> Result<Response, DispatchError> + Send + Sync,
{
    FnMiddleware { f }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&RequestContext<'_>, Next<'_, '_>) -> Result<Response, DispatchError> + Send + Sync,
{
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        (self.f)(req, next)
    }
}

/// The name to middleware registry plus the names run ahead of every route.
///
/// Built once at startup and read-only afterwards.
#[derive(Clone, Default)]
pub struct Middlewares {
    registry: HashMap<String, Arc<dyn Middleware>>,
    defaults: Vec<String>,
}

impl Middlewares {
    pub fn builder() -> MiddlewaresBuilder {
        MiddlewaresBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Middleware> {
        self.registry.get(name).map(Arc::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }
}

impl fmt::Debug for Middlewares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Middlewares").field("registry", &names).field("defaults", &self.defaults).finish()
    }
}

#[derive(Default)]
pub struct MiddlewaresBuilder {
    registry: HashMap<String, Arc<dyn Middleware>>,
    defaults: Vec<String>,
}

impl fmt::Debug for MiddlewaresBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewaresBuilder").field("defaults", &self.defaults).finish_non_exhaustive()
    }
}

impl MiddlewaresBuilder {
    /// Registers `middleware` under `name`, replacing any earlier one.
    pub fn add<M: Middleware + 'static>(mut self, name: impl Into<String>, middleware: M) -> Self {
        self.registry.insert(name.into(), Arc::new(middleware));
        self
    }

    /// Names run, in order, before the route's own middleware.
    pub fn defaults<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Middlewares {
        Middlewares { registry: self.registry, defaults: self.defaults }
    }
}

/// The pending middleware of one request and the handler they wrap.
///
/// Names are only ever popped, so a request runs at most
/// `defaults + route middleware` steps before reaching the handler.
pub struct MiddlewareQueue<'a> {
    pending: VecDeque<&'a str>,
    middlewares: &'a Middlewares,
    handler: &'a dyn RequestHandler,
}

impl<'a> MiddlewareQueue<'a> {
    /// Queues the registry defaults followed by `route_middlewares`.
    pub fn new(middlewares: &'a Middlewares, route_middlewares: &'a [String], handler: &'a dyn RequestHandler) -> Self {
        let pending = middlewares.defaults.iter().chain(route_middlewares).map(String::as_str).collect();
        Self { pending, middlewares, handler }
    }

    /// Names still waiting to run.
    pub fn pending(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Runs the next middleware, or the handler once none are left.
    pub fn next(&mut self, req: &RequestContext<'_>) -> Result<Response, DispatchError> {
        let Some(name) = self.pending.pop_front() else {
            trace!("middleware queue exhausted, invoking handler");
            return Ok(self.handler.invoke(req)?);
        };

        let middlewares = self.middlewares;
        let middleware = middlewares.get(name).ok_or_else(|| DispatchError::middleware_not_configured(name))?;
        trace!(middleware = name, remaining = self.pending.len(), "running middleware");
        middleware.handle(req, Next { queue: self })
    }
}

impl fmt::Debug for MiddlewareQueue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareQueue").field("pending", &self.pending).finish_non_exhaustive()
    }
}

/// The continuation passed to a middleware. Running it advances the same
/// queue by one step.
#[derive(Debug)]
pub struct Next<'q, 'a> {
    queue: &'q mut MiddlewareQueue<'a>,
}

impl Next<'_, '_> {
    pub fn run(self, req: &RequestContext<'_>) -> Result<Response, DispatchError> {
        self.queue.next(req)
    }
}
