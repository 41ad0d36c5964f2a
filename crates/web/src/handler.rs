//! Terminal request handlers.

use crate::error::HandlerError;
use crate::request::RequestContext;
use crate::responder::Responder;
use crate::response::Response;

/// The business logic at the end of a route, run once its middleware chain is
/// exhausted.
pub trait RequestHandler: Send + Sync {
    fn invoke(&self, req: &RequestContext<'_>) -> Result<Response, HandlerError>;
}

/// Holds a closure returning any [`Responder`].
#[derive(Debug)]
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    fn new(f: F) -> Self {
        Self { f }
    }
}

/// Wraps `f` so it can be registered on a route.
///
/// ```
/// use newsdesk_web::{handler_fn, HandlerError, RequestContext};
///
/// let show_user = handler_fn(|req: &RequestContext<'_>| -> Result<String, HandlerError> {
///     Ok(format!("<p>user {}</p>", req.var("cpf")))
/// });
/// # let _ = show_user;
/// ```
pub fn handler_fn<F, R>(f: F) -> FnHandler<F>
where
    F: Fn(&RequestContext<'_>) -> Result<R, HandlerError> + Send + Sync,
    R: Responder,
{
    FnHandler::new(f)
}

impl<F, R> RequestHandler for FnHandler<F>
where
    F: Fn(&RequestContext<'_>) -> Result<R, HandlerError> + Send + Sync,
    R: Responder,
{
    fn invoke(&self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        let responder = (self.f)(req)?;
        responder.try_response_to(req)
    }
}

impl<H: RequestHandler + ?Sized> RequestHandler for Box<H> {
    fn invoke(&self, req: &RequestContext<'_>) -> Result<Response, HandlerError> {
        (**self).invoke(req)
    }
}
