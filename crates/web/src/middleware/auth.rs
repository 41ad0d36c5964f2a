//! Session based access control.
//!
//! All three middleware treat a failing session store the same way: the
//! session is ended and the client is sent back to the application root.

use std::fmt;
use std::sync::Arc;

use http::header::SET_COOKIE;
use tracing::{debug, warn};

use super::session::{SessionError, SessionStore};
use super::{Middleware, Next};
use crate::error::DispatchError;
use crate::request::RequestContext;
use crate::response::Response;

/// Lets only logged-in users through.
pub struct RequireLogin {
    sessions: Arc<dyn SessionStore>,
}

impl RequireLogin {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }
}

impl fmt::Debug for RequireLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireLogin").finish_non_exhaustive()
    }
}

impl Middleware for RequireLogin {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        match self.sessions.current_user(req.request()) {
            Ok(Some(_)) => next.run(req),
            Ok(None) => {
                debug!(path = req.request().path(), "no user logged in, redirecting to root");
                Ok(req.redirect("/"))
            }
            Err(e) => Ok(end_session(self.sessions.as_ref(), req, &e)),
        }
    }
}

/// Keeps logged-in users away from pages meant for visitors, such as the
/// login form.
pub struct RequireLogout {
    sessions: Arc<dyn SessionStore>,
    target: String,
}

impl RequireLogout {
    pub const DEFAULT_TARGET: &'static str = "/home";

    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions, target: Self::DEFAULT_TARGET.to_owned() }
    }

    /// Route logged-in users are sent to.
    pub fn redirect_to(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

impl fmt::Debug for RequireLogout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireLogout").finish_non_exhaustive()
    }
}

impl Middleware for RequireLogout {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        match self.sessions.current_user(req.request()) {
            Ok(None) => next.run(req),
            Ok(Some(user)) => {
                debug!(user = %user.username, redirect = %self.target, "user already logged in");
                Ok(req.redirect(&self.target))
            }
            Err(e) => Ok(end_session(self.sessions.as_ref(), req, &e)),
        }
    }
}

/// Lets only administrators through. Anyone else is logged out.
pub struct RequireAdministrator {
    sessions: Arc<dyn SessionStore>,
}

impl RequireAdministrator {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }
}

impl fmt::Debug for RequireAdministrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequireAdministrator").finish_non_exhaustive()
    }
}

impl Middleware for RequireAdministrator {
    fn handle(&self, req: &RequestContext<'_>, next: Next<'_, '_>) -> Result<Response, DispatchError> {
        match self.sessions.current_user(req.request()) {
            Ok(Some(user)) if user.is_administrator() => next.run(req),
            Ok(user) => {
                warn!(user = ?user.map(|u| u.username), path = req.request().path(), "administrator privilege required");
                Ok(logout_and_redirect(self.sessions.as_ref(), req))
            }
            Err(e) => Ok(end_session(self.sessions.as_ref(), req, &e)),
        }
    }
}

fn end_session(sessions: &dyn SessionStore, req: &RequestContext<'_>, cause: &SessionError) -> Response {
    warn!(cause = %cause, "session check failed, ending session");
    logout_and_redirect(sessions, req)
}

fn logout_and_redirect(sessions: &dyn SessionStore, req: &RequestContext<'_>) -> Response {
    if let Err(e) = sessions.logout(req.request()) {
        warn!(cause = %e, "can't end session");
    }
    let mut response = req.redirect("/");
    response.append_header(SET_COOKIE, sessions.expired_cookie());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handler::handler_fn;
    use crate::middleware::session::{MockSessionStore, Privilege, SessionUser};
    use crate::middleware::{MiddlewareQueue, Middlewares};
    use crate::request::{PathVars, Request};
    use bytes::Bytes;
    use http::header::LOCATION;
    use http::{HeaderValue, StatusCode};

    fn user(privilege: Privilege) -> SessionUser {
        SessionUser { id: 3, username: "joao".into(), privilege }
    }

    fn expired() -> HeaderValue {
        HeaderValue::from_static("newsdesk_session=; Max-Age=0")
    }

    fn dispatch<M: Middleware + 'static>(middleware: M) -> Response {
        let middlewares = Middlewares::builder().add("guard", middleware).build();
        let handler = handler_fn(|_req: &RequestContext<'_>| Ok::<_, HandlerError>("<p>protected</p>"));
        let route = vec!["guard".to_owned()];
        let mut queue = MiddlewareQueue::new(&middlewares, &route, &handler);

        let request: Request = http::Request::get("/newsdesk/admin").body(Bytes::new()).unwrap().into();
        let vars = PathVars::empty();
        queue.next(&RequestContext::new(&request, &vars, "http://localhost/newsdesk")).unwrap()
    }

    #[test]
    fn login_required_redirects_anonymous() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().times(1).returning(|_| Ok(None));
        sessions.expect_logout().never();

        let response = dispatch(RequireLogin::new(Arc::new(sessions)));

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(&LOCATION), Some("http://localhost/newsdesk/"));
    }

    #[test]
    fn login_required_lets_user_through() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(Some(user(Privilege::Editor))));

        let response = dispatch(RequireLogin::new(Arc::new(sessions)));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"<p>protected</p>");
    }

    #[test]
    fn session_failure_logs_out() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Err(SessionError::unavailable("store down")));
        sessions.expect_logout().times(1).returning(|_| Ok(()));
        sessions.expect_expired_cookie().returning(expired);

        let response = dispatch(RequireLogin::new(Arc::new(sessions)));

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(&SET_COOKIE), Some("newsdesk_session=; Max-Age=0"));
    }

    #[test]
    fn logout_required_redirects_logged_in_user() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(Some(user(Privilege::Editor))));

        let response = dispatch(RequireLogout::new(Arc::new(sessions)));
        assert_eq!(response.header(&LOCATION), Some("http://localhost/newsdesk/home"));

        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(Some(user(Privilege::Editor))));

        let response = dispatch(RequireLogout::new(Arc::new(sessions)).redirect_to("/news"));
        assert_eq!(response.header(&LOCATION), Some("http://localhost/newsdesk/news"));
    }

    #[test]
    fn logout_required_lets_visitor_through() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(None));

        let response = dispatch(RequireLogout::new(Arc::new(sessions)));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn administrator_required() {
        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(Some(user(Privilege::Administrator))));
        let response = dispatch(RequireAdministrator::new(Arc::new(sessions)));
        assert_eq!(response.status(), StatusCode::OK);

        let mut sessions = MockSessionStore::new();
        sessions.expect_current_user().returning(|_| Ok(Some(user(Privilege::Editor))));
        sessions.expect_logout().times(1).returning(|_| Ok(()));
        sessions.expect_expired_cookie().returning(expired);
        let response = dispatch(RequireAdministrator::new(Arc::new(sessions)));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header(&LOCATION), Some("http://localhost/newsdesk/"));
    }
}
