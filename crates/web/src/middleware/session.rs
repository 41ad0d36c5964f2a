//! The session capability used by the authentication middleware.

use dashmap::DashMap;
use http::HeaderValue;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::request::Request;

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "newsdesk_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Editor,
    Administrator,
}

/// The user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: u64,
    pub username: String,
    pub privilege: Privilege,
}

impl SessionUser {
    pub fn is_administrator(&self) -> bool {
        self.privilege == Privilege::Administrator
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session storage is unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("session data is corrupted: {reason}")]
    Corrupted { reason: String },
}

impl SessionError {
    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn corrupted<S: Into<String>>(reason: S) -> Self {
        Self::Corrupted { reason: reason.into() }
    }
}

/// Reads and ends the session a request belongs to.
#[cfg_attr(test, mockall::automock)]
pub trait SessionStore: Send + Sync {
    /// The logged-in user, if any.
    fn current_user(&self, req: &Request) -> Result<Option<SessionUser>, SessionError>;

    fn logout(&self, req: &Request) -> Result<(), SessionError>;

    /// A `Set-Cookie` value that removes the session cookie from the client.
    fn expired_cookie(&self) -> HeaderValue;
}

/// Sessions kept in process memory, keyed by a random v4 UUID.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<String, SessionUser>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `user` and returns its id.
    pub fn login(&self, user: SessionUser) -> String {
        let id = Uuid::new_v4().to_string();
        info!(user = %user.username, "session started");
        self.sessions.insert(id.clone(), user);
        id
    }

    /// A `Set-Cookie` value carrying `session_id`.
    pub fn session_cookie(&self, session_id: &str) -> Result<HeaderValue, SessionError> {
        HeaderValue::from_str(&format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly"))
            .map_err(|e| SessionError::corrupted(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn current_user(&self, req: &Request) -> Result<Option<SessionUser>, SessionError> {
        let Some(id) = req.cookie(SESSION_COOKIE) else {
            return Ok(None);
        };
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    fn logout(&self, req: &Request) -> Result<(), SessionError> {
        if let Some((_, user)) = req.cookie(SESSION_COOKIE).and_then(|id| self.sessions.remove(id)) {
            debug!(user = %user.username, "session ended");
        }
        Ok(())
    }

    fn expired_cookie(&self) -> HeaderValue {
        HeaderValue::from_static("newsdesk_session=; Path=/; Max-Age=0; HttpOnly")
    }
}
