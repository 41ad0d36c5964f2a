//! The request pipeline of newsdesk: routing, named middleware and the
//! request/response types handlers work with.
//!
//! A [`Router`] matches each [`Request`] against its routes in registration
//! order, runs the route's [`middleware`] chain and finally its handler. Every
//! outcome, errors included, is a [`Response`]. [`Server`] serves a router over
//! HTTP/1.1 using `newsdesk-http`.

mod error;
mod handler;
mod request;
mod responder;
mod response;
mod server;

pub mod config;
pub mod middleware;
pub mod router;

pub use error::error_page;
pub use error::DispatchError;
pub use error::ErrorRenderer;
pub use error::HandlerError;
pub use error::RouterBuildError;
pub use handler::handler_fn;
pub use handler::FnHandler;
pub use handler::RequestHandler;
pub use request::PathVars;
pub use request::Request;
pub use request::RequestContext;
pub use responder::Responder;
pub use response::Response;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
