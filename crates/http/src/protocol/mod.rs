//! Protocol types shared by the codec and the connection loop.
//!
//! - [`RequestHeader`]: a decoded request head, before its body is attached
//! - [`PayloadSize`]: how many body bytes follow a request head
//! - [`HttpError`], [`ParseError`], [`SendError`]: the error types of this crate

mod request;
pub use request::PayloadSize;
pub use request::RequestHeader;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
