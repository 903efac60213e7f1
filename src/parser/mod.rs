//! Inbound request model and parser.
//!
//! [`parse_request`] turns raw bytes into an [`HttpRequest`]: request line,
//! headers, query string and body.

mod error;
mod request;
mod request_line;

pub use error::Error;
pub use request::{parse_request, HttpRequest};
pub use request_line::{HttpVersion, Method};
